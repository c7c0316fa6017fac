use chrono::Duration;
use storage::repository::{
    CatalogRepository, ReviewRecordRepository, SessionSummaryRepository, StorageError,
};
use storage::sqlite::SqliteRepository;
use vocab_core::model::{
    Direction, Fact, FactId, Family, FamilyId, LanguageCode, List, ListId, NewReviewRecord, Scope,
    SessionMode, SessionSummaryDraft, UserId,
};
use vocab_core::progress::LanguageFilter;
use vocab_core::time::{Window, fixed_now};

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn lang(code: &str) -> LanguageCode {
    LanguageCode::new(code).unwrap()
}

async fn seed_catalog(repo: &SqliteRepository) {
    repo.upsert_family(&Family::new(FamilyId::new(1), UserId::new(1), "Mine").unwrap())
        .await
        .unwrap();
    repo.upsert_family(&Family::new(FamilyId::new(2), UserId::new(2), "Theirs").unwrap())
        .await
        .unwrap();
    repo.upsert_list(&List::new(ListId::new(1), FamilyId::new(1), "fr", Some(lang("fra"))).unwrap())
        .await
        .unwrap();
    repo.upsert_list(&List::new(ListId::new(2), FamilyId::new(2), "fr", Some(lang("fra"))).unwrap())
        .await
        .unwrap();

    let now = fixed_now();
    let facts = [
        (1, 1, 1, now),
        (2, 1, 0, now + Duration::seconds(5)),
        (3, 1, 0, now),
        (4, 2, 0, now),
    ];
    for (id, list, rank, created) in facts {
        repo.upsert_fact(&Fact::new(FactId::new(id), ListId::new(list), "t", "d", rank, created).unwrap())
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = connect("memdb_migrate_twice").await;
    repo.migrate().await.expect("second migrate");
}

#[tokio::test]
async fn catalog_ordering_and_ownership() {
    let repo = connect("memdb_catalog").await;
    seed_catalog(&repo).await;
    let user = UserId::new(1);

    let lists = repo.scope_lists(user, &Scope::All).await.unwrap();
    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0].language, Some(lang("fra")));

    let facts = repo.facts_for_lists(&[ListId::new(1)]).await.unwrap();
    assert_eq!(
        facts.iter().map(|f| f.id().value()).collect::<Vec<_>>(),
        vec![3, 2, 1]
    );

    assert!(matches!(
        repo.scope_lists(user, &Scope::List(ListId::new(2))).await,
        Err(StorageError::NotFound)
    ));
    assert!(matches!(
        repo.scope_lists(user, &Scope::Lists(vec![ListId::new(1), ListId::new(99)]))
            .await,
        Err(StorageError::NotFound)
    ));
    assert!(matches!(
        repo.owned_fact(user, FactId::new(4)).await,
        Err(StorageError::NotFound)
    ));
    assert_eq!(
        repo.owned_fact(user, FactId::new(1)).await.unwrap().id(),
        FactId::new(1)
    );
}

#[tokio::test]
async fn list_upsert_requires_family() {
    let repo = connect("memdb_fk").await;
    let err = repo
        .upsert_list(&List::new(ListId::new(9), FamilyId::new(9), "orphan", None).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn review_records_are_append_only_with_increasing_ids() {
    let repo = connect("memdb_records").await;
    seed_catalog(&repo).await;
    let user = UserId::new(1);
    let at = fixed_now();

    let mut ids = Vec::new();
    for success in [false, true] {
        let record = repo
            .append_record(&NewReviewRecord {
                fact_id: FactId::new(1),
                user_id: user,
                success,
                next_review_at: at + Duration::minutes(10),
                created_at: at,
            })
            .await
            .unwrap();
        ids.push(record.id);
    }
    assert!(ids[1] > ids[0]);

    let latest = repo
        .latest_record(user, FactId::new(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.id, ids[1]);
    assert!(latest.success);

    let batch = repo
        .latest_records(user, &[FactId::new(1), FactId::new(2)])
        .await
        .unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[&FactId::new(1)].id, ids[1]);

    let history = repo.records_for_fact(user, FactId::new(1)).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(!history[0].success);

    assert!(
        repo.latest_record(UserId::new(2), FactId::new(1))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn latest_records_handles_scopes_larger_than_the_parameter_limit() {
    let repo = connect("memdb_records_wide").await;
    seed_catalog(&repo).await;
    let user = UserId::new(1);
    let at = fixed_now();

    for (fact, minutes) in [(1, 10), (3, 20)] {
        repo.append_record(&NewReviewRecord {
            fact_id: FactId::new(fact),
            user_id: user,
            success: true,
            next_review_at: at + Duration::minutes(minutes),
            created_at: at,
        })
        .await
        .unwrap();
    }

    // Far more ids than SQLite accepts as host parameters in one statement.
    let mut wide: Vec<FactId> = (10_000..50_000).map(FactId::new).collect();
    wide.insert(0, FactId::new(1));
    wide.push(FactId::new(3));

    let latest = repo.latest_records(user, &wide).await.unwrap();
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[&FactId::new(1)].next_review_at, at + Duration::minutes(10));
    assert_eq!(latest[&FactId::new(3)].next_review_at, at + Duration::minutes(20));

    assert!(repo.latest_records(user, &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn summaries_round_trip_and_skip_malformed_rows() {
    let repo = connect("memdb_summaries").await;
    let user = UserId::new(1);
    let now = fixed_now();

    let draft = SessionSummaryDraft::new(
        user,
        SessionMode::Dictation,
        Direction::NativeToForeign,
        Some(lang("fra")),
        now - Duration::minutes(10),
        now - Duration::minutes(5),
        4,
        3,
        4,
    )
    .unwrap();
    let stored = repo.append_summary(&draft).await.unwrap();
    assert_eq!(repo.get_summary(stored.id()).await.unwrap(), stored);
    assert_eq!(stored.duration_seconds(), 300);

    sqlx::query(
        r"
            INSERT INTO session_summaries (
                user_id, mode, direction, language, started_at, ended_at,
                duration_seconds, words_seen, words_retained, words_written
            )
            VALUES (1, 'quiz', 'term_to_def', 'eng', ?1, ?1, 0, 0, 0, 0)
        ",
    )
    .bind(now - Duration::minutes(1))
    .execute(repo.pool())
    .await
    .unwrap();

    let window = Window::unbounded(now);
    let rows = repo
        .list_summaries(user, &window, &LanguageFilter::any())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].is_ok());
    assert!(rows[1].is_err());

    let french = repo
        .list_summaries(user, &window, &LanguageFilter::of([lang("fra")]))
        .await
        .unwrap();
    assert_eq!(french.len(), 1);

    let bounded = Window {
        start: Some(now - Duration::minutes(2)),
        end: now,
    };
    let recent = repo
        .list_summaries(user, &bounded, &LanguageFilter::any())
        .await
        .unwrap();
    assert_eq!(recent.len(), 1);

    let languages = repo.distinct_languages(user, &window).await.unwrap();
    assert_eq!(languages, vec![lang("eng"), lang("fra")]);
}
