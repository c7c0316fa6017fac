use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use vocab_core::model::{
    Fact, FactId, Family, FamilyId, LanguageCode, List, ListId, NewReviewRecord, ReviewRecord,
    ReviewRecordId, Scope, SessionSummary, SessionSummaryDraft, SessionSummaryId, UserId,
};
use vocab_core::progress::LanguageFilter;
use vocab_core::time::Window;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A stored session summary row that could not be turned back into a domain value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed session summary row {row_id}: {reason}")]
pub struct MalformedRow {
    pub row_id: i64,
    pub reason: String,
}

/// Per-row result of a summary listing; one bad row never hides the others.
pub type StoredSummary = Result<SessionSummary, MalformedRow>;

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Families, lists and facts, plus the ownership checks that guard them.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the family cannot be stored.
    async fn upsert_family(&self, family: &Family) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the parent family is missing.
    async fn upsert_list(&self, list: &List) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the parent list is missing.
    async fn upsert_fact(&self, fact: &Fact) -> Result<(), StorageError>;

    /// Lists named by `scope` that belong to `user`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if any named list or family is absent or
    /// owned by someone else.
    async fn scope_lists(&self, user: UserId, scope: &Scope) -> Result<Vec<List>, StorageError>;

    /// Facts of the given lists in review order `(rank, created_at, id)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn facts_for_lists(&self, lists: &[ListId]) -> Result<Vec<Fact>, StorageError>;

    /// Fetch a fact only if its list's family belongs to `user`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if absent or not owned.
    async fn owned_fact(&self, user: UserId, fact: FactId) -> Result<Fact, StorageError>;
}

/// Append-only review history.
#[async_trait]
pub trait ReviewRecordRepository: Send + Sync {
    /// Append one record; the store assigns a strictly increasing id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn append_record(&self, record: &NewReviewRecord) -> Result<ReviewRecord, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn latest_record(
        &self,
        user: UserId,
        fact: FactId,
    ) -> Result<Option<ReviewRecord>, StorageError>;

    /// Latest record per fact for a batch of facts; facts never reviewed are absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn latest_records(
        &self,
        user: UserId,
        facts: &[FactId],
    ) -> Result<HashMap<FactId, ReviewRecord>, StorageError>;

    /// Full history of a fact for a learner, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn records_for_fact(
        &self,
        user: UserId,
        fact: FactId,
    ) -> Result<Vec<ReviewRecord>, StorageError>;
}

#[async_trait]
pub trait SessionSummaryRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the summary cannot be stored.
    async fn append_summary(
        &self,
        draft: &SessionSummaryDraft,
    ) -> Result<SessionSummary, StorageError>;

    /// Summaries started inside `window`, oldest first, narrowed by `languages`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query itself fails. Unreadable rows come back
    /// as `Err(MalformedRow)` entries instead.
    async fn list_summaries(
        &self,
        user: UserId,
        window: &Window,
        languages: &LanguageFilter,
    ) -> Result<Vec<StoredSummary>, StorageError>;

    /// Sorted distinct languages of the summaries inside `window`, ignoring any filter.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn distinct_languages(
        &self,
        user: UserId,
        window: &Window,
    ) -> Result<Vec<LanguageCode>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get_summary(&self, id: SessionSummaryId) -> Result<SessionSummary, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
struct SummarySlot {
    user_id: UserId,
    started_at: DateTime<Utc>,
    language: Option<LanguageCode>,
    entry: StoredSummary,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    families: Arc<Mutex<HashMap<FamilyId, Family>>>,
    lists: Arc<Mutex<HashMap<ListId, List>>>,
    facts: Arc<Mutex<HashMap<FactId, Fact>>>,
    records: Arc<Mutex<Vec<ReviewRecord>>>,
    summaries: Arc<Mutex<Vec<SummarySlot>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Connection(e.to_string()))
}

fn next_id(len: usize) -> Result<u64, StorageError> {
    u64::try_from(len + 1).map_err(|_| StorageError::Serialization("id overflow".into()))
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a summary row that cannot be read back, as a corrupted backend row would.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn push_malformed_summary(
        &self,
        user_id: UserId,
        started_at: DateTime<Utc>,
        language: Option<LanguageCode>,
        reason: impl Into<String>,
    ) -> Result<i64, StorageError> {
        let mut guard = lock(&self.summaries)?;
        let row_id = i64::try_from(guard.len() + 1)
            .map_err(|_| StorageError::Serialization("id overflow".into()))?;
        guard.push(SummarySlot {
            user_id,
            started_at,
            language,
            entry: Err(MalformedRow {
                row_id,
                reason: reason.into(),
            }),
        });
        Ok(row_id)
    }

    fn owns_list(
        families: &HashMap<FamilyId, Family>,
        list: &List,
        user: UserId,
    ) -> bool {
        families
            .get(&list.family_id)
            .is_some_and(|family| family.user_id == user)
    }
}

#[async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn upsert_family(&self, family: &Family) -> Result<(), StorageError> {
        let mut guard = lock(&self.families)?;
        guard.insert(family.id, family.clone());
        Ok(())
    }

    async fn upsert_list(&self, list: &List) -> Result<(), StorageError> {
        if !lock(&self.families)?.contains_key(&list.family_id) {
            return Err(StorageError::NotFound);
        }
        lock(&self.lists)?.insert(list.id, list.clone());
        Ok(())
    }

    async fn upsert_fact(&self, fact: &Fact) -> Result<(), StorageError> {
        if !lock(&self.lists)?.contains_key(&fact.list_id()) {
            return Err(StorageError::NotFound);
        }
        lock(&self.facts)?.insert(fact.id(), fact.clone());
        Ok(())
    }

    async fn scope_lists(&self, user: UserId, scope: &Scope) -> Result<Vec<List>, StorageError> {
        let families = lock(&self.families)?;
        let lists = lock(&self.lists)?;

        let mut out: Vec<List> = match scope {
            Scope::List(id) => {
                let list = lists.get(id).ok_or(StorageError::NotFound)?;
                vec![list.clone()]
            }
            Scope::Lists(ids) => {
                let mut seen = BTreeSet::new();
                let mut found = Vec::with_capacity(ids.len());
                for id in ids {
                    let list = lists.get(id).ok_or(StorageError::NotFound)?;
                    if seen.insert(*id) {
                        found.push(list.clone());
                    }
                }
                found
            }
            Scope::Family(family_id) => {
                let family = families.get(family_id).ok_or(StorageError::NotFound)?;
                if family.user_id != user {
                    return Err(StorageError::NotFound);
                }
                lists
                    .values()
                    .filter(|list| list.family_id == *family_id)
                    .cloned()
                    .collect()
            }
            Scope::All => lists
                .values()
                .filter(|list| Self::owns_list(&families, list, user))
                .cloned()
                .collect(),
        };

        if out.iter().any(|list| !Self::owns_list(&families, list, user)) {
            return Err(StorageError::NotFound);
        }
        out.sort_by_key(|list| list.id);
        Ok(out)
    }

    async fn facts_for_lists(&self, lists: &[ListId]) -> Result<Vec<Fact>, StorageError> {
        let guard = lock(&self.facts)?;
        let mut facts: Vec<Fact> = guard
            .values()
            .filter(|fact| lists.contains(&fact.list_id()))
            .cloned()
            .collect();
        facts.sort_by_key(Fact::order_key);
        Ok(facts)
    }

    async fn owned_fact(&self, user: UserId, fact: FactId) -> Result<Fact, StorageError> {
        let found = lock(&self.facts)?
            .get(&fact)
            .cloned()
            .ok_or(StorageError::NotFound)?;
        let families = lock(&self.families)?;
        let lists = lock(&self.lists)?;
        let owned = lists
            .get(&found.list_id())
            .is_some_and(|list| Self::owns_list(&families, list, user));
        if owned {
            Ok(found)
        } else {
            Err(StorageError::NotFound)
        }
    }
}

#[async_trait]
impl ReviewRecordRepository for InMemoryRepository {
    async fn append_record(&self, record: &NewReviewRecord) -> Result<ReviewRecord, StorageError> {
        if !lock(&self.facts)?.contains_key(&record.fact_id) {
            return Err(StorageError::NotFound);
        }
        let mut guard = lock(&self.records)?;
        let stored = record
            .clone()
            .assign_id(ReviewRecordId::new(next_id(guard.len())?));
        guard.push(stored.clone());
        Ok(stored)
    }

    async fn latest_record(
        &self,
        user: UserId,
        fact: FactId,
    ) -> Result<Option<ReviewRecord>, StorageError> {
        let guard = lock(&self.records)?;
        let latest = ReviewRecord::latest(
            guard
                .iter()
                .filter(|r| r.user_id == user && r.fact_id == fact),
        );
        Ok(latest.cloned())
    }

    async fn latest_records(
        &self,
        user: UserId,
        facts: &[FactId],
    ) -> Result<HashMap<FactId, ReviewRecord>, StorageError> {
        let guard = lock(&self.records)?;
        Ok(vocab_core::due::latest_by_fact(
            guard
                .iter()
                .filter(|r| r.user_id == user && facts.contains(&r.fact_id)),
        ))
    }

    async fn records_for_fact(
        &self,
        user: UserId,
        fact: FactId,
    ) -> Result<Vec<ReviewRecord>, StorageError> {
        let guard = lock(&self.records)?;
        let mut history: Vec<ReviewRecord> = guard
            .iter()
            .filter(|r| r.user_id == user && r.fact_id == fact)
            .cloned()
            .collect();
        history.sort_by_key(ReviewRecord::recency_key);
        Ok(history)
    }
}

#[async_trait]
impl SessionSummaryRepository for InMemoryRepository {
    async fn append_summary(
        &self,
        draft: &SessionSummaryDraft,
    ) -> Result<SessionSummary, StorageError> {
        let mut guard = lock(&self.summaries)?;
        let summary = draft
            .clone()
            .assign_id(SessionSummaryId::new(next_id(guard.len())?));
        guard.push(SummarySlot {
            user_id: summary.user_id(),
            started_at: summary.started_at(),
            language: summary.language().cloned(),
            entry: Ok(summary.clone()),
        });
        Ok(summary)
    }

    async fn list_summaries(
        &self,
        user: UserId,
        window: &Window,
        languages: &LanguageFilter,
    ) -> Result<Vec<StoredSummary>, StorageError> {
        let guard = lock(&self.summaries)?;
        let mut rows: Vec<&SummarySlot> = guard
            .iter()
            .filter(|slot| slot.user_id == user && window.contains(slot.started_at))
            .filter(|slot| languages.matches(slot.language.as_ref()))
            .collect();
        rows.sort_by_key(|slot| slot.started_at);
        Ok(rows.into_iter().map(|slot| slot.entry.clone()).collect())
    }

    async fn distinct_languages(
        &self,
        user: UserId,
        window: &Window,
    ) -> Result<Vec<LanguageCode>, StorageError> {
        let guard = lock(&self.summaries)?;
        let codes: BTreeSet<LanguageCode> = guard
            .iter()
            .filter(|slot| slot.user_id == user && window.contains(slot.started_at))
            .filter_map(|slot| slot.language.clone())
            .collect();
        Ok(codes.into_iter().collect())
    }

    async fn get_summary(&self, id: SessionSummaryId) -> Result<SessionSummary, StorageError> {
        let guard = lock(&self.summaries)?;
        guard
            .iter()
            .filter_map(|slot| slot.entry.as_ref().ok())
            .find(|summary| summary.id() == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

/// Bundles the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub catalog: Arc<dyn CatalogRepository>,
    pub reviews: Arc<dyn ReviewRecordRepository>,
    pub summaries: Arc<dyn SessionSummaryRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(&InMemoryRepository::new())
    }

    /// Wrap an existing in-memory repository, keeping a handle for direct inspection.
    #[must_use]
    pub fn from_in_memory(repo: &InMemoryRepository) -> Self {
        let catalog: Arc<dyn CatalogRepository> = Arc::new(repo.clone());
        let reviews: Arc<dyn ReviewRecordRepository> = Arc::new(repo.clone());
        let summaries: Arc<dyn SessionSummaryRepository> = Arc::new(repo.clone());
        Self {
            catalog,
            reviews,
            summaries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use vocab_core::model::{Direction, SessionMode};
    use vocab_core::time::fixed_now;

    fn lang(code: &str) -> LanguageCode {
        LanguageCode::new(code).unwrap()
    }

    async fn seeded() -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        repo.upsert_family(&Family::new(FamilyId::new(1), UserId::new(1), "Travel").unwrap())
            .await
            .unwrap();
        repo.upsert_family(&Family::new(FamilyId::new(2), UserId::new(2), "Other").unwrap())
            .await
            .unwrap();
        for (id, family, code) in [(1, 1, "fra"), (2, 1, "deu"), (3, 2, "fra")] {
            repo.upsert_list(
                &List::new(ListId::new(id), FamilyId::new(family), "L", Some(lang(code))).unwrap(),
            )
            .await
            .unwrap();
        }
        let now = fixed_now();
        for (id, list, rank) in [(1, 1, 2), (2, 1, 1), (3, 2, 0), (4, 3, 0)] {
            repo.upsert_fact(
                &Fact::new(FactId::new(id), ListId::new(list), "t", "d", rank, now).unwrap(),
            )
            .await
            .unwrap();
        }
        repo
    }

    fn new_record(fact: u64, at: chrono::DateTime<Utc>, success: bool) -> NewReviewRecord {
        NewReviewRecord {
            fact_id: FactId::new(fact),
            user_id: UserId::new(1),
            success,
            next_review_at: at + Duration::minutes(10),
            created_at: at,
        }
    }

    #[tokio::test]
    async fn scope_lists_enforces_ownership() {
        let repo = seeded().await;
        let user = UserId::new(1);

        let family = repo.scope_lists(user, &Scope::Family(FamilyId::new(1))).await.unwrap();
        assert_eq!(family.len(), 2);

        let err = repo
            .scope_lists(user, &Scope::Lists(vec![ListId::new(1), ListId::new(3)]))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));

        let err = repo
            .scope_lists(user, &Scope::Family(FamilyId::new(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));

        let all = repo.scope_lists(user, &Scope::All).await.unwrap();
        assert_eq!(
            all.iter().map(|l| l.id.value()).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[tokio::test]
    async fn facts_come_back_in_rank_order() {
        let repo = seeded().await;
        let facts = repo.facts_for_lists(&[ListId::new(1)]).await.unwrap();
        assert_eq!(
            facts.iter().map(|f| f.id().value()).collect::<Vec<_>>(),
            vec![2, 1]
        );
    }

    #[tokio::test]
    async fn owned_fact_hides_foreign_facts() {
        let repo = seeded().await;
        assert!(repo.owned_fact(UserId::new(1), FactId::new(1)).await.is_ok());
        assert!(matches!(
            repo.owned_fact(UserId::new(1), FactId::new(4)).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn latest_record_breaks_timestamp_ties_by_id() {
        let repo = seeded().await;
        let at = fixed_now();
        let first = repo.append_record(&new_record(1, at, false)).await.unwrap();
        let second = repo.append_record(&new_record(1, at, true)).await.unwrap();
        assert!(second.id > first.id);

        let latest = repo
            .latest_record(UserId::new(1), FactId::new(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, second.id);

        let batch = repo
            .latest_records(UserId::new(1), &[FactId::new(1), FactId::new(2)])
            .await
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert!(batch[&FactId::new(1)].success);
    }

    #[tokio::test]
    async fn summaries_filter_by_window_and_language() {
        let repo = InMemoryRepository::new();
        let now = fixed_now();
        let user = UserId::new(1);
        for (offset_days, code) in [(0, Some("fra")), (1, Some("eng")), (10, Some("deu")), (0, None)] {
            let started = now - Duration::days(offset_days);
            let draft = SessionSummaryDraft::new(
                user,
                SessionMode::Flashcard,
                Direction::ForeignToNative,
                code.map(lang),
                started,
                started + Duration::minutes(5),
                1,
                1,
                0,
            )
            .unwrap();
            repo.append_summary(&draft).await.unwrap();
        }
        repo.push_malformed_summary(user, now, Some(lang("fra")), "bad mode")
            .unwrap();

        let window = Window {
            start: Some(now - Duration::days(2)),
            end: now,
        };
        let all = repo
            .list_summaries(user, &window, &LanguageFilter::any())
            .await
            .unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all.iter().filter(|row| row.is_err()).count(), 1);

        let french = repo
            .list_summaries(user, &window, &LanguageFilter::of([lang("fra")]))
            .await
            .unwrap();
        assert_eq!(french.len(), 2);

        let languages = repo.distinct_languages(user, &window).await.unwrap();
        assert_eq!(languages, vec![lang("eng"), lang("fra")]);
    }
}
