use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use storage::repository::{CatalogRepository, ReviewRecordRepository};
use vocab_core::{
    due::filter_due,
    model::{Fact, FactId, LanguageCode, ResolvedScope, Scope, UserId},
    time::Clock,
};

use crate::error::{ServiceError, require_identity};

/// Due facts of a scope together with the scope's shared language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueSet {
    pub language: Option<LanguageCode>,
    pub facts: Vec<Fact>,
}

/// Read-only selection of the facts that are due for review.
#[derive(Clone)]
pub struct DueSetService {
    clock: Clock,
    catalog: Arc<dyn CatalogRepository>,
    records: Arc<dyn ReviewRecordRepository>,
}

impl DueSetService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn CatalogRepository>,
        records: Arc<dyn ReviewRecordRepository>,
    ) -> Self {
        Self {
            clock,
            catalog,
            records,
        }
    }

    /// Due facts of `scope` at the service clock's current time.
    ///
    /// # Errors
    ///
    /// See [`DueSetService::select_due_at`].
    pub async fn select_due(
        &self,
        identity: Option<UserId>,
        scope: &Scope,
    ) -> Result<Vec<Fact>, ServiceError> {
        self.select_due_at(identity, scope, self.clock.now()).await
    }

    /// Facts of `scope` with no review yet or whose next review is at or before
    /// `now`, ordered by `(rank, created_at, id)`.
    ///
    /// # Errors
    ///
    /// Returns `Authentication` without identity, `Validation` for an empty or
    /// mixed-language multi-list scope, and `NotFound` for scopes the caller does
    /// not own.
    pub async fn select_due_at(
        &self,
        identity: Option<UserId>,
        scope: &Scope,
        now: DateTime<Utc>,
    ) -> Result<Vec<Fact>, ServiceError> {
        Ok(self.due_set(identity, scope, now).await?.facts)
    }

    /// Like [`DueSetService::select_due_at`], also reporting the scope language.
    ///
    /// # Errors
    ///
    /// See [`DueSetService::select_due_at`].
    pub async fn due_set(
        &self,
        identity: Option<UserId>,
        scope: &Scope,
        now: DateTime<Utc>,
    ) -> Result<DueSet, ServiceError> {
        let user = require_identity(identity)?;
        scope.validate()?;

        let lists = self.catalog.scope_lists(user, scope).await?;
        let resolved = ResolvedScope::from_lists(
            lists.into_iter().map(|list| (list.id, list.language)),
            matches!(scope, Scope::Lists(_)),
        )?;
        if resolved.is_empty() {
            debug!(user = %user, ?scope, "scope has no lists");
            return Ok(DueSet {
                language: resolved.language,
                facts: Vec::new(),
            });
        }

        let candidates = self.catalog.facts_for_lists(&resolved.list_ids).await?;
        let ids: Vec<FactId> = candidates.iter().map(Fact::id).collect();
        let latest = self.records.latest_records(user, &ids).await?;
        let facts = filter_due(candidates, &latest, now);

        debug!(
            user = %user,
            ?scope,
            candidates = ids.len(),
            due = facts.len(),
            "selected due facts"
        );
        Ok(DueSet {
            language: resolved.language,
            facts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use storage::repository::InMemoryRepository;
    use vocab_core::model::{Family, FamilyId, List, ListId, NewReviewRecord};
    use vocab_core::time::fixed_now;

    use crate::error::ErrorKind;

    async fn repo() -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        repo.upsert_family(&Family::new(FamilyId::new(1), UserId::new(1), "F").unwrap())
            .await
            .unwrap();
        for (id, code) in [(1, "fra"), (2, "fra"), (3, "deu")] {
            repo.upsert_list(
                &List::new(
                    ListId::new(id),
                    FamilyId::new(1),
                    "L",
                    Some(LanguageCode::new(code).unwrap()),
                )
                .unwrap(),
            )
            .await
            .unwrap();
        }
        for (id, list) in [(1, 1), (2, 2), (3, 3)] {
            repo.upsert_fact(
                &Fact::new(FactId::new(id), ListId::new(list), "t", "d", 0, fixed_now()).unwrap(),
            )
            .await
            .unwrap();
        }
        repo
    }

    fn service(repo: &InMemoryRepository) -> DueSetService {
        DueSetService::new(
            Clock::fixed(fixed_now()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    #[tokio::test]
    async fn multi_list_scope_reports_language() {
        let repo = repo().await;
        let set = service(&repo)
            .due_set(
                Some(UserId::new(1)),
                &Scope::Lists(vec![ListId::new(1), ListId::new(2)]),
                fixed_now(),
            )
            .await
            .unwrap();
        assert_eq!(set.facts.len(), 2);
        assert_eq!(set.language, Some(LanguageCode::new("fra").unwrap()));
    }

    #[tokio::test]
    async fn mixed_language_lists_are_rejected() {
        let repo = repo().await;
        let err = service(&repo)
            .select_due(
                Some(UserId::new(1)),
                &Scope::Lists(vec![ListId::new(1), ListId::new(3)]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn empty_list_scope_is_validation_before_storage() {
        let repo = repo().await;
        let err = service(&repo)
            .select_due(Some(UserId::new(1)), &Scope::Lists(Vec::new()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = service(&repo)
            .select_due(None, &Scope::Lists(Vec::new()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn family_scope_mixes_languages_freely() {
        let repo = repo().await;
        let set = service(&repo)
            .due_set(Some(UserId::new(1)), &Scope::Family(FamilyId::new(1)), fixed_now())
            .await
            .unwrap();
        assert_eq!(set.facts.len(), 3);
        assert_eq!(set.language, None);
    }

    #[tokio::test]
    async fn reviewed_fact_returns_at_its_due_instant() {
        let repo = repo().await;
        let next = fixed_now() + Duration::minutes(10);
        repo.append_record(&NewReviewRecord {
            fact_id: FactId::new(1),
            user_id: UserId::new(1),
            success: false,
            next_review_at: next,
            created_at: fixed_now(),
        })
        .await
        .unwrap();

        let svc = service(&repo);
        let scope = Scope::List(ListId::new(1));
        let before = svc
            .select_due_at(Some(UserId::new(1)), &scope, next - Duration::seconds(1))
            .await
            .unwrap();
        assert!(before.is_empty());

        let at = svc
            .select_due_at(Some(UserId::new(1)), &scope, next)
            .await
            .unwrap();
        assert_eq!(at.len(), 1);
    }
}
