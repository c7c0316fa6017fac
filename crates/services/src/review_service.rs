use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use storage::repository::{CatalogRepository, ReviewRecordRepository};
use vocab_core::{
    model::{FactId, ReviewRecord, UserId},
    scheduler::Scheduler,
    time::Clock,
};

use crate::error::{ServiceError, require_identity};

//
// ─── SUBMISSION ────────────────────────────────────────────────────────────────
//

/// Raw review request as received from a client, before validation.
///
/// `fact_id` may arrive as a JSON number or a numeric string.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSubmission {
    #[serde(default)]
    pub fact_id: Option<Value>,
    #[serde(default)]
    pub success: Option<Value>,
}

impl ReviewSubmission {
    /// Validate the raw fields into a typed `(fact, success)` pair.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a missing or malformed fact id, or a
    /// `success` that is not a boolean.
    pub fn parse(&self) -> Result<(FactId, bool), ServiceError> {
        let fact_id = match &self.fact_id {
            Some(Value::Number(n)) => n
                .as_u64()
                .map(FactId::new)
                .ok_or_else(|| ServiceError::validation("factId must be a positive integer"))?,
            Some(Value::String(s)) if !s.trim().is_empty() => s
                .parse::<FactId>()
                .map_err(|_| ServiceError::validation("factId must be a positive integer"))?,
            _ => return Err(ServiceError::validation("factId is required")),
        };

        let Some(Value::Bool(success)) = &self.success else {
            return Err(ServiceError::validation("success must be a boolean"));
        };

        Ok((fact_id, *success))
    }
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Records review outcomes into the append-only history.
#[derive(Clone)]
pub struct ReviewService {
    clock: Clock,
    scheduler: Scheduler,
    catalog: Arc<dyn CatalogRepository>,
    records: Arc<dyn ReviewRecordRepository>,
}

impl ReviewService {
    /// Create a review service using the default two-tier policy.
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn CatalogRepository>,
        records: Arc<dyn ReviewRecordRepository>,
    ) -> Self {
        Self {
            clock,
            scheduler: Scheduler::new(),
            catalog,
            records,
        }
    }

    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Override the clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Append one review outcome for a fact the caller owns.
    ///
    /// Each call appends a new record, so a retried request records twice; the
    /// later record decides due status.
    ///
    /// # Errors
    ///
    /// Returns `Authentication` without identity, `NotFound` if the fact is absent
    /// or belongs to someone else, and `Storage` if the append fails.
    pub async fn record_review(
        &self,
        identity: Option<UserId>,
        fact_id: FactId,
        success: bool,
    ) -> Result<ReviewRecord, ServiceError> {
        let user = require_identity(identity)?;
        self.record_for(user, fact_id, success).await
    }

    /// Validate a raw submission, then record it.
    ///
    /// # Errors
    ///
    /// Returns `Authentication` first, then `Validation` for malformed input
    /// (before any repository access), then the errors of `record_review`.
    pub async fn record_review_submission(
        &self,
        identity: Option<UserId>,
        submission: &ReviewSubmission,
    ) -> Result<ReviewRecord, ServiceError> {
        let user = require_identity(identity)?;
        let (fact_id, success) = submission.parse()?;
        self.record_for(user, fact_id, success).await
    }

    /// Full review history of an owned fact, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `Authentication` without identity and `NotFound` for facts the caller
    /// does not own.
    pub async fn review_history(
        &self,
        identity: Option<UserId>,
        fact_id: FactId,
    ) -> Result<Vec<ReviewRecord>, ServiceError> {
        let user = require_identity(identity)?;
        self.catalog.owned_fact(user, fact_id).await?;
        Ok(self.records.records_for_fact(user, fact_id).await?)
    }

    async fn record_for(
        &self,
        user: UserId,
        fact_id: FactId,
        success: bool,
    ) -> Result<ReviewRecord, ServiceError> {
        self.catalog.owned_fact(user, fact_id).await?;

        let reviewed_at = self.clock.now();
        let draft = self.scheduler.schedule(fact_id, user, success, reviewed_at);
        debug!(
            fact = %fact_id,
            success,
            next_review_at = %draft.next_review_at,
            "scheduled next review"
        );

        let record = self.records.append_record(&draft).await?;
        info!(record = %record.id, fact = %fact_id, user = %user, success, "recorded review");
        Ok(record)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
