use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{FactId, ReviewRecordId, UserId};

//
// ─── REVIEW RECORD ────────────────────────────────────────────────────────────
//

/// One review attempt of a fact by a learner.
///
/// Records form an append-only log: they are never mutated or deleted. The
/// latest record (greatest `created_at`, then greatest `id`) decides whether the
/// fact is due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: ReviewRecordId,
    pub fact_id: FactId,
    pub user_id: UserId,
    pub success: bool,
    pub next_review_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ReviewRecord {
    /// Ordering key that defines "most recent".
    #[must_use]
    pub fn recency_key(&self) -> (DateTime<Utc>, ReviewRecordId) {
        (self.created_at, self.id)
    }

    #[must_use]
    pub fn is_due_at(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at <= now
    }

    /// Pick the most recent record out of an unordered history.
    #[must_use]
    pub fn latest<'a, I>(records: I) -> Option<&'a ReviewRecord>
    where
        I: IntoIterator<Item = &'a ReviewRecord>,
    {
        records.into_iter().max_by_key(|r| r.recency_key())
    }
}

/// A review record that has not been assigned an id by the store yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReviewRecord {
    pub fact_id: FactId,
    pub user_id: UserId,
    pub success: bool,
    pub next_review_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl NewReviewRecord {
    #[must_use]
    pub fn assign_id(self, id: ReviewRecordId) -> ReviewRecord {
        ReviewRecord {
            id,
            fact_id: self.fact_id,
            user_id: self.user_id,
            success: self.success,
            next_review_at: self.next_review_at,
            created_at: self.created_at,
        }
    }
}

//
// ─── DUE STATE ─────────────────────────────────────────────────────────────────
//

/// Due status of a fact at a given instant. Derived on read, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueState {
    /// Never reviewed; due immediately.
    New,
    /// Latest record's `next_review_at` has passed.
    Due,
    /// Not eligible until the given instant.
    Deferred { until: DateTime<Utc> },
}

impl DueState {
    #[must_use]
    pub fn at(latest: Option<&ReviewRecord>, now: DateTime<Utc>) -> Self {
        match latest {
            None => DueState::New,
            Some(record) if record.is_due_at(now) => DueState::Due,
            Some(record) => DueState::Deferred {
                until: record.next_review_at,
            },
        }
    }

    #[must_use]
    pub fn is_due(self) -> bool {
        !matches!(self, DueState::Deferred { .. })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
