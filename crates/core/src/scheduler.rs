use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::model::{FactId, NewReviewRecord, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchedulerError {
    #[error("{field} must be positive, got {minutes} minutes")]
    NonPositiveInterval { field: &'static str, minutes: i64 },

    #[error("success interval ({success_minutes}m) must not be shorter than retry interval ({retry_minutes}m)")]
    NonMonotonic {
        success_minutes: i64,
        retry_minutes: i64,
    },

    #[error("{field} of {minutes} minutes exceeds the {max} minute limit")]
    IntervalTooLong {
        field: &'static str,
        minutes: i64,
        max: i64,
    },

    #[error("utc offset out of range: {minutes} minutes")]
    InvalidOffset { minutes: i32 },
}

//
// ─── POLICY ────────────────────────────────────────────────────────────────────
//

/// Maps a review outcome to the next instant the fact becomes due.
///
/// Implementations must keep scheduling monotonic: for the same fact at the same
/// instant, a success never yields an earlier `next_review_at` than a failure.
pub trait ReviewPolicy: Send + Sync + fmt::Debug {
    fn next_review_at(&self, success: bool, reviewed_at: DateTime<Utc>) -> DateTime<Utc>;
}

/// Two-tier policy: successes come back after a long interval, failures after
/// a short same-day retry interval. No ease factors, no growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwoTierPolicy {
    success_interval: Duration,
    retry_interval: Duration,
}

impl TwoTierPolicy {
    /// One day after a success.
    pub const DEFAULT_SUCCESS_MINUTES: i64 = 24 * 60;
    /// Ten minutes after a failure.
    pub const DEFAULT_RETRY_MINUTES: i64 = 10;
    /// Longest accepted interval: about ten years.
    pub const MAX_INTERVAL_MINUTES: i64 = 10 * 366 * 24 * 60;

    /// # Errors
    ///
    /// Returns `SchedulerError::NonPositiveInterval` for zero/negative intervals,
    /// `SchedulerError::IntervalTooLong` past `MAX_INTERVAL_MINUTES` and
    /// `SchedulerError::NonMonotonic` if the success interval is shorter than the retry one.
    pub fn new(success_interval: Duration, retry_interval: Duration) -> Result<Self, SchedulerError> {
        for (field, interval) in [
            ("success interval", success_interval),
            ("retry interval", retry_interval),
        ] {
            if interval.num_minutes() > Self::MAX_INTERVAL_MINUTES {
                return Err(SchedulerError::IntervalTooLong {
                    field,
                    minutes: interval.num_minutes(),
                    max: Self::MAX_INTERVAL_MINUTES,
                });
            }
        }
        if success_interval <= Duration::zero() {
            return Err(SchedulerError::NonPositiveInterval {
                field: "success interval",
                minutes: success_interval.num_minutes(),
            });
        }
        if retry_interval <= Duration::zero() {
            return Err(SchedulerError::NonPositiveInterval {
                field: "retry interval",
                minutes: retry_interval.num_minutes(),
            });
        }
        if success_interval < retry_interval {
            return Err(SchedulerError::NonMonotonic {
                success_minutes: success_interval.num_minutes(),
                retry_minutes: retry_interval.num_minutes(),
            });
        }
        Ok(Self {
            success_interval,
            retry_interval,
        })
    }

    #[must_use]
    pub fn success_interval(&self) -> Duration {
        self.success_interval
    }

    #[must_use]
    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }
}

impl Default for TwoTierPolicy {
    fn default() -> Self {
        Self {
            success_interval: Duration::minutes(Self::DEFAULT_SUCCESS_MINUTES),
            retry_interval: Duration::minutes(Self::DEFAULT_RETRY_MINUTES),
        }
    }
}

impl ReviewPolicy for TwoTierPolicy {
    fn next_review_at(&self, success: bool, reviewed_at: DateTime<Utc>) -> DateTime<Utc> {
        let interval = if success {
            self.success_interval
        } else {
            self.retry_interval
        };
        reviewed_at
            .checked_add_signed(interval)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// Externally configurable scheduling knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub success_interval_minutes: i64,
    pub retry_interval_minutes: i64,
    /// Offset used for "midnight" and day keys in progress reports.
    pub utc_offset_minutes: i32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            success_interval_minutes: TwoTierPolicy::DEFAULT_SUCCESS_MINUTES,
            retry_interval_minutes: TwoTierPolicy::DEFAULT_RETRY_MINUTES,
            utc_offset_minutes: 0,
        }
    }
}

impl SchedulerSettings {
    /// # Errors
    ///
    /// Returns `SchedulerError::IntervalTooLong` for minute counts chrono cannot
    /// represent, otherwise see `TwoTierPolicy::new`.
    pub fn policy(&self) -> Result<TwoTierPolicy, SchedulerError> {
        TwoTierPolicy::new(
            minutes("success interval", self.success_interval_minutes)?,
            minutes("retry interval", self.retry_interval_minutes)?,
        )
    }

    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidOffset` if the offset is not within ±24h.
    pub fn offset(&self) -> Result<FixedOffset, SchedulerError> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(SchedulerError::InvalidOffset {
                minutes: self.utc_offset_minutes,
            })
    }
}

fn minutes(field: &'static str, minutes: i64) -> Result<Duration, SchedulerError> {
    Duration::try_minutes(minutes).ok_or(SchedulerError::IntervalTooLong {
        field,
        minutes,
        max: TwoTierPolicy::MAX_INTERVAL_MINUTES,
    })
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// Turns a review outcome into a new, not-yet-persisted review record.
#[derive(Debug, Clone)]
pub struct Scheduler {
    policy: Arc<dyn ReviewPolicy>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(Arc::new(TwoTierPolicy::default()))
    }

    #[must_use]
    pub fn with_policy(policy: Arc<dyn ReviewPolicy>) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> &dyn ReviewPolicy {
        self.policy.as_ref()
    }

    /// Build the record to append for one review attempt.
    #[must_use]
    pub fn schedule(
        &self,
        fact_id: FactId,
        user_id: UserId,
        success: bool,
        reviewed_at: DateTime<Utc>,
    ) -> NewReviewRecord {
        NewReviewRecord {
            fact_id,
            user_id,
            success,
            next_review_at: self.policy.next_review_at(success, reviewed_at),
            created_at: reviewed_at,
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn success_schedules_next_day() {
        let policy = TwoTierPolicy::default();
        let now = fixed_now();
        assert_eq!(policy.next_review_at(true, now), now + Duration::days(1));
    }

    #[test]
    fn failure_schedules_ten_minute_retry() {
        let policy = TwoTierPolicy::default();
        let now = fixed_now();
        assert_eq!(policy.next_review_at(false, now), now + Duration::minutes(10));
    }

    #[test]
    fn success_is_never_earlier_than_failure() {
        let policy = TwoTierPolicy::new(Duration::minutes(30), Duration::minutes(30)).unwrap();
        let now = fixed_now();
        assert!(policy.next_review_at(true, now) >= policy.next_review_at(false, now));
    }

    #[test]
    fn rejects_non_monotonic_configuration() {
        let err = TwoTierPolicy::new(Duration::minutes(5), Duration::minutes(10)).unwrap_err();
        assert!(matches!(err, SchedulerError::NonMonotonic { .. }));
    }

    #[test]
    fn rejects_non_positive_intervals() {
        assert!(matches!(
            TwoTierPolicy::new(Duration::zero(), Duration::minutes(1)),
            Err(SchedulerError::NonPositiveInterval { field: "success interval", .. })
        ));
        assert!(matches!(
            TwoTierPolicy::new(Duration::days(1), Duration::minutes(-1)),
            Err(SchedulerError::NonPositiveInterval { field: "retry interval", .. })
        ));
    }

    #[test]
    fn huge_configured_intervals_are_errors() {
        for success_interval_minutes in [i64::MAX, 140_000_000_000_000] {
            let settings = SchedulerSettings {
                success_interval_minutes,
                ..SchedulerSettings::default()
            };
            assert!(matches!(
                settings.policy(),
                Err(SchedulerError::IntervalTooLong { field: "success interval", .. })
            ));
        }

        let settings = SchedulerSettings {
            retry_interval_minutes: i64::MAX / 2,
            ..SchedulerSettings::default()
        };
        assert!(matches!(
            settings.policy(),
            Err(SchedulerError::IntervalTooLong { field: "retry interval", .. })
        ));
    }

    #[test]
    fn longest_interval_is_accepted() {
        let max = Duration::minutes(TwoTierPolicy::MAX_INTERVAL_MINUTES);
        let policy = TwoTierPolicy::new(max, Duration::minutes(10)).unwrap();
        assert_eq!(policy.next_review_at(true, fixed_now()), fixed_now() + max);
        assert!(matches!(
            TwoTierPolicy::new(max + Duration::minutes(1), Duration::minutes(10)),
            Err(SchedulerError::IntervalTooLong { .. })
        ));
    }

    #[test]
    fn scheduling_near_the_end_of_time_saturates() {
        let policy = TwoTierPolicy::default();
        let late = DateTime::<Utc>::MAX_UTC - Duration::minutes(1);
        assert_eq!(policy.next_review_at(true, late), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn settings_default_to_two_tier_policy() {
        let settings = SchedulerSettings::default();
        assert_eq!(settings.policy().unwrap(), TwoTierPolicy::default());
        assert_eq!(settings.offset().unwrap().local_minus_utc(), 0);
    }

    #[test]
    fn settings_reject_out_of_range_offset() {
        let settings = SchedulerSettings {
            utc_offset_minutes: 25 * 60,
            ..SchedulerSettings::default()
        };
        assert!(matches!(
            settings.offset(),
            Err(SchedulerError::InvalidOffset { .. })
        ));
    }

    #[test]
    fn scheduler_builds_unsaved_record() {
        let scheduler = Scheduler::new();
        let now = fixed_now();
        let record = scheduler.schedule(FactId::new(3), UserId::new(7), false, now);

        assert_eq!(record.fact_id, FactId::new(3));
        assert_eq!(record.user_id, UserId::new(7));
        assert!(!record.success);
        assert_eq!(record.created_at, now);
        assert_eq!(record.next_review_at, now + Duration::minutes(10));
    }
}
