use std::sync::Arc;

use chrono::{FixedOffset, Offset, Utc};
use tracing::{debug, warn};

use storage::repository::SessionSummaryRepository;
use vocab_core::model::UserId;
use vocab_core::progress::{LanguageFilter, Period, ProgressReport, ProgressTotals};
use vocab_core::time::Clock;

use crate::error::{ServiceError, require_identity};

/// Builds progress reports from stored session summaries.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    offset: FixedOffset,
    summaries: Arc<dyn SessionSummaryRepository>,
}

impl ProgressService {
    /// Reports in UTC; use [`Self::with_offset`] for a learner's local calendar.
    #[must_use]
    pub fn new(clock: Clock, summaries: Arc<dyn SessionSummaryRepository>) -> Self {
        Self {
            clock,
            offset: Utc.fix(),
            summaries,
        }
    }

    #[must_use]
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Summarize the caller's sessions over `period`.
    ///
    /// Rows that cannot be read are skipped, logged and counted in
    /// `skipped_rows`; they never fail the report.
    ///
    /// # Errors
    ///
    /// Returns `Authentication` without identity and `Storage` if a query fails.
    pub async fn summarize(
        &self,
        identity: Option<UserId>,
        period: Period,
        languages: &LanguageFilter,
    ) -> Result<ProgressReport, ServiceError> {
        let user = require_identity(identity)?;
        let now = self.clock.now();
        let window = period.window(now, self.offset);

        let rows = self.summaries.list_summaries(user, &window, languages).await?;
        let mut totals = ProgressTotals::default();
        let mut skipped_rows = 0_u32;
        for row in rows {
            match row {
                Ok(summary) => totals.add(&summary, self.offset),
                Err(bad) => {
                    skipped_rows = skipped_rows.saturating_add(1);
                    warn!(row = bad.row_id, reason = %bad.reason, "skipping malformed session summary");
                }
            }
        }

        let available = self.summaries.distinct_languages(user, &window).await?;
        let report = ProgressReport::new(period, window, totals, available, skipped_rows);
        debug!(
            user = %user,
            %period,
            sessions = report.session_count,
            engagement = report.engagement_state.level(),
            "summarized progress"
        );
        Ok(report)
    }

    /// Summarize from raw query parameters such as `?period=month&languages=eng,fra`.
    ///
    /// An unknown or missing period falls back to a week.
    ///
    /// # Errors
    ///
    /// Returns `Authentication` first, then `Validation` for a malformed language
    /// code, then the errors of [`Self::summarize`].
    pub async fn summarize_query(
        &self,
        identity: Option<UserId>,
        period: Option<&str>,
        languages: Option<&str>,
    ) -> Result<ProgressReport, ServiceError> {
        let user = require_identity(identity)?;
        let period = Period::parse_or_default(period);
        let filter = match languages {
            Some(raw) => {
                LanguageFilter::parse(raw).map_err(|e| ServiceError::validation(e.to_string()))?
            }
            None => LanguageFilter::any(),
        };
        self.summarize(Some(user), period, &filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};
    use storage::repository::InMemoryRepository;
    use vocab_core::model::{Direction, LanguageCode, SessionMode, SessionSummaryDraft};
    use vocab_core::progress::EngagementState;
    use vocab_core::time::fixed_now;

    use crate::error::ErrorKind;

    fn lang(code: &str) -> LanguageCode {
        LanguageCode::new(code).unwrap()
    }

    async fn add(
        repo: &InMemoryRepository,
        started_at: DateTime<Utc>,
        minutes: i64,
        language: Option<&str>,
    ) {
        let draft = SessionSummaryDraft::new(
            UserId::new(1),
            SessionMode::Dictation,
            Direction::ForeignToNative,
            language.map(lang),
            started_at,
            started_at + Duration::minutes(minutes),
            4,
            3,
            2,
        )
        .unwrap();
        repo.append_summary(&draft).await.unwrap();
    }

    fn service(repo: &InMemoryRepository) -> ProgressService {
        ProgressService::new(Clock::fixed(fixed_now()), Arc::new(repo.clone()))
    }

    #[tokio::test]
    async fn empty_history_is_idle() {
        let repo = InMemoryRepository::new();
        let report = service(&repo)
            .summarize(Some(UserId::new(1)), Period::Week, &LanguageFilter::any())
            .await
            .unwrap();
        assert_eq!(report.engagement_state, EngagementState::Idle);
        assert_eq!(report.session_count, 0);
        assert!(report.daily_activity.is_empty());
    }

    #[tokio::test]
    async fn filter_narrows_totals_but_not_available_languages() {
        let repo = InMemoryRepository::new();
        let now = fixed_now();
        add(&repo, now - Duration::hours(1), 40, Some("fra")).await;
        add(&repo, now - Duration::days(1), 25, Some("eng")).await;
        add(&repo, now - Duration::days(30), 25, Some("deu")).await;

        let svc = service(&repo);
        let all = svc
            .summarize(Some(UserId::new(1)), Period::Week, &LanguageFilter::any())
            .await
            .unwrap();
        assert_eq!(all.total_duration_seconds, 65 * 60);
        assert_eq!(all.words_retained, 6);
        assert_eq!(all.words_written, 4);
        assert_eq!(all.daily_activity.len(), 2);
        assert_eq!(all.engagement_state, EngagementState::Peak);

        let french = svc
            .summarize(
                Some(UserId::new(1)),
                Period::Week,
                &LanguageFilter::of([lang("fra")]),
            )
            .await
            .unwrap();
        assert_eq!(french.session_count, 1);
        assert_eq!(french.available_languages, vec![lang("eng"), lang("fra")]);
    }

    #[tokio::test]
    async fn malformed_rows_are_skipped() {
        let repo = InMemoryRepository::new();
        let now = fixed_now();
        add(&repo, now - Duration::hours(2), 15, None).await;
        repo.push_malformed_summary(UserId::new(1), now - Duration::hours(1), None, "bad")
            .unwrap();

        let report = service(&repo)
            .summarize(Some(UserId::new(1)), Period::Day, &LanguageFilter::any())
            .await
            .unwrap();
        assert_eq!(report.session_count, 1);
        assert_eq!(report.skipped_rows, 1);
    }

    #[tokio::test]
    async fn local_offset_moves_day_buckets() {
        let repo = InMemoryRepository::new();
        // 22:13 UTC is already the next day two hours east.
        add(&repo, fixed_now(), 5, None).await;

        let east = FixedOffset::east_opt(2 * 3600).unwrap();
        let report = service(&repo)
            .with_offset(east)
            .summarize(Some(UserId::new(1)), Period::All, &LanguageFilter::any())
            .await
            .unwrap();
        assert!(report.daily_activity.contains_key("2023-11-15"));
    }

    #[tokio::test]
    async fn raw_query_parsing() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);

        let report = svc
            .summarize_query(Some(UserId::new(1)), Some("fortnight"), None)
            .await
            .unwrap();
        assert_eq!(report.period, Period::Week);

        let err = svc
            .summarize_query(Some(UserId::new(1)), None, Some("en9"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = svc.summarize_query(None, None, Some("en9")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }
}
