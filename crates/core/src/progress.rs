//! Aggregation of session summaries into progress reports.

use chrono::{DateTime, Days, FixedOffset, Months, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{CatalogError, LanguageCode, SessionSummary};
use crate::time::{Window, day_key, local_date, local_midnight};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("unknown period: {0}")]
    UnknownPeriod(String),

    #[error(transparent)]
    Language(#[from] CatalogError),
}

//
// ─── PERIOD ────────────────────────────────────────────────────────────────────
//

/// Reporting period selectable by the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
    All,
}

impl Period {
    /// Parse a period name, falling back to `Week` for anything unknown.
    #[must_use]
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        raw.and_then(|value| value.parse().ok()).unwrap_or(Period::Week)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
            Period::All => "all",
        }
    }

    /// Number of days the period nominally spans; used for the regularity ratio.
    #[must_use]
    pub fn cap_days(self) -> u32 {
        match self {
            Period::Day => 1,
            Period::Week => 7,
            Period::Month => 30,
            Period::Year => 365,
            Period::All => 9999,
        }
    }

    /// Time window `[start, now]` for this period.
    ///
    /// Bounded periods start at local midnight: today, six days back, one
    /// calendar month back or twelve months back.
    #[must_use]
    pub fn window(self, now: DateTime<Utc>, offset: FixedOffset) -> Window {
        let today = local_date(now, offset);
        let start_date = match self {
            Period::Day => Some(today),
            Period::Week => today.checked_sub_days(Days::new(6)),
            Period::Month => today.checked_sub_months(Months::new(1)),
            Period::Year => today.checked_sub_months(Months::new(12)),
            Period::All => None,
        };
        Window {
            start: start_date.map(|date| local_midnight(date, offset)),
            end: now,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = ProgressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "year" => Ok(Period::Year),
            "all" => Ok(Period::All),
            other => Err(ProgressError::UnknownPeriod(other.to_owned())),
        }
    }
}

//
// ─── LANGUAGE FILTER ───────────────────────────────────────────────────────────
//

/// Set of languages to keep; an empty filter keeps everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageFilter(BTreeSet<LanguageCode>);

impl LanguageFilter {
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn of(codes: impl IntoIterator<Item = LanguageCode>) -> Self {
        Self(codes.into_iter().collect())
    }

    /// Parse a comma separated list such as `"eng, fra"`; blank entries are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Language` for a malformed code.
    pub fn parse(raw: &str) -> Result<Self, ProgressError> {
        let mut codes = BTreeSet::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            codes.insert(LanguageCode::new(part)?);
        }
        Ok(Self(codes))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Set-membership test. Sessions without a language only pass an empty filter.
    #[must_use]
    pub fn matches(&self, language: Option<&LanguageCode>) -> bool {
        if self.0.is_empty() {
            return true;
        }
        language.is_some_and(|code| self.0.contains(code))
    }

    pub fn iter(&self) -> impl Iterator<Item = &LanguageCode> {
        self.0.iter()
    }
}

//
// ─── ENGAGEMENT ────────────────────────────────────────────────────────────────
//

/// 1–5 heuristic summarizing activity volume and regularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(into = "u8")]
pub enum EngagementState {
    Idle = 1,
    Light = 2,
    Steady = 3,
    Strong = 4,
    Peak = 5,
}

impl EngagementState {
    /// Evaluate thresholds from the highest state down and return the first met.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn evaluate(total_duration_seconds: u64, active_days: usize, period: Period) -> Self {
        let minutes = total_duration_seconds as f64 / 60.0;
        let days = active_days as f64;
        let regularity = days / f64::from(period.cap_days().min(30));

        if minutes >= 60.0 && regularity >= 0.2 {
            EngagementState::Peak
        } else if minutes >= 30.0 && regularity >= 0.15 {
            EngagementState::Strong
        } else if minutes >= 10.0 && active_days >= 2 {
            EngagementState::Steady
        } else if total_duration_seconds > 0 || active_days > 0 {
            EngagementState::Light
        } else {
            EngagementState::Idle
        }
    }

    #[must_use]
    pub fn level(self) -> u8 {
        self as u8
    }
}

impl From<EngagementState> for u8 {
    fn from(value: EngagementState) -> Self {
        value.level()
    }
}

//
// ─── REPORT ────────────────────────────────────────────────────────────────────
//

/// Histogram bucket for one calendar day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DayActivity {
    pub count: u32,
    pub duration_seconds: u64,
}

/// Running sums over session summaries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressTotals {
    pub session_count: u32,
    pub total_duration_seconds: u64,
    pub words_seen: u64,
    pub words_retained: u64,
    pub words_written: u64,
    pub daily_activity: BTreeMap<String, DayActivity>,
}

impl ProgressTotals {
    #[must_use]
    pub fn from_summaries<'a, I>(summaries: I, offset: FixedOffset) -> Self
    where
        I: IntoIterator<Item = &'a SessionSummary>,
    {
        let mut totals = Self::default();
        for summary in summaries {
            totals.add(summary, offset);
        }
        totals
    }

    pub fn add(&mut self, summary: &SessionSummary, offset: FixedOffset) {
        let duration = summary.duration_seconds();
        self.session_count = self.session_count.saturating_add(1);
        self.total_duration_seconds = self.total_duration_seconds.saturating_add(duration);
        self.words_seen = self.words_seen.saturating_add(u64::from(summary.words_seen()));
        self.words_retained = self
            .words_retained
            .saturating_add(u64::from(summary.words_retained()));
        self.words_written = self
            .words_written
            .saturating_add(u64::from(summary.words_written()));

        let bucket = self
            .daily_activity
            .entry(day_key(summary.started_at(), offset))
            .or_default();
        bucket.count = bucket.count.saturating_add(1);
        bucket.duration_seconds = bucket.duration_seconds.saturating_add(duration);
    }

    #[must_use]
    pub fn active_days(&self) -> usize {
        self.daily_activity.len()
    }
}

/// Progress over a period, as consumed by reporting screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressReport {
    pub period: Period,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: DateTime<Utc>,
    pub session_count: u32,
    pub total_duration_seconds: u64,
    pub words_seen: u64,
    pub words_retained: u64,
    pub words_written: u64,
    pub available_languages: Vec<LanguageCode>,
    pub daily_activity: BTreeMap<String, DayActivity>,
    pub engagement_state: EngagementState,
    /// Stored rows that could not be read and were left out of the totals.
    pub skipped_rows: u32,
}

impl ProgressReport {
    #[must_use]
    pub fn new(
        period: Period,
        window: Window,
        totals: ProgressTotals,
        available_languages: Vec<LanguageCode>,
        skipped_rows: u32,
    ) -> Self {
        let engagement_state =
            EngagementState::evaluate(totals.total_duration_seconds, totals.active_days(), period);
        let mut available_languages = available_languages;
        available_languages.sort();
        available_languages.dedup();

        Self {
            period,
            window_start: window.start,
            window_end: window.end,
            session_count: totals.session_count,
            total_duration_seconds: totals.total_duration_seconds,
            words_seen: totals.words_seen,
            words_retained: totals.words_retained,
            words_written: totals.words_written,
            available_languages,
            daily_activity: totals.daily_activity,
            engagement_state,
            skipped_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Direction, SessionMode, SessionSummaryId, UserId};
    use crate::time::fixed_now;
    use chrono::Duration;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn summary(started_at: DateTime<Utc>, seconds: i64, retained: u32) -> SessionSummary {
        SessionSummary::from_persisted(
            SessionSummaryId::new(1),
            UserId::new(1),
            SessionMode::Flashcard,
            Direction::ForeignToNative,
            None,
            started_at,
            started_at + Duration::seconds(seconds),
            u64::try_from(seconds).unwrap(),
            retained,
            retained,
            0,
        )
        .unwrap()
    }

    #[test]
    fn period_parsing_falls_back_to_week() {
        assert_eq!(Period::parse_or_default(Some("MONTH")), Period::Month);
        assert_eq!(Period::parse_or_default(Some("decade")), Period::Week);
        assert_eq!(Period::parse_or_default(None), Period::Week);
    }

    #[test]
    fn day_window_starts_at_local_midnight() {
        let window = Period::Day.window(fixed_now(), utc());
        assert_eq!(
            window.start.unwrap(),
            DateTime::parse_from_rfc3339("2023-11-14T00:00:00Z").unwrap()
        );
        assert_eq!(window.end, fixed_now());
    }

    #[test]
    fn week_window_covers_six_days_back_plus_today() {
        let window = Period::Week.window(fixed_now(), utc());
        assert_eq!(
            window.start.unwrap(),
            DateTime::parse_from_rfc3339("2023-11-08T00:00:00Z").unwrap()
        );
    }

    #[test]
    fn month_and_year_windows_use_calendar_arithmetic() {
        let month = Period::Month.window(fixed_now(), utc());
        assert_eq!(
            month.start.unwrap(),
            DateTime::parse_from_rfc3339("2023-10-14T00:00:00Z").unwrap()
        );
        let year = Period::Year.window(fixed_now(), utc());
        assert_eq!(
            year.start.unwrap(),
            DateTime::parse_from_rfc3339("2022-11-14T00:00:00Z").unwrap()
        );
        assert!(Period::All.window(fixed_now(), utc()).start.is_none());
    }

    #[test]
    fn language_filter_parses_and_matches() {
        let filter = LanguageFilter::parse("eng, ,FRA").unwrap();
        let eng = LanguageCode::new("eng").unwrap();
        let deu = LanguageCode::new("deu").unwrap();

        assert!(filter.matches(Some(&eng)));
        assert!(!filter.matches(Some(&deu)));
        assert!(!filter.matches(None));
        assert!(LanguageFilter::any().matches(None));
        assert!(LanguageFilter::parse("e1").is_err());
    }

    #[test]
    fn engagement_idle_without_activity() {
        assert_eq!(EngagementState::evaluate(0, 0, Period::Week), EngagementState::Idle);
    }

    #[test]
    fn engagement_peak_for_hour_over_two_days_in_week() {
        assert_eq!(
            EngagementState::evaluate(65 * 60, 2, Period::Week),
            EngagementState::Peak
        );
    }

    #[test]
    fn engagement_steady_for_fifteen_minutes_over_two_days() {
        assert_eq!(
            EngagementState::evaluate(15 * 60, 2, Period::Week),
            EngagementState::Steady
        );
    }

    #[test]
    fn engagement_strong_and_light_boundaries() {
        // 5 days over a month: 5/30 ≈ 0.167 → strong but not peak.
        assert_eq!(
            EngagementState::evaluate(90 * 60, 5, Period::Month),
            EngagementState::Strong
        );
        assert_eq!(
            EngagementState::evaluate(9 * 60, 3, Period::Week),
            EngagementState::Light
        );
        // A single active day never reaches steady.
        assert_eq!(
            EngagementState::evaluate(20 * 60, 1, Period::Day),
            EngagementState::Light
        );
        assert_eq!(EngagementState::Peak.level(), 5);
    }

    #[test]
    fn all_period_caps_regularity_at_thirty_days() {
        // 6/30 = 0.2
        assert_eq!(
            EngagementState::evaluate(60 * 60, 6, Period::All),
            EngagementState::Peak
        );
        assert_eq!(
            EngagementState::evaluate(60 * 60, 5, Period::All),
            EngagementState::Strong
        );
    }

    #[test]
    fn totals_group_by_start_day() {
        let now = fixed_now();
        let rows = vec![
            summary(now, 120, 2),
            summary(now - Duration::hours(1), 60, 1),
            summary(now - Duration::days(1), 30, 0),
        ];
        let totals = ProgressTotals::from_summaries(&rows, utc());

        assert_eq!(totals.session_count, 3);
        assert_eq!(totals.total_duration_seconds, 210);
        assert_eq!(totals.words_retained, 3);
        assert_eq!(totals.active_days(), 2);
        assert_eq!(
            totals.daily_activity["2023-11-14"],
            DayActivity {
                count: 2,
                duration_seconds: 180
            }
        );
    }

    #[test]
    fn report_sorts_languages_and_derives_state() {
        let now = fixed_now();
        let rows = vec![summary(now, 65 * 60, 1), summary(now - Duration::days(1), 0, 0)];
        let totals = ProgressTotals::from_summaries(&rows, utc());
        let report = ProgressReport::new(
            Period::Week,
            Period::Week.window(now, utc()),
            totals,
            vec![
                LanguageCode::new("fra").unwrap(),
                LanguageCode::new("eng").unwrap(),
                LanguageCode::new("fra").unwrap(),
            ],
            1,
        );

        assert_eq!(report.engagement_state, EngagementState::Peak);
        assert_eq!(
            report
                .available_languages
                .iter()
                .map(LanguageCode::as_str)
                .collect::<Vec<_>>(),
            vec!["eng", "fra"]
        );
        assert_eq!(report.skipped_rows, 1);
    }
}
