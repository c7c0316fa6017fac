use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::catalog::LanguageCode;
use crate::model::ids::{SessionSummaryId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionSummaryError {
    #[error("ended_at is before started_at")]
    InvalidTimeRange,

    #[error("words retained ({retained}) exceeds words seen ({seen})")]
    RetainedExceedsSeen { seen: u32, retained: u32 },

    #[error("unknown session mode: {0}")]
    UnknownMode(String),

    #[error("unknown review direction: {0}")]
    UnknownDirection(String),
}

//
// ─── MODE / DIRECTION ──────────────────────────────────────────────────────────
//

/// How facts are presented during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Reveal-and-grade cards.
    Flashcard,
    /// The learner types the answer; wrong answers may be deferred to a retry round.
    Dictation,
}

impl SessionMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::Flashcard => "flashcard",
            SessionMode::Dictation => "dictation",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionMode {
    type Err = SessionSummaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "flashcard" => Ok(SessionMode::Flashcard),
            "dictation" => Ok(SessionMode::Dictation),
            other => Err(SessionSummaryError::UnknownMode(other.to_owned())),
        }
    }
}

/// Which side of the fact is shown as the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Show the term (foreign), answer with the definition (native).
    ForeignToNative,
    /// Show the definition (native), answer with the term (foreign).
    NativeToForeign,
}

impl Direction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::ForeignToNative => "term_to_def",
            Direction::NativeToForeign => "def_to_term",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = SessionSummaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "term_to_def" => Ok(Direction::ForeignToNative),
            "def_to_term" => Ok(Direction::NativeToForeign),
            other => Err(SessionSummaryError::UnknownDirection(other.to_owned())),
        }
    }
}

//
// ─── SUMMARY ───────────────────────────────────────────────────────────────────
//

/// A session summary ready to be persisted (no id yet).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummaryDraft {
    user_id: UserId,
    mode: SessionMode,
    direction: Direction,
    language: Option<LanguageCode>,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    duration_seconds: u64,
    words_seen: u32,
    words_retained: u32,
    words_written: u32,
}

impl SessionSummaryDraft {
    /// Validate counters and time range.
    ///
    /// # Errors
    ///
    /// Returns `SessionSummaryError::InvalidTimeRange` if `ended_at` precedes
    /// `started_at`, or `RetainedExceedsSeen` if the counters are inconsistent.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: UserId,
        mode: SessionMode,
        direction: Direction,
        language: Option<LanguageCode>,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        words_seen: u32,
        words_retained: u32,
        words_written: u32,
    ) -> Result<Self, SessionSummaryError> {
        if ended_at < started_at {
            return Err(SessionSummaryError::InvalidTimeRange);
        }
        if words_retained > words_seen {
            return Err(SessionSummaryError::RetainedExceedsSeen {
                seen: words_seen,
                retained: words_retained,
            });
        }
        let duration_seconds =
            u64::try_from(ended_at.signed_duration_since(started_at).num_seconds()).unwrap_or(0);

        Ok(Self {
            user_id,
            mode,
            direction,
            language,
            started_at,
            ended_at,
            duration_seconds,
            words_seen,
            words_retained,
            words_written,
        })
    }

    #[must_use]
    pub fn assign_id(self, id: SessionSummaryId) -> SessionSummary {
        SessionSummary { id, draft: self }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn language(&self) -> Option<&LanguageCode> {
        self.language.as_ref()
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    #[must_use]
    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    #[must_use]
    pub fn words_seen(&self) -> u32 {
        self.words_seen
    }

    #[must_use]
    pub fn words_retained(&self) -> u32 {
        self.words_retained
    }

    #[must_use]
    pub fn words_written(&self) -> u32 {
        self.words_written
    }
}

/// Persisted, immutable summary of one completed or abandoned review session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    id: SessionSummaryId,
    draft: SessionSummaryDraft,
}

impl SessionSummary {
    /// Rehydrate a summary from storage.
    ///
    /// The stored duration is kept as-is rather than recomputed, so rows written
    /// by other clients keep their reported value.
    ///
    /// # Errors
    ///
    /// Same validation as `SessionSummaryDraft::new`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: SessionSummaryId,
        user_id: UserId,
        mode: SessionMode,
        direction: Direction,
        language: Option<LanguageCode>,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        duration_seconds: u64,
        words_seen: u32,
        words_retained: u32,
        words_written: u32,
    ) -> Result<Self, SessionSummaryError> {
        let mut draft = SessionSummaryDraft::new(
            user_id,
            mode,
            direction,
            language,
            started_at,
            ended_at,
            words_seen,
            words_retained,
            words_written,
        )?;
        draft.duration_seconds = duration_seconds;
        Ok(draft.assign_id(id))
    }

    #[must_use]
    pub fn id(&self) -> SessionSummaryId {
        self.id
    }

    #[must_use]
    pub fn draft(&self) -> &SessionSummaryDraft {
        &self.draft
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.draft.user_id
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.draft.mode
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.draft.direction
    }

    #[must_use]
    pub fn language(&self) -> Option<&LanguageCode> {
        self.draft.language.as_ref()
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.draft.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> DateTime<Utc> {
        self.draft.ended_at
    }

    #[must_use]
    pub fn duration_seconds(&self) -> u64 {
        self.draft.duration_seconds
    }

    #[must_use]
    pub fn words_seen(&self) -> u32 {
        self.draft.words_seen
    }

    #[must_use]
    pub fn words_retained(&self) -> u32 {
        self.draft.words_retained
    }

    #[must_use]
    pub fn words_written(&self) -> u32 {
        self.draft.words_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn draft(start: DateTime<Utc>, end: DateTime<Utc>, seen: u32, retained: u32) -> Result<SessionSummaryDraft, SessionSummaryError> {
        SessionSummaryDraft::new(
            UserId::new(1),
            SessionMode::Flashcard,
            Direction::ForeignToNative,
            None,
            start,
            end,
            seen,
            retained,
            0,
        )
    }

    #[test]
    fn duration_is_computed_in_whole_seconds() {
        let now = fixed_now();
        let d = draft(now, now + Duration::milliseconds(90_500), 3, 2).unwrap();
        assert_eq!(d.duration_seconds(), 90);
    }

    #[test]
    fn rejects_inverted_time_range() {
        let now = fixed_now();
        let err = draft(now, now - Duration::seconds(1), 0, 0).unwrap_err();
        assert_eq!(err, SessionSummaryError::InvalidTimeRange);
    }

    #[test]
    fn rejects_retained_above_seen() {
        let now = fixed_now();
        let err = draft(now, now, 1, 2).unwrap_err();
        assert!(matches!(err, SessionSummaryError::RetainedExceedsSeen { .. }));
    }

    #[test]
    fn mode_and_direction_round_trip_storage_names() {
        for mode in [SessionMode::Flashcard, SessionMode::Dictation] {
            assert_eq!(mode.as_str().parse::<SessionMode>().unwrap(), mode);
        }
        for dir in [Direction::ForeignToNative, Direction::NativeToForeign] {
            assert_eq!(dir.as_str().parse::<Direction>().unwrap(), dir);
        }
        assert!("quiz".parse::<SessionMode>().is_err());
    }

    #[test]
    fn persisted_summary_keeps_stored_duration() {
        let now = fixed_now();
        let summary = SessionSummary::from_persisted(
            SessionSummaryId::new(5),
            UserId::new(1),
            SessionMode::Dictation,
            Direction::NativeToForeign,
            Some(LanguageCode::new("eng").unwrap()),
            now,
            now + Duration::minutes(2),
            42,
            4,
            3,
            5,
        )
        .unwrap();
        assert_eq!(summary.id(), SessionSummaryId::new(5));
        assert_eq!(summary.duration_seconds(), 42);
        assert_eq!(summary.language().map(LanguageCode::as_str), Some("eng"));
    }
}
