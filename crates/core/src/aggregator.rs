//! Session-scoped counters with a guarded, single flush.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{
    Direction, LanguageCode, SessionMode, SessionSummaryDraft, SessionSummaryError,
    SessionSummaryId, UserId,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AggregatorError {
    #[error("session already started")]
    AlreadyStarted,

    #[error("session is not in progress")]
    NotInProgress,

    #[error("written answers are only counted in dictation mode")]
    NotDictation,

    #[error(transparent)]
    Summary(#[from] SessionSummaryError),
}

/// Lifecycle of a session aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    NotStarted,
    InProgress,
    /// A summary draft has been handed out and is being persisted.
    Flushing,
    Flushed { summary_id: SessionSummaryId },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounters {
    pub words_seen: u32,
    pub words_retained: u32,
    pub words_written: u32,
}

/// Accumulates per-session counters and produces exactly one summary draft.
///
/// `NotStarted → InProgress → Flushing → Flushed`. A failed persist may go back
/// from `Flushing` to `InProgress` via [`SessionAggregator::abort_flush`].
#[derive(Debug, Clone)]
pub struct SessionAggregator {
    user_id: UserId,
    mode: SessionMode,
    direction: Direction,
    language: Option<LanguageCode>,
    state: AggregatorState,
    started_at: Option<DateTime<Utc>>,
    counters: SessionCounters,
}

impl SessionAggregator {
    #[must_use]
    pub fn new(
        user_id: UserId,
        mode: SessionMode,
        direction: Direction,
        language: Option<LanguageCode>,
    ) -> Self {
        Self {
            user_id,
            mode,
            direction,
            language,
            state: AggregatorState::NotStarted,
            started_at: None,
            counters: SessionCounters::default(),
        }
    }

    /// # Errors
    ///
    /// Returns `AggregatorError::AlreadyStarted` unless the aggregator is `NotStarted`.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), AggregatorError> {
        if self.state != AggregatorState::NotStarted {
            return Err(AggregatorError::AlreadyStarted);
        }
        self.started_at = Some(now);
        self.state = AggregatorState::InProgress;
        Ok(())
    }

    /// Count one completed review.
    ///
    /// # Errors
    ///
    /// Returns `AggregatorError::NotInProgress` outside of `InProgress`.
    pub fn record_review(&mut self, success: bool) -> Result<(), AggregatorError> {
        self.ensure_in_progress()?;
        self.counters.words_seen = self.counters.words_seen.saturating_add(1);
        if success {
            self.counters.words_retained = self.counters.words_retained.saturating_add(1);
        }
        Ok(())
    }

    /// Count a submitted dictation answer, whatever its correctness.
    ///
    /// Returns `false` (and counts nothing) for a blank answer.
    ///
    /// # Errors
    ///
    /// Returns `AggregatorError::NotDictation` in flashcard sessions and
    /// `AggregatorError::NotInProgress` outside of `InProgress`.
    pub fn record_written(&mut self, answer: &str) -> Result<bool, AggregatorError> {
        if self.mode != SessionMode::Dictation {
            return Err(AggregatorError::NotDictation);
        }
        self.ensure_in_progress()?;
        if answer.trim().is_empty() {
            return Ok(false);
        }
        self.counters.words_written = self.counters.words_written.saturating_add(1);
        Ok(true)
    }

    /// Hand out the summary draft, once.
    ///
    /// Returns `Ok(None)` when a flush is already underway or done, so a second
    /// termination trigger is a no-op. An aggregator that never started is started
    /// at `now`, yielding a zero-progress summary.
    ///
    /// # Errors
    ///
    /// Returns `AggregatorError::Summary` if the draft fails validation.
    pub fn begin_flush(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionSummaryDraft>, AggregatorError> {
        match self.state {
            AggregatorState::Flushing | AggregatorState::Flushed { .. } => return Ok(None),
            AggregatorState::NotStarted => self.start(now)?,
            AggregatorState::InProgress => {}
        }

        let started_at = self.started_at.unwrap_or(now);
        // Clock skew must not produce a negative duration.
        let ended_at = now.max(started_at);

        let draft = SessionSummaryDraft::new(
            self.user_id,
            self.mode,
            self.direction,
            self.language.clone(),
            started_at,
            ended_at,
            self.counters.words_seen,
            self.counters.words_retained,
            self.counters.words_written,
        )?;
        self.state = AggregatorState::Flushing;
        Ok(Some(draft))
    }

    /// Mark the handed-out draft as persisted.
    pub fn complete_flush(&mut self, summary_id: SessionSummaryId) {
        if self.state == AggregatorState::Flushing {
            self.state = AggregatorState::Flushed { summary_id };
        }
    }

    /// Give the draft back after a failed persist so the flush can be retried.
    pub fn abort_flush(&mut self) {
        if self.state == AggregatorState::Flushing {
            self.state = AggregatorState::InProgress;
        }
    }

    #[must_use]
    pub fn state(&self) -> AggregatorState {
        self.state
    }

    #[must_use]
    pub fn counters(&self) -> SessionCounters {
        self.counters
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
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn summary_id(&self) -> Option<SessionSummaryId> {
        match self.state {
            AggregatorState::Flushed { summary_id } => Some(summary_id),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            AggregatorState::Flushing | AggregatorState::Flushed { .. }
        )
    }

    fn ensure_in_progress(&self) -> Result<(), AggregatorError> {
        if self.state == AggregatorState::InProgress {
            Ok(())
        } else {
            Err(AggregatorError::NotInProgress)
        }
    }
}
