use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use vocab_core::aggregator::{AggregatorState, SessionAggregator, SessionCounters};
use vocab_core::model::{
    Direction, Fact, LanguageCode, SessionMode, SessionSummaryId, UserId,
};

use crate::error::{ServiceError, SessionError};

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory state of one review session.
///
/// Facts are worked through in due order. In dictation mode a fact may be
/// deferred to the later-queue; once the active queue runs dry the later-queue
/// becomes the next round. The session is drained when both are empty.
///
/// Persistence goes through [`super::SessionLoopService`]; this type only holds
/// queue and counter state.
#[derive(Debug, Clone)]
pub struct ReviewSession {
    user_id: UserId,
    language: Option<LanguageCode>,
    queue: VecDeque<Fact>,
    later: Vec<Fact>,
    round: u32,
    aggregator: SessionAggregator,
}

impl ReviewSession {
    pub(crate) fn start(
        user_id: UserId,
        mode: SessionMode,
        direction: Direction,
        language: Option<LanguageCode>,
        facts: Vec<Fact>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let mut aggregator = SessionAggregator::new(user_id, mode, direction, language.clone());
        aggregator.start(started_at)?;
        Ok(Self {
            user_id,
            language,
            queue: facts.into(),
            later: Vec::new(),
            round: 1,
            aggregator,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.aggregator.mode()
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.aggregator.direction()
    }

    #[must_use]
    pub fn language(&self) -> Option<&LanguageCode> {
        self.language.as_ref()
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.aggregator.started_at()
    }

    /// 1 for the first pass, incremented for each retry round.
    #[must_use]
    pub fn round(&self) -> u32 {
        self.round
    }

    #[must_use]
    pub fn counters(&self) -> SessionCounters {
        self.aggregator.counters()
    }

    #[must_use]
    pub fn state(&self) -> AggregatorState {
        self.aggregator.state()
    }

    #[must_use]
    pub fn summary_id(&self) -> Option<SessionSummaryId> {
        self.aggregator.summary_id()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.summary_id().is_some()
    }

    /// Facts left in the active queue, current one included.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn deferred(&self) -> usize {
        self.later.len()
    }

    #[must_use]
    pub fn current(&self) -> Option<&Fact> {
        if self.aggregator.is_finished() {
            return None;
        }
        self.queue.front()
    }

    /// Text shown to the learner for the current fact.
    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        let fact = self.current()?;
        Some(match self.direction() {
            Direction::ForeignToNative => fact.term(),
            Direction::NativeToForeign => fact.definition(),
        })
    }

    /// Text the learner is expected to produce for the current fact.
    #[must_use]
    pub fn expected_answer(&self) -> Option<&str> {
        let fact = self.current()?;
        Some(match self.direction() {
            Direction::ForeignToNative => fact.definition(),
            Direction::NativeToForeign => fact.term(),
        })
    }

    /// Move the current fact to the later-queue for a retry round.
    ///
    /// Counters are untouched; the fact is only counted once it is answered.
    ///
    /// # Errors
    ///
    /// Returns `Validation` in flashcard sessions and `Completed` when nothing is
    /// left to defer.
    pub fn defer_current(&mut self) -> Result<(), SessionError> {
        if self.mode() != SessionMode::Dictation {
            return Err(ServiceError::validation("only dictation sessions can defer").into());
        }
        if self.current().is_none() {
            return Err(SessionError::Completed);
        }
        if let Some(fact) = self.queue.pop_front() {
            self.later.push(fact);
        }
        self.refill();
        Ok(())
    }

    /// Both queues are empty and the summary has not been handed out yet.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.queue.is_empty() && self.later.is_empty() && !self.aggregator.is_finished()
    }

    pub(crate) fn current_fact(&self) -> Result<Fact, SessionError> {
        self.current().cloned().ok_or(SessionError::Completed)
    }

    pub(crate) fn aggregator_mut(&mut self) -> &mut SessionAggregator {
        &mut self.aggregator
    }

    /// Drop the current fact after it was answered.
    pub(crate) fn advance(&mut self) {
        self.queue.pop_front();
        self.refill();
    }

    fn refill(&mut self) {
        if self.queue.is_empty() && !self.later.is_empty() {
            self.queue = self.later.drain(..).collect();
            self.round = self.round.saturating_add(1);
        }
    }
}
