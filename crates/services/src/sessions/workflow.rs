use std::sync::Arc;

use tracing::{debug, info, warn};

use storage::repository::{CatalogRepository, ReviewRecordRepository, SessionSummaryRepository};
use vocab_core::answer::answers_match;
use vocab_core::model::{
    Direction, ReviewRecord, Scope, SessionMode, SessionSummary, SessionSummaryId, UserId,
};
use vocab_core::scheduler::Scheduler;

use super::session::ReviewSession;
use crate::Clock;
use crate::due_service::DueSetService;
use crate::error::{ServiceError, SessionError, require_identity};
use crate::review_service::ReviewService;

/// Outcome of starting a session.
#[derive(Debug, Clone)]
pub enum SessionStart {
    /// The scope has nothing due; no session and no summary are created.
    NothingDue,
    Started(ReviewSession),
}

/// Result of answering a single fact in a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionAnswerResult {
    pub record: ReviewRecord,
    pub is_complete: bool,
    pub summary_id: Option<SessionSummaryId>,
}

/// Outcome of a written dictation answer.
#[derive(Debug, Clone, PartialEq)]
pub enum WrittenOutcome {
    /// Recorded as a success; the session moved on.
    Correct(SessionAnswerResult),
    /// Counted as written, nothing recorded; the fact stays current.
    Incorrect { expected: String },
}

/// Orchestrates session start, persisted answering and the single summary flush.
#[derive(Clone)]
pub struct SessionLoopService {
    clock: Clock,
    due: DueSetService,
    reviews: ReviewService,
    summaries: Arc<dyn SessionSummaryRepository>,
}

impl SessionLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn CatalogRepository>,
        records: Arc<dyn ReviewRecordRepository>,
        summaries: Arc<dyn SessionSummaryRepository>,
    ) -> Self {
        Self {
            clock,
            due: DueSetService::new(clock, Arc::clone(&catalog), Arc::clone(&records)),
            reviews: ReviewService::new(clock, catalog, records),
            summaries,
        }
    }

    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.reviews = self.reviews.with_scheduler(scheduler);
        self
    }

    /// Start a session over the facts of `scope` that are due now.
    ///
    /// # Errors
    ///
    /// Same as [`DueSetService::select_due`].
    pub async fn start_session(
        &self,
        identity: Option<UserId>,
        scope: &Scope,
        mode: SessionMode,
        direction: Direction,
    ) -> Result<SessionStart, SessionError> {
        let user = require_identity(identity)?;
        let now = self.clock.now();
        let due = self.due.due_set(Some(user), scope, now).await?;
        if due.facts.is_empty() {
            debug!(user = %user, ?scope, "nothing due, session not started");
            return Ok(SessionStart::NothingDue);
        }

        info!(user = %user, %mode, facts = due.facts.len(), "session started");
        let session = ReviewSession::start(user, mode, direction, due.language, due.facts, now)?;
        Ok(SessionStart::Started(session))
    }

    /// Record a self-graded answer for the current fact and move on.
    ///
    /// Flushes the summary when this was the last fact. If the review cannot be
    /// stored the session is left exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` when nothing is current, and storage or
    /// ownership errors from recording or flushing.
    pub async fn answer_current(
        &self,
        session: &mut ReviewSession,
        success: bool,
    ) -> Result<SessionAnswerResult, SessionError> {
        let fact = session.current_fact()?;
        let record = self
            .reviews
            .record_review(Some(session.user_id()), fact.id(), success)
            .await?;

        session.aggregator_mut().record_review(success)?;
        session.advance();
        self.finish(session, record).await
    }

    /// Check a written answer in a dictation session.
    ///
    /// Every non-blank submission counts as written. A correct answer is recorded
    /// as a success; a wrong one leaves the fact current so the learner can retry,
    /// give up with [`Self::fail_current`] or defer it.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for flashcard sessions or blank answers, plus the
    /// errors of [`Self::answer_current`].
    pub async fn submit_written(
        &self,
        session: &mut ReviewSession,
        answer: &str,
    ) -> Result<WrittenOutcome, SessionError> {
        if session.mode() != SessionMode::Dictation {
            return Err(ServiceError::validation("written answers need a dictation session").into());
        }
        if answer.trim().is_empty() {
            return Err(ServiceError::validation("answer must not be blank").into());
        }
        let fact = session.current_fact()?;
        let expected = session
            .expected_answer()
            .map(str::to_owned)
            .ok_or(SessionError::Completed)?;

        if !answers_match(answer, &expected) {
            session.aggregator_mut().record_written(answer)?;
            debug!(fact = %fact.id(), "written answer did not match");
            return Ok(WrittenOutcome::Incorrect { expected });
        }

        let record = self
            .reviews
            .record_review(Some(session.user_id()), fact.id(), true)
            .await?;
        let aggregator = session.aggregator_mut();
        aggregator.record_written(answer)?;
        aggregator.record_review(true)?;
        session.advance();
        Ok(WrittenOutcome::Correct(self.finish(session, record).await?))
    }

    /// Give up on the current dictation fact: record a failure and move on.
    ///
    /// # Errors
    ///
    /// Same as [`Self::answer_current`].
    pub async fn fail_current(
        &self,
        session: &mut ReviewSession,
    ) -> Result<SessionAnswerResult, SessionError> {
        self.answer_current(session, false).await
    }

    /// End the session early. Persists a summary of the progress so far, even
    /// with zero reviews; a session that already flushed returns its summary id.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Service` if the summary cannot be stored; the flush
    /// can be retried.
    pub async fn exit(&self, session: &mut ReviewSession) -> Result<SessionSummaryId, SessionError> {
        if let Some(id) = session.summary_id() {
            return Ok(id);
        }
        let summary = self.flush(session).await?.ok_or(SessionError::Completed)?;
        Ok(summary.id())
    }

    /// Retry persisting the summary of a drained session whose flush failed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if the session still has facts left.
    pub async fn finalize_summary(
        &self,
        session: &mut ReviewSession,
    ) -> Result<SessionSummaryId, SessionError> {
        if let Some(id) = session.summary_id() {
            return Ok(id);
        }
        if !session.is_drained() {
            return Err(SessionError::Completed);
        }
        self.exit(session).await
    }

    async fn finish(
        &self,
        session: &mut ReviewSession,
        record: ReviewRecord,
    ) -> Result<SessionAnswerResult, SessionError> {
        if session.is_drained() {
            self.flush(session).await?;
        }
        Ok(SessionAnswerResult {
            record,
            is_complete: session.is_complete(),
            summary_id: session.summary_id(),
        })
    }

    /// Persist the summary once. `Ok(None)` means another path already flushed.
    async fn flush(&self, session: &mut ReviewSession) -> Result<Option<SessionSummary>, SessionError> {
        let now = self.clock.now();
        let Some(draft) = session.aggregator_mut().begin_flush(now)? else {
            return Ok(None);
        };

        match self.summaries.append_summary(&draft).await {
            Ok(summary) => {
                session.aggregator_mut().complete_flush(summary.id());
                info!(
                    summary = %summary.id(),
                    user = %summary.user_id(),
                    seen = summary.words_seen(),
                    retained = summary.words_retained(),
                    written = summary.words_written(),
                    duration_seconds = summary.duration_seconds(),
                    "session summary stored"
                );
                Ok(Some(summary))
            }
            Err(err) => {
                session.aggregator_mut().abort_flush();
                warn!(error = %err, "failed to store session summary");
                Err(err.into())
            }
        }
    }
}
