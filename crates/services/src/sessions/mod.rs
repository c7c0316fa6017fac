mod session;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use session::ReviewSession;
pub use workflow::{SessionAnswerResult, SessionLoopService, SessionStart, WrittenOutcome};
