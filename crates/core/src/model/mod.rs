mod catalog;
mod ids;
mod review;
mod scope;
mod session;

pub use catalog::{CatalogError, Fact, Family, LanguageCode, List};
pub use ids::{FactId, FamilyId, ListId, ParseIdError, ReviewRecordId, SessionSummaryId, UserId};
pub use review::{DueState, NewReviewRecord, ReviewRecord};
pub use scope::{ResolvedScope, Scope, ScopeError};
pub use session::{Direction, SessionMode, SessionSummary, SessionSummaryDraft, SessionSummaryError};
