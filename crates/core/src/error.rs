use thiserror::Error;

use crate::aggregator::AggregatorError;
use crate::model::{CatalogError, ParseIdError, ScopeError, SessionSummaryError};
use crate::progress::ProgressError;
use crate::scheduler::SchedulerError;

/// Umbrella for every domain-level validation failure in this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error(transparent)]
    Session(#[from] SessionSummaryError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Aggregator(#[from] AggregatorError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Id(#[from] ParseIdError),
}
