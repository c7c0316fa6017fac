//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use vocab_core::aggregator::AggregatorError;
use vocab_core::model::{ScopeError, UserId};
use vocab_core::scheduler::SchedulerError;

/// Stable error categories callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Authentication,
    Storage,
}

/// Errors emitted by request-level operations.
///
/// Ownership failures and missing rows share `NotFound` so callers cannot probe
/// for other learners' data.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("not found")]
    NotFound,
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("authentication required")]
    Authentication,
    #[error(transparent)]
    Storage(StorageError),
}

impl ServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::NotFound => ErrorKind::NotFound,
            ServiceError::Validation(_) => ErrorKind::Validation,
            ServiceError::Authentication => ErrorKind::Authentication,
            ServiceError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => ServiceError::NotFound,
            other => ServiceError::Storage(other),
        }
    }
}

impl From<ScopeError> for ServiceError {
    fn from(err: ScopeError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

/// Resolve the caller identity or fail with `Authentication`.
///
/// # Errors
///
/// Returns `ServiceError::Authentication` when no identity is present.
pub fn require_identity(identity: Option<UserId>) -> Result<UserId, ServiceError> {
    identity.ok_or(ServiceError::Authentication)
}

/// Errors emitted by the session loop.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session already completed")]
    Completed,
    #[error(transparent)]
    Aggregator(#[from] AggregatorError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl SessionError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Completed | SessionError::Aggregator(_) => ErrorKind::Validation,
            SessionError::Service(err) => err.kind(),
        }
    }
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        SessionError::Service(err.into())
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
