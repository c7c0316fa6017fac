#![forbid(unsafe_code)]

pub mod app_services;
pub mod due_service;
pub mod error;
pub mod progress_service;
pub mod review_service;
pub mod sessions;

pub use vocab_core::Clock;

pub use app_services::AppServices;
pub use due_service::{DueSet, DueSetService};
pub use error::{AppServicesError, ErrorKind, ServiceError, SessionError};
pub use progress_service::ProgressService;
pub use review_service::{ReviewService, ReviewSubmission};
pub use sessions::{
    ReviewSession, SessionAnswerResult, SessionLoopService, SessionStart, WrittenOutcome,
};
