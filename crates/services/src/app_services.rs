use std::sync::Arc;

use storage::repository::Storage;
use vocab_core::scheduler::{Scheduler, SchedulerSettings};

use crate::Clock;
use crate::due_service::DueSetService;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;
use crate::review_service::ReviewService;
use crate::sessions::SessionLoopService;

/// Assembles the request-level services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    due: Arc<DueSetService>,
    reviews: Arc<ReviewService>,
    session_loop: Arc<SessionLoopService>,
    progress: Arc<ProgressService>,
}

impl AppServices {
    /// Build services over an existing storage bundle.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Scheduler` if the settings do not describe a
    /// valid policy or offset.
    pub fn new(
        storage: &Storage,
        clock: Clock,
        settings: &SchedulerSettings,
    ) -> Result<Self, AppServicesError> {
        let scheduler = Scheduler::with_policy(Arc::new(settings.policy()?));
        let offset = settings.offset()?;

        let due = Arc::new(DueSetService::new(
            clock,
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.reviews),
        ));
        let reviews = Arc::new(
            ReviewService::new(
                clock,
                Arc::clone(&storage.catalog),
                Arc::clone(&storage.reviews),
            )
            .with_scheduler(scheduler.clone()),
        );
        let session_loop = Arc::new(
            SessionLoopService::new(
                clock,
                Arc::clone(&storage.catalog),
                Arc::clone(&storage.reviews),
                Arc::clone(&storage.summaries),
            )
            .with_scheduler(scheduler),
        );
        let progress = Arc::new(
            ProgressService::new(clock, Arc::clone(&storage.summaries)).with_offset(offset),
        );

        Ok(Self {
            due,
            reviews,
            session_loop,
            progress,
        })
    }

    #[must_use]
    pub fn due(&self) -> Arc<DueSetService> {
        Arc::clone(&self.due)
    }

    #[must_use]
    pub fn reviews(&self) -> Arc<ReviewService> {
        Arc::clone(&self.reviews)
    }

    #[must_use]
    pub fn session_loop(&self) -> Arc<SessionLoopService> {
        Arc::clone(&self.session_loop)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }
}
