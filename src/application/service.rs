use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use error_stack::ResultExt;
use thiserror::Error;
use tracing::{error, info, instrument, Instrument};

use crate::domain::token_cache::TokenCache;
use crate::application::scheduler::CronTrigger;
use crate::application::timesheet_routine::RunOutcome;
use crate::ports::routine::{Routine, RoutineError};
use crate::ports::token_provider::TokenProvider;

#[derive(Error, Debug)]
pub enum ApplicationServiceError {
    #[error("Sign-in failed")]
    LoginFailed,
    #[error("Schedule failed")]
    ScheduleFailed,
}

/// Runs the timesheet routine once, on a schedule, or only signs in.
pub struct TimesheetApplicationService {
    routine: Arc<dyn Routine<RunOutcome>>,
    token_provider: Arc<dyn TokenProvider>,
    token_cache_path: PathBuf,
}

impl std::fmt::Debug for TimesheetApplicationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimesheetApplicationService")
            .field("routine", &self.routine.name())
            .field("token_cache_path", &self.token_cache_path)
            .finish()
    }
}

impl TimesheetApplicationService {
    pub fn new(
        routine: Arc<dyn Routine<RunOutcome>>,
        token_provider: Arc<dyn TokenProvider>,
        token_cache_path: PathBuf,
    ) -> Self {
        Self {
            routine,
            token_provider,
            token_cache_path,
        }
    }

    /// The single error boundary of a run: failures are logged here.
    pub async fn run_once(&self) -> error_stack::Result<RunOutcome, RoutineError> {
        let name = self.routine.name();
        let result = self
            .routine
            .run()
            .instrument(tracing::span!(tracing::Level::INFO, "routine", routine = name))
            .await;

        match &result {
            Ok(outcome) => {
                info!("✅ {}: OK", name);
                info!(
                    "Week {}: email {}, chat {}",
                    outcome.week.message_span(" - "),
                    if outcome.email_sent { "sent" } else { "not sent" },
                    if outcome.notified { "notified" } else { "not notified" },
                );
            }
            Err(report) => error!("❌ {}: {:?}", name, report),
        }
        result
    }

    /// Runs on every occurrence of `trigger` until `shutdown` resolves. Failed
    /// runs are logged by [`Self::run_once`] and the loop continues.
    #[instrument(skip(self, trigger, shutdown))]
    pub async fn run_scheduled(
        &self,
        trigger: &CronTrigger,
        shutdown: impl Future<Output = ()>,
    ) -> error_stack::Result<(), ApplicationServiceError> {
        trigger
            .run(
                move || async move {
                    let _ = self.run_once().await;
                },
                shutdown,
            )
            .await
            .change_context(ApplicationServiceError::ScheduleFailed)
    }

    /// Signs in (silently if possible) and saves the token cache.
    #[instrument(skip(self))]
    pub async fn login(&self) -> error_stack::Result<(), ApplicationServiceError> {
        let mut cache = TokenCache::load(&self.token_cache_path);
        let result = self
            .token_provider
            .acquire_token(&mut cache)
            .await
            .change_context(ApplicationServiceError::LoginFailed);

        let persisted = cache
            .persist()
            .change_context(ApplicationServiceError::LoginFailed);

        result?;
        if persisted? {
            info!("Token cache saved to {}", self.token_cache_path.display());
        } else {
            info!("Cached token is still valid");
        }
        Ok(())
    }
}
