use std::future::Future;
use std::str::FromStr;

use chrono::{DateTime, Local, TimeZone};
use cron::Schedule;
use error_stack::{report, ResultExt};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("invalid cron expression: {expression}")]
    InvalidExpression { expression: String },
    #[error("cron expression has no upcoming occurrence")]
    NoUpcomingOccurrence,
}

/// Recurring trigger driven by a six-field cron expression in local time.
#[derive(Debug, Clone)]
pub struct CronTrigger {
    schedule: Schedule,
}

impl CronTrigger {
    pub fn parse(expression: &str) -> error_stack::Result<Self, ScheduleError> {
        let schedule = Schedule::from_str(expression).change_context(
            ScheduleError::InvalidExpression {
                expression: expression.to_owned(),
            },
        )?;
        Ok(Self { schedule })
    }

    /// First occurrence strictly after `after`.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.schedule.after(after).next()
    }

    /// Sleeps until each occurrence and awaits `job`, until `shutdown`
    /// resolves. A running job is always finished before the next occurrence
    /// is computed, so jobs never overlap.
    pub async fn run<F, Fut>(
        &self,
        mut job: F,
        shutdown: impl Future<Output = ()>,
    ) -> error_stack::Result<(), ScheduleError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let now = Local::now();
            let next = self
                .next_after(&now)
                .ok_or_else(|| report!(ScheduleError::NoUpcomingOccurrence))?;
            let wait = (next - now).to_std().unwrap_or_default();
            info!(
                "Next run at {} (in {}s)",
                next.format("%Y-%m-%d %H:%M:%S %:z"),
                wait.as_secs()
            );

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping the schedule");
                    return Ok(());
                }
                _ = tokio::time::sleep(wait) => {}
            }

            job().await;
        }
    }
}
