use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use error_stack::{AttachmentKind, FrameKind, Report, ResultExt};
use tracing::{debug, error, info, instrument, warn};

use crate::domain::token_cache::TokenCache;
use crate::adapters::xlsx;
use crate::application::messages;
use crate::config::AppConfig;
use crate::domain::ReportingWeek;
use crate::ports::chat_notifier::ChatNotifier;
use crate::ports::file_store::RemoteFileStore;
use crate::ports::mailer::{Mailer, OutgoingMail};
use crate::ports::routine::{Routine, RoutineError};
use crate::ports::token_provider::{AccessToken, TokenProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
pub enum Step {
    Auth,
    Fetch,
    Edit,
    Email,
    Notify,
}

fn step_failed(step: Step) -> RoutineError {
    RoutineError::routine_failure(format!("{} step failed", step))
}

/// Contexts and printable attachments of `report`, outermost first, on one
/// line.
fn one_line<C>(report: &Report<C>) -> String {
    report
        .frames()
        .filter_map(|frame| match frame.kind() {
            FrameKind::Context(context) => Some(context.to_string()),
            FrameKind::Attachment(AttachmentKind::Printable(printable)) => {
                Some(printable.to_string())
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(": ")
}

fn log_swallowed<C>(step: Step, report: &Report<C>) {
    error!("{} step failed: {}", step, one_line(report));
    debug!("{:?}", report);
}

/// What a completed run did. Terminal failures are returned as errors instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub week: ReportingWeek,
    pub output_file_name: String,
    pub email_sent: bool,
    pub notified: bool,
}

/// Auth, fetch, edit, email, notify; in that order, once per run.
pub struct TimesheetRoutine {
    token_provider: Arc<dyn TokenProvider>,
    file_store: Arc<dyn RemoteFileStore>,
    mailer: Arc<dyn Mailer>,
    notifier: Arc<dyn ChatNotifier>,
    config: AppConfig,
    today: Option<NaiveDate>,
}

impl std::fmt::Debug for TimesheetRoutine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimesheetRoutine")
            .field("file_name", &self.config.drive.file_name)
            .field("today", &self.today)
            .finish()
    }
}

impl TimesheetRoutine {
    pub fn new(
        token_provider: Arc<dyn TokenProvider>,
        file_store: Arc<dyn RemoteFileStore>,
        mailer: Arc<dyn Mailer>,
        notifier: Arc<dyn ChatNotifier>,
        config: AppConfig,
    ) -> Self {
        Self {
            token_provider,
            file_store,
            mailer,
            notifier,
            config,
            today: None,
        }
    }

    /// Pins the run date instead of reading the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    #[instrument(skip(self, cache))]
    async fn authenticate(
        &self,
        cache: &mut TokenCache,
    ) -> error_stack::Result<AccessToken, RoutineError> {
        self.token_provider
            .acquire_token(cache)
            .await
            .change_context(step_failed(Step::Auth))
    }

    #[instrument(skip(self, token))]
    async fn fetch(&self, token: &AccessToken) -> error_stack::Result<PathBuf, RoutineError> {
        let drive = &self.config.drive;
        self.file_store
            .download(token, &drive.file_name, &drive.scratch_dir)
            .await
            .change_context(step_failed(Step::Fetch))
            .attach_printable_lazy(|| format!("{}/{}", drive.folder, drive.file_name))
    }

    #[instrument(skip(self))]
    fn edit(
        &self,
        downloaded: &Path,
        output: &Path,
        week: &ReportingWeek,
    ) -> error_stack::Result<(), RoutineError> {
        xlsx::write_week(downloaded, output, &self.config.workbook, week)
            .change_context(step_failed(Step::Edit))?;
        info!(
            "Excel file {} modified and saved as {}",
            downloaded.display(),
            output.display()
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn email(&self, output: &Path, week: &ReportingWeek) -> bool {
        let mail = OutgoingMail {
            subject: messages::email_subject(week, &self.config.mail),
            body: messages::email_body(week, &self.config.mail),
            attachment: output.to_path_buf(),
        };

        match self.mailer.send(&mail).await {
            Ok(()) => true,
            Err(report) => {
                log_swallowed(Step::Email, &report);
                false
            }
        }
    }

    #[instrument(skip(self))]
    async fn notify(&self, week: &ReportingWeek) -> bool {
        match self.notifier.notify(&messages::chat_message(week)).await {
            Ok(()) => true,
            Err(report) => {
                log_swallowed(Step::Notify, &report);
                false
            }
        }
    }

    async fn run_steps(
        &self,
        cache: &mut TokenCache,
        scratch: &mut Vec<PathBuf>,
    ) -> error_stack::Result<RunOutcome, RoutineError> {
        let week = ReportingWeek::containing(self.today());
        let output_file_name = week.output_file_name(
            &self.config.workbook.output_prefix,
            &self.config.workbook.output_suffix,
        );
        info!(
            "Reporting week {} ({})",
            week.message_span(" - "),
            output_file_name
        );

        let token = self.authenticate(cache).await?;

        let downloaded = self.fetch(&token).await?;
        scratch.push(downloaded.clone());

        let output = self.config.drive.scratch_dir.join(&output_file_name);
        if output != downloaded {
            scratch.push(output.clone());
        }
        self.edit(&downloaded, &output, &week)?;

        let email_sent = self.email(&output, &week).await;
        let notified = if email_sent {
            self.notify(&week).await
        } else {
            warn!("Skipping chat notification because the email was not sent");
            false
        };

        Ok(RunOutcome {
            week,
            output_file_name,
            email_sent,
            notified,
        })
    }
}

fn remove_scratch_files(paths: &[PathBuf]) {
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::trace!("Removed {}", path.display()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("Could not remove {}: {}", path.display(), err),
        }
    }
}

#[async_trait::async_trait]
impl Routine<RunOutcome> for TimesheetRoutine {
    fn name(&self) -> &str {
        "timesheet"
    }

    #[instrument(skip(self), name = "TimesheetRoutine::run")]
    async fn run(&self) -> error_stack::Result<RunOutcome, RoutineError> {
        let mut cache = TokenCache::load(&self.config.auth.token_cache_path);
        let mut scratch = Vec::new();

        let result = self.run_steps(&mut cache, &mut scratch).await;

        if let Err(report) = cache.persist() {
            warn!("Token cache was not saved: {:?}", report);
        }
        remove_scratch_files(&scratch);

        result
    }
}
