use std::path::PathBuf;

use clap::{Parser, Subcommand};
use error_stack::ResultExt;
use thiserror::Error;
use tracing::{info, instrument, warn};

use timesheet_relay::{
    application::scheduler::CronTrigger,
    config::{workbook_config::WorkbookConfig, AppConfig},
    domain::ReportingWeek,
};

use crate::application_service_factory::ApplicationServiceFactory;

#[derive(Parser, Debug)]
#[command(name = "timesheet-relay", version, about = "Fills in, emails and announces the weekly timesheet")]
pub struct Cli {
    /// Configuration file, with or without extension.
    #[arg(long, env = "CONFIG_PATH", default_value = "Config", global = true)]
    pub config: PathBuf,

    /// Log at trace level.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Also write logs, without colours, to this file.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Command {
    /// Run the pipeline once, now.
    Run,
    /// Run the pipeline on every occurrence of `schedule.cron` until Ctrl-C.
    Schedule,
    /// Sign in and save the token cache, without running the pipeline.
    Login,
    /// Print this week's dates and the output file name.
    Week,
}

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Configuration could not be loaded")]
    Config,
    #[error("Service initialization failed")]
    Initialization,
    #[error("Command execution failed: {command}")]
    ExecutionFailed { command: Command },
}

#[derive(Debug)]
pub struct CliAdapter {
    config_path: PathBuf,
}

impl CliAdapter {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    fn load_config(&self) -> error_stack::Result<AppConfig, CommandError> {
        let config = AppConfig::load(&self.config_path).change_context(CommandError::Config)?;
        config
            .ensure_scratch_dir()
            .change_context(CommandError::Config)?;
        info!("Configuration loaded successfully");
        Ok(config)
    }

    #[instrument(skip(self))]
    pub async fn handle(&self, command: Command) -> error_stack::Result<String, CommandError> {
        let failed = || CommandError::ExecutionFailed { command };

        match command {
            Command::Week => Ok(describe_week(
                &ReportingWeek::containing(chrono::Local::now().date_naive()),
                &WorkbookConfig::default(),
            )),
            Command::Run => {
                let config = self.load_config()?;
                let service = ApplicationServiceFactory::create(&config)
                    .change_context(CommandError::Initialization)?;
                let outcome = service.run_once().await.change_context_lazy(failed)?;
                Ok(format!(
                    "{} for week {}",
                    outcome.output_file_name,
                    outcome.week.message_span(" - ")
                ))
            }
            Command::Schedule => {
                let config = self.load_config()?;
                let trigger =
                    CronTrigger::parse(&config.schedule.cron).change_context(CommandError::Config)?;
                let service = ApplicationServiceFactory::create(&config)
                    .change_context(CommandError::Initialization)?;
                info!("Scheduling runs with '{}'", config.schedule.cron);
                service
                    .run_scheduled(&trigger, shutdown_signal())
                    .await
                    .change_context_lazy(failed)?;
                Ok("Schedule stopped".to_owned())
            }
            Command::Login => {
                let config = self.load_config()?;
                let service = ApplicationServiceFactory::create(&config)
                    .change_context(CommandError::Initialization)?;
                service.login().await.change_context_lazy(failed)?;
                Ok("Signed in".to_owned())
            }
        }
    }

    pub async fn run(&self, command: Option<Command>) -> error_stack::Result<(), CommandError> {
        let command = command.unwrap_or(Command::Run);
        match self.handle(command).await {
            Ok(result) => {
                info!("{}", result);
                Ok(())
            }
            Err(report) => Err(report),
        }
    }
}

fn describe_week(week: &ReportingWeek, workbook: &WorkbookConfig) -> String {
    let (start, end) = week.cell_values();
    format!(
        "{}={} {}={} -> {}",
        workbook.start_cell,
        start,
        workbook.end_cell,
        end,
        week.output_file_name(&workbook.output_prefix, &workbook.output_suffix)
    )
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl-C, the schedule can only be stopped by killing the process: {}", err);
        std::future::pending::<()>().await;
    }
}
