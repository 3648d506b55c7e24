use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use timesheet_relay::prettyprint::PrettyFormatter;
use tracing::{error, info, instrument, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

mod application_service_factory;
mod cli_adapter;

use cli_adapter::{Cli, CliAdapter};

#[tokio::main]
#[instrument]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = setup_tracing(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("Could not set up logging: {err}");
        return ExitCode::FAILURE;
    }
    setup_panic_hook();

    info!("Starting timesheet-relay");

    let cli_adapter = CliAdapter::new(cli.config);
    match cli_adapter.run(cli.command).await {
        Ok(()) => {
            info!("CLI execution completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("CLI execution failed: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn setup_tracing(verbose: bool, log_file: Option<&Path>) -> std::io::Result<()> {
    let level = if verbose { Level::TRACE } else { Level::INFO };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .event_format(PrettyFormatter::new(true))
        .with_writer(std::io::stderr);

    let log_file_layer = match log_file {
        Some(path) => Some(
            tracing_subscriber::fmt::layer()
                .event_format(PrettyFormatter::new(false))
                .with_writer(std::fs::File::create(path)?)
                .with_ansi(false)
                .boxed(),
        ),
        None => None,
    };

    Registry::default()
        .with(
            tracing_subscriber::filter::Targets::new()
                .with_target("timesheet_relay", level),
        )
        .with(log_file_layer)
        .with(stderr_layer)
        .init();

    Ok(())
}

fn setup_panic_hook() {
    tracing::trace!("Setting panic hook");
    std::panic::set_hook(Box::new(|info| {
        tracing::error!("panic: {info}");
    }));
}
