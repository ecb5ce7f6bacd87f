mod commands;

use clap::Parser;
use photoz_core::domain::PhotozError;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn run_from_env() -> i32 {
    init_tracing();
    let args: Vec<String> = std::env::args().collect();

    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            let run_error = error.as_photoz_error();
            eprintln!("{}", run_error.diagnostic_line());
            if let Some(summary_line) = run_error.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            run_error.exit_code()
        }
    }
}

/// Logs go to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "photoz",
    version,
    about = "Template-fitting photometric redshift engine"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Integrate every template through every filter and write the flux-grid tables
    ProcessSeds(commands::ConfigArgs),
    /// Draw a mock target catalog from the persisted flux-grid tables
    Simulate(commands::SimulateArgs),
    /// Fit the target catalog and write redshift PDFs and metrics
    Fit(commands::FitArgs),
    /// Write mode and width of the fitted PDFs for a selection of objects
    Summarize(commands::SummarizeArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::ProcessSeds(args) => commands::run_process_seds_command(args),
        CliCommand::Simulate(args) => commands::run_simulate_command(args),
        CliCommand::Fit(args) => commands::run_fit_command(args),
        CliCommand::Summarize(args) => commands::run_summarize_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(PhotozError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<PhotozError> for CliError {
    fn from(error: PhotozError) -> Self {
        Self::Compute(error)
    }
}

impl CliError {
    fn as_photoz_error(&self) -> PhotozError {
        match self {
            Self::Usage(message) => PhotozError::configuration("CONFIG.CLI_USAGE", message.trim_end()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => PhotozError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
