use super::CliError;
use anyhow::Context;
use photoz_core::domain::{RunArtifact, RunModule, RunRequest};
use photoz_core::modules::execute_run_module;
use photoz_core::modules::summary::summarize_pdf_file;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

#[derive(clap::Args)]
pub(super) struct ConfigArgs {
    /// JSON run configuration
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct SimulateArgs {
    #[command(flatten)]
    run: ConfigArgs,

    /// Random seed, overriding simulation.seed from the configuration
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(clap::Args)]
pub(super) struct FitArgs {
    #[command(flatten)]
    run: ConfigArgs,

    /// Worker threads, overriding workers from the configuration
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    workers: Option<u64>,
}

#[derive(clap::Args)]
pub(super) struct SummarizeArgs {
    #[command(flatten)]
    run: ConfigArgs,

    /// File listing the selected object indices, one per line
    #[arg(long)]
    selection: PathBuf,

    /// Number of objects in the full catalog
    #[arg(long)]
    total: usize,

    /// Output table of mode and width per object
    #[arg(long)]
    output: PathBuf,
}

pub(super) fn run_process_seds_command(args: ConfigArgs) -> Result<i32, CliError> {
    let request = RunRequest::new(RunModule::ProcessSeds, args.config);
    run_module(&request)
}

pub(super) fn run_simulate_command(args: SimulateArgs) -> Result<i32, CliError> {
    let mut request = RunRequest::new(RunModule::Simulate, args.run.config);
    if let Some(seed) = args.seed {
        request = request.with_seed(seed);
    }
    run_module(&request)
}

pub(super) fn run_fit_command(args: FitArgs) -> Result<i32, CliError> {
    let mut request = RunRequest::new(RunModule::TemplateFitting, args.run.config);
    if let Some(workers) = args.workers {
        let workers = usize::try_from(workers)
            .with_context(|| format!("--workers {workers} does not fit this platform"))?;
        request = request.with_workers(workers);
    }
    run_module(&request)
}

pub(super) fn run_summarize_command(args: SummarizeArgs) -> Result<i32, CliError> {
    let artifacts = summarize_pdf_file(&args.run.config, &args.selection, args.total, &args.output)?;
    print_artifacts(&artifacts)?;
    Ok(0)
}

fn run_module(request: &RunRequest) -> Result<i32, CliError> {
    let artifacts = execute_run_module(request)?;
    info!(module = %request.module, artifacts = artifacts.len(), "run complete");
    print_artifacts(&artifacts)?;
    Ok(0)
}

fn print_artifacts(artifacts: &[RunArtifact]) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    for artifact in artifacts {
        writeln!(stdout, "{}", artifact.path.display())
            .context("failed to write artifact list to stdout")?;
    }
    Ok(())
}
