//! Run command - the full plan, generate, validate and retry pipeline.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tilegen::pipeline::PipelineController;
use tilegen::supervisor::ExecutionSupervisor;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::common::{exit_code, format_count, OutputArgs, ProjectArgs};
use crate::error::CliError;
use crate::runner::CliRunner;
use crate::ui::ProgressDisplay;

/// Arguments for the run command.
pub struct RunArgs<'a> {
    pub config: Option<&'a Path>,
    pub project: ProjectArgs,
    pub output: OutputArgs,
    pub endpoint: Option<String>,
    pub max_rounds: Option<u32>,
    pub timeout: Option<u64>,
    pub no_progress: bool,
}

pub fn run(args: RunArgs<'_>) -> Result<i32, CliError> {
    // Console logging would tear the progress bar, both draw on stderr.
    let show_progress = !args.no_progress && console::Term::stderr().is_term();
    let mut runner = CliRunner::new(args.config, !show_progress)?;
    runner.log_startup("run");

    // CLI > config > defaults
    let settings = runner.settings_mut();
    args.output.apply(settings);
    if let Some(url) = args.endpoint {
        settings.endpoint.base_url = url;
    }
    if let Some(rounds) = args.max_rounds {
        settings.retry.max_rounds = rounds;
    }
    if let Some(secs) = args.timeout {
        settings.supervisor.timeout = (secs > 0).then_some(Duration::from_secs(secs));
    }
    let settings = runner.settings();

    let project = args.project.load()?;
    let ctx = settings.run_context(&project.config.name)?;
    let launcher = settings.launcher()?;

    println!("tilegen v{}", tilegen::VERSION);
    println!("Project:   {}", project.config.name);
    println!("Endpoint:  {}", ctx.endpoint_base_url());
    println!("Output:    {}", ctx.project_dir().display());
    println!("Launcher:  {}", launcher);
    println!(
        "Retries:   up to {} round(s), tile check '{}'",
        settings.retry.max_rounds, settings.output.tile_check
    );
    println!();

    let supervisor = ExecutionSupervisor::with_config(launcher, settings.supervisor.clone());
    let controller = PipelineController::new(Arc::new(supervisor), settings.synthesizer()?)
        .with_tile_check(settings.output.tile_check)
        .with_max_rounds(settings.retry.max_rounds);

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received interrupt, stopping worker...");
        handler_token.cancel();
    })
    .map_err(|e| CliError::Signal(e.to_string()))?;

    let display = if show_progress {
        ProgressDisplay::new()
    } else {
        ProgressDisplay::hidden()
    };

    let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
    let report = runtime.block_on(controller.run(
        &project.scope,
        project.zoom_range,
        &ctx,
        cancel,
        &display,
    ))?;
    display.finish();

    info!(state = %report.state, "Run finished");
    println!();
    println!("{}", report);
    if !report.outcome.failed.is_empty() {
        println!();
        println!(
            "{} tile(s) still missing; run again to retry only those.",
            format_count(report.outcome.failed.len() as u64)
        );
    }

    Ok(exit_code(&report.state))
}
