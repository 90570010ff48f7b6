//! Script command - print the worker program for inspection or manual runs.

use std::path::Path;

use tilegen::pipeline::PipelineError;
use tilegen::plan::GridPlanner;
use tilegen::reconcile::reconcile;

use super::common::{OutputArgs, ProjectArgs};
use crate::error::CliError;
use crate::runner::CliRunner;

pub fn run(
    config: Option<&Path>,
    project: &ProjectArgs,
    output: &OutputArgs,
    endpoint: Option<String>,
    missing_only: bool,
) -> Result<i32, CliError> {
    let mut runner = CliRunner::new(config, false)?;
    runner.log_startup("script");
    output.apply(runner.settings_mut());
    if let Some(url) = endpoint {
        runner.settings_mut().endpoint.base_url = url;
    }
    let settings = runner.settings();

    let project = project.load()?;
    let ctx = settings.run_context(&project.config.name)?;
    let plan = GridPlanner::plan(&project.scope, project.zoom_range)?;
    if plan.is_empty() {
        return Err(CliError::Pipeline(PipelineError::EmptyScope {
            scope: project.scope.mode_name(),
            min_zoom: project.zoom_range.min(),
            max_zoom: project.zoom_range.max(),
        }));
    }

    let synthesizer = settings.synthesizer()?;
    let program = if missing_only {
        synthesizer.synthesize(reconcile(&plan, &ctx, settings.output.tile_check), &ctx)
    } else {
        synthesizer.synthesize_plan(&plan, &ctx)
    };

    eprintln!(
        "# {} tiles, launch with: {}",
        program.tile_count(),
        settings.launcher()?
    );
    print!("{}", program.source());
    Ok(0)
}
