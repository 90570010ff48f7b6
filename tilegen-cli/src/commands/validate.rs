//! Validate command - compare the plan against what is on disk.

use std::path::Path;

use tilegen::plan::GridPlanner;
use tilegen::reconcile::ValidationReport;

use super::common::{format_count, OutputArgs, ProjectArgs, EXIT_PARTIAL};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Missing tiles listed before the output is truncated.
const MAX_LISTED: usize = 20;

pub fn run(config: Option<&Path>, project: &ProjectArgs, output: &OutputArgs) -> Result<i32, CliError> {
    let mut runner = CliRunner::new(config, false)?;
    runner.log_startup("validate");
    output.apply(runner.settings_mut());
    let settings = runner.settings();

    let project = project.load()?;
    let ctx = settings.run_context(&project.config.name)?;
    let plan = GridPlanner::plan(&project.scope, project.zoom_range)?;
    let report = ValidationReport::scan(&plan, &ctx, settings.output.tile_check);

    println!("Project:   {}", project.config.name);
    println!("Directory: {}", ctx.project_dir().display());
    println!("Check:     {}", settings.output.tile_check);
    println!();
    println!("{}", report);

    if report.is_complete() {
        println!();
        println!("All {} tiles present.", format_count(report.expected()));
        return Ok(0);
    }

    println!();
    println!("Missing tiles:");
    for tile in report.missing().iter().take(MAX_LISTED) {
        println!("  {}", tile);
    }
    let hidden = report.missing().len().saturating_sub(MAX_LISTED);
    if hidden > 0 {
        println!("  ... and {} more", format_count(hidden as u64));
    }
    Ok(EXIT_PARTIAL)
}
