//! Estimate command - tile counts without touching disk or the endpoint.

use tilegen::plan::{tile_ranges, GridPlanner};

use super::common::{format_count, ProjectArgs};
use crate::error::CliError;

pub fn run(args: &ProjectArgs) -> Result<i32, CliError> {
    let project = args.load()?;
    let ranges = tile_ranges(&project.scope, project.zoom_range)?;
    let total = GridPlanner::estimate(&project.scope, project.zoom_range)?;

    println!("Project: {}", project.config.name);
    println!(
        "Scope:   {} (zoom {}-{})",
        project.scope.mode_name(),
        project.zoom_range.min(),
        project.zoom_range.max()
    );
    println!();
    println!("  Zoom  Columns          Rows                        Tiles");
    for range in &ranges {
        println!(
            "  {:>4}  {:>7}-{:<7}  {:>7}-{:<7}  {:>16}",
            range.zoom,
            range.x_min,
            range.x_max,
            range.y_min,
            range.y_max,
            format_count(range.count())
        );
    }
    // tiles snap outwards, so the deepest zoom hugs the scope most closely
    if let Some(deepest) = ranges.last() {
        let (north, west, south, east) = deepest.bounds();
        println!();
        println!(
            "Covers:  lat {:.4} to {:.4}, lon {:.4} to {:.4} (zoom {})",
            south, north, west, east, deepest.zoom
        );
    }
    println!();
    println!("Total: {} tiles", format_count(total));
    Ok(0)
}
