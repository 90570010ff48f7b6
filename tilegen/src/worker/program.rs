//! Worker program value and its compact tile encoding.

use std::time::Duration;

use crate::coord::TileCoord;
use crate::plan::GenerationPlan;

/// Default attempts per tile inside the worker (first try included).
pub const DEFAULT_FETCH_ATTEMPTS: u32 = 3;

/// Default fixed pause between attempts of one tile.
pub const DEFAULT_FETCH_BACKOFF: Duration = Duration::from_millis(500);

/// Default per-request timeout inside the worker.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-tile fetch behaviour baked into a worker program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Total attempts per tile before it is reported as failed.
    pub attempts: u32,
    /// Fixed pause between attempts.
    pub backoff: Duration,
    /// Timeout for one HTTP request.
    pub request_timeout: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_FETCH_ATTEMPTS,
            backoff: DEFAULT_FETCH_BACKOFF,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Consecutive columns of one tile row: `(zoom, y, x_start..=x_end)`.
///
/// Plans are rectangles, so encoding rows as runs keeps a worker program
/// proportional to the number of rows rather than the number of tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRun {
    pub zoom: u8,
    pub y: u32,
    pub x_start: u32,
    pub x_end: u32,
}

impl TileRun {
    pub fn tile_count(&self) -> u64 {
        u64::from(self.x_end - self.x_start + 1)
    }

    pub fn tiles(self) -> impl Iterator<Item = TileCoord> {
        let TileRun {
            zoom,
            y,
            x_start,
            x_end,
        } = self;
        (x_start..=x_end).map(move |x| TileCoord { zoom, x, y })
    }

    /// Encodes as the `[z, y, x0, x1]` tuple embedded in worker programs.
    pub(crate) fn as_tuple(&self) -> [u32; 4] {
        [u32::from(self.zoom), self.y, self.x_start, self.x_end]
    }
}

/// Groups tiles into row runs.
///
/// Input is sorted into plan order and deduplicated first, so the result is
/// independent of the order the caller supplies.
pub fn runs_from_tiles(tiles: impl IntoIterator<Item = TileCoord>) -> Vec<TileRun> {
    let mut sorted: Vec<TileCoord> = tiles.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut runs: Vec<TileRun> = Vec::new();
    for tile in sorted {
        match runs.last_mut() {
            Some(run) if run.zoom == tile.zoom && run.y == tile.y && run.x_end + 1 == tile.x => {
                run.x_end = tile.x;
            }
            _ => runs.push(TileRun {
                zoom: tile.zoom,
                y: tile.y,
                x_start: tile.x,
                x_end: tile.x,
            }),
        }
    }
    runs
}

/// Row runs covering a whole plan, built from its rectangles.
pub fn runs_from_plan(plan: &GenerationPlan) -> Vec<TileRun> {
    plan.ranges()
        .iter()
        .flat_map(|range| {
            (range.y_min..=range.y_max).map(move |y| TileRun {
                zoom: range.zoom,
                y,
                x_start: range.x_min,
                x_end: range.x_max,
            })
        })
        .collect()
}

/// A self-contained worker program, ready to hand to a launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerProgram {
    source: String,
    runs: Vec<TileRun>,
    tile_count: u64,
    template: &'static str,
}

impl WorkerProgram {
    pub(crate) fn new(source: String, runs: Vec<TileRun>, template: &'static str) -> Self {
        let tile_count = runs.iter().map(TileRun::tile_count).sum();
        Self {
            source,
            runs,
            tile_count,
            template,
        }
    }

    /// Wraps hand-written program text, e.g. a scripted worker in tests.
    ///
    /// `tiles` declares which coordinates the program claims to cover.
    pub fn from_source(
        source: impl Into<String>,
        tiles: impl IntoIterator<Item = TileCoord>,
    ) -> Self {
        Self::new(source.into(), runs_from_tiles(tiles), "custom")
    }

    /// Program text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Name of the template that produced the program.
    pub fn template(&self) -> &'static str {
        self.template
    }

    pub fn runs(&self) -> &[TileRun] {
        &self.runs
    }

    /// Number of tiles the program walks.
    pub fn tile_count(&self) -> u64 {
        self.tile_count
    }

    /// Tiles in the order the program walks them.
    pub fn tiles(&self) -> impl Iterator<Item = TileCoord> + '_ {
        self.runs.iter().flat_map(|run| run.tiles())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{GridPlanner, Scope, ZoomRange};

    fn t(zoom: u8, x: u32, y: u32) -> TileCoord {
        TileCoord { zoom, x, y }
    }

    #[test]
    fn test_runs_merge_adjacent_columns() {
        let runs = runs_from_tiles(vec![t(3, 2, 1), t(3, 1, 1), t(3, 3, 1), t(3, 5, 1), t(3, 1, 2)]);
        assert_eq!(
            runs,
            vec![
                TileRun { zoom: 3, y: 1, x_start: 1, x_end: 3 },
                TileRun { zoom: 3, y: 1, x_start: 5, x_end: 5 },
                TileRun { zoom: 3, y: 2, x_start: 1, x_end: 1 },
            ]
        );
    }

    #[test]
    fn test_runs_dedup_tiles() {
        let runs = runs_from_tiles(vec![t(1, 0, 0), t(1, 0, 0)]);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].tile_count(), 1);
    }

    #[test]
    fn test_runs_from_plan_match_plan_order() {
        let plan = GridPlanner::plan(&Scope::Full, ZoomRange::new(0, 2).unwrap()).unwrap();
        let runs = runs_from_plan(&plan);

        assert_eq!(runs.len(), 1 + 2 + 4);
        let walked: Vec<_> = runs.iter().flat_map(|run| run.tiles()).collect();
        let planned: Vec<_> = plan.iter().collect();
        assert_eq!(walked, planned);
        assert_eq!(runs, runs_from_tiles(plan.iter()));
    }

    #[test]
    fn test_program_counts_tiles() {
        let program = WorkerProgram::from_source("echo", vec![t(2, 0, 0), t(2, 1, 0), t(2, 3, 3)]);
        assert_eq!(program.tile_count(), 3);
        assert_eq!(program.template(), "custom");
        assert_eq!(program.tiles().count(), 3);
    }
}
