//! Filesystem scan of a plan against the project directory.

use std::collections::BTreeSet;
use std::fmt;

use tracing::debug;

use super::check::TileCheck;
use crate::context::RunContext;
use crate::coord::TileCoord;
use crate::plan::GenerationPlan;

/// Counts for one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomValidation {
    pub zoom: u8,
    pub expected: u64,
    pub valid: u64,
}

impl ZoomValidation {
    pub fn missing(&self) -> u64 {
        self.expected - self.valid
    }

    /// Valid share in percent; 100 for an empty level.
    pub fn completion_rate(&self) -> f64 {
        rate(self.valid, self.expected)
    }
}

/// Result of checking every planned tile on disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    zooms: Vec<ZoomValidation>,
    missing: BTreeSet<TileCoord>,
}

impl ValidationReport {
    /// Scans every tile of `plan` under the context's project directory.
    pub fn scan(plan: &GenerationPlan, ctx: &RunContext, check: TileCheck) -> Self {
        let mut zooms: Vec<ZoomValidation> = Vec::new();
        let mut missing = BTreeSet::new();

        for tile in plan.iter() {
            let valid = check.is_valid(&ctx.tile_path(&tile));
            match zooms.last_mut() {
                Some(level) if level.zoom == tile.zoom => {
                    level.expected += 1;
                    level.valid += u64::from(valid);
                }
                _ => zooms.push(ZoomValidation {
                    zoom: tile.zoom,
                    expected: 1,
                    valid: u64::from(valid),
                }),
            }
            if !valid {
                missing.insert(tile);
            }
        }

        debug!(
            project = ctx.project_name(),
            check = %check,
            expected = plan.len(),
            missing = missing.len(),
            "Validated tiles on disk"
        );

        Self { zooms, missing }
    }

    pub fn zooms(&self) -> &[ZoomValidation] {
        &self.zooms
    }

    pub fn expected(&self) -> u64 {
        self.zooms.iter().map(|z| z.expected).sum()
    }

    pub fn valid(&self) -> u64 {
        self.zooms.iter().map(|z| z.valid).sum()
    }

    /// Planned tiles without a valid file.
    pub fn missing(&self) -> &BTreeSet<TileCoord> {
        &self.missing
    }

    pub fn into_missing(self) -> BTreeSet<TileCoord> {
        self.missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn completion_rate(&self) -> f64 {
        rate(self.valid(), self.expected())
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for level in &self.zooms {
            writeln!(
                f,
                "zoom {:>2}: {:>8}/{:<8} ({:.1}%)",
                level.zoom,
                level.valid,
                level.expected,
                level.completion_rate()
            )?;
        }
        write!(
            f,
            "total:   {:>8}/{:<8} ({:.1}%)",
            self.valid(),
            self.expected(),
            self.completion_rate()
        )
    }
}

/// Planned tiles that have no valid file on disk, in plan order.
///
/// Purely a filesystem check; nothing is fetched. Calling it twice on an
/// unchanged directory returns the same set.
pub fn reconcile(plan: &GenerationPlan, ctx: &RunContext, check: TileCheck) -> BTreeSet<TileCoord> {
    ValidationReport::scan(plan, ctx, check).into_missing()
}

fn rate(valid: u64, expected: u64) -> f64 {
    if expected == 0 {
        100.0
    } else {
        valid as f64 * 100.0 / expected as f64
    }
}
