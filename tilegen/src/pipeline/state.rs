//! Pipeline states and the run outcome.

use std::collections::BTreeSet;
use std::fmt;

use crate::coord::TileCoord;
use crate::reconcile::ValidationReport;

/// Where a pipeline run is.
///
/// ```text
/// Planning -> Generating -> Validating -> (Retrying -> Validating)*
///          -> Completed | PartialFailure | Aborted
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Planning,
    /// Round 0 is running.
    Generating { tiles: u64 },
    /// Checking the disk after `round`.
    Validating { round: u32 },
    /// Retry `round` is running for `missing` tiles.
    Retrying { round: u32, missing: u64 },
    /// Every planned tile is present.
    Completed,
    /// Retry rounds ran out with tiles still missing.
    PartialFailure { failed: BTreeSet<TileCoord> },
    /// Infrastructure failure or cancellation; no tile-level verdict.
    Aborted { message: String },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Completed
                | PipelineState::PartialFailure { .. }
                | PipelineState::Aborted { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Planning => "planning",
            PipelineState::Generating { .. } => "generating",
            PipelineState::Validating { .. } => "validating",
            PipelineState::Retrying { .. } => "retrying",
            PipelineState::Completed => "completed",
            PipelineState::PartialFailure { .. } => "partial_failure",
            PipelineState::Aborted { .. } => "aborted",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Planning => f.write_str("Planning"),
            PipelineState::Generating { tiles } => write!(f, "Generating {} tiles", tiles),
            PipelineState::Validating { round } => write!(f, "Validating after round {}", round),
            PipelineState::Retrying { round, missing } => {
                write!(f, "Retry round {} for {} missing tiles", round, missing)
            }
            PipelineState::Completed => f.write_str("Completed"),
            PipelineState::PartialFailure { failed } => {
                write!(f, "Partial failure: {} tiles missing", failed.len())
            }
            PipelineState::Aborted { message } => write!(f, "Aborted: {}", message),
        }
    }
}

/// What a run requested and what it ended up with.
///
/// `produced` and `failed` are derived from the disk after every round, so
/// `produced ∪ failed == requested` holds between rounds as well as at the end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub requested: BTreeSet<TileCoord>,
    pub produced: BTreeSet<TileCoord>,
    pub failed: BTreeSet<TileCoord>,
    /// Worker rounds launched, round 0 included.
    pub rounds_attempted: u32,
}

impl RunOutcome {
    pub fn new(requested: BTreeSet<TileCoord>) -> Self {
        Self {
            requested,
            ..Self::default()
        }
    }

    /// Replaces `produced`/`failed` with the result of a disk scan.
    pub fn record_validation(&mut self, validation: &ValidationReport) {
        let missing = validation.missing();
        self.failed = self.requested.intersection(missing).copied().collect();
        self.produced = self.requested.difference(missing).copied().collect();
    }

    /// Every requested tile is either produced or failed.
    pub fn is_accounted(&self) -> bool {
        self.requested
            .iter()
            .all(|tile| self.produced.contains(tile) || self.failed.contains(tile))
    }
}
