//! Bounded retry of missing tiles.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::observer::ProgressObserver;
use super::state::{PipelineState, RunOutcome};
use crate::context::RunContext;
use crate::coord::TileCoord;
use crate::plan::GenerationPlan;
use crate::reconcile::{TileCheck, ValidationReport};
use crate::supervisor::{ProgressEvent, RoundRunner, CANCELLED_MESSAGE};
use crate::worker::WorkerScriptSynthesizer;

/// Default number of retry rounds after round 0.
pub const DEFAULT_MAX_ROUNDS: u32 = 3;

/// What one worker round reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundSummary {
    pub round: u32,
    /// Tiles the round's program covered.
    pub tiles: u64,
    pub completed: u64,
    /// Tiles reported as `TILE_ERR`, with the worker's reason.
    pub failed: BTreeMap<TileCoord, String>,
    /// Set when the round ended with a run-level error.
    pub error: Option<String>,
}

/// How the retry loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryVerdict {
    /// Nothing is missing.
    Converged,
    /// Rounds ran out with tiles still missing.
    Exhausted,
    /// A round failed at run level or the run was cancelled.
    Aborted { message: String },
}

/// Last verdict plus the disk scan it was based on.
#[derive(Debug, Clone)]
pub struct RetryResult {
    pub verdict: RetryVerdict,
    pub validation: ValidationReport,
}

/// Runs worker rounds and re-runs them for missing tiles, up to
/// `max_rounds` retries.
///
/// Each retry is scoped to exactly the tiles missing on disk, so a tile that
/// is already present is never requested again.
#[derive(Clone)]
pub struct RetryController {
    runner: Arc<dyn RoundRunner>,
    synthesizer: WorkerScriptSynthesizer,
    check: TileCheck,
    max_rounds: u32,
}

impl RetryController {
    pub fn new(runner: Arc<dyn RoundRunner>, synthesizer: WorkerScriptSynthesizer) -> Self {
        Self {
            runner,
            synthesizer,
            check: TileCheck::default(),
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_tile_check(mut self, check: TileCheck) -> Self {
        self.check = check;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn tile_check(&self) -> TileCheck {
        self.check
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub fn synthesizer(&self) -> &WorkerScriptSynthesizer {
        &self.synthesizer
    }

    /// Scans the disk and records the result in `outcome`.
    pub fn validate(
        &self,
        plan: &GenerationPlan,
        ctx: &RunContext,
        outcome: &mut RunOutcome,
    ) -> ValidationReport {
        let validation = ValidationReport::scan(plan, ctx, self.check);
        outcome.record_validation(&validation);
        validation
    }

    /// Synthesizes a worker for exactly `tiles`, runs it and drains its
    /// events.
    pub async fn run_round(
        &self,
        round: u32,
        tiles: &BTreeSet<TileCoord>,
        ctx: &RunContext,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
    ) -> RoundSummary {
        let program = self.synthesizer.synthesize(tiles.iter().copied(), ctx);
        let mut summary = RoundSummary {
            round,
            tiles: program.tile_count(),
            ..RoundSummary::default()
        };

        info!(
            project = ctx.project_name(),
            round,
            tiles = summary.tiles,
            "Starting worker round"
        );
        observer.on_round_start(round, summary.tiles);

        let mut events = match self.runner.start_round(&program, cancel.clone()) {
            Ok(events) => events,
            Err(e) => {
                warn!(project = ctx.project_name(), round, error = %e, "Worker round failed to start");
                let event = ProgressEvent::RunError {
                    message: e.to_string(),
                };
                observer.on_event(round, &event);
                summary.error = Some(e.to_string());
                return summary;
            }
        };

        let mut terminated = false;
        while let Some(event) = events.next().await {
            observer.on_event(round, &event);
            match &event {
                ProgressEvent::TileCompleted { .. } => summary.completed += 1,
                ProgressEvent::TileFailed { coord, reason } => {
                    warn!(
                        round,
                        zoom = coord.zoom,
                        x = coord.x,
                        y = coord.y,
                        reason = %reason,
                        "Tile failed"
                    );
                    summary.failed.insert(*coord, reason.clone());
                }
                ProgressEvent::RunFinished {
                    success_count,
                    fail_count,
                } => {
                    terminated = true;
                    info!(
                        project = ctx.project_name(),
                        round,
                        ok = success_count,
                        err = fail_count,
                        "Worker round finished"
                    );
                }
                ProgressEvent::RunError { message } => {
                    terminated = true;
                    warn!(project = ctx.project_name(), round, message = %message, "Worker round failed");
                    summary.error = Some(message.clone());
                }
                ProgressEvent::Diagnostic { .. } => {}
            }
        }

        if !terminated {
            summary.error = Some(if cancel.is_cancelled() {
                CANCELLED_MESSAGE.to_string()
            } else {
                "worker event stream ended without a final event".to_string()
            });
        }
        summary
    }

    /// Validates, then retries missing tiles until none are left, a round
    /// fails at run level, or `max_rounds` retries have run.
    ///
    /// `outcome.rounds_attempted` is expected to already count the rounds
    /// run before this call; the next round number continues from it.
    pub async fn retry(
        &self,
        plan: &GenerationPlan,
        ctx: &RunContext,
        outcome: &mut RunOutcome,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
    ) -> RetryResult {
        let mut retries = 0;
        observer.on_state(&PipelineState::Validating {
            round: outcome.rounds_attempted.saturating_sub(1),
        });
        let mut validation = self.validate(plan, ctx, outcome);

        loop {
            if validation.is_complete() {
                return RetryResult {
                    verdict: RetryVerdict::Converged,
                    validation,
                };
            }
            if retries >= self.max_rounds {
                info!(
                    project = ctx.project_name(),
                    missing = validation.missing().len(),
                    max_rounds = self.max_rounds,
                    "Retry rounds exhausted"
                );
                return RetryResult {
                    verdict: RetryVerdict::Exhausted,
                    validation,
                };
            }
            if cancel.is_cancelled() {
                return RetryResult {
                    verdict: RetryVerdict::Aborted {
                        message: CANCELLED_MESSAGE.to_string(),
                    },
                    validation,
                };
            }

            let round = outcome.rounds_attempted;
            let missing = validation.missing().clone();
            observer.on_state(&PipelineState::Retrying {
                round,
                missing: missing.len() as u64,
            });

            let summary = self.run_round(round, &missing, ctx, cancel, observer).await;
            outcome.rounds_attempted += 1;
            retries += 1;

            observer.on_state(&PipelineState::Validating { round });
            validation = self.validate(plan, ctx, outcome);

            if let Some(message) = summary.error {
                return RetryResult {
                    verdict: RetryVerdict::Aborted { message },
                    validation,
                };
            }
        }
    }
}

impl std::fmt::Debug for RetryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryController")
            .field("synthesizer", &self.synthesizer)
            .field("check", &self.check)
            .field("max_rounds", &self.max_rounds)
            .finish()
    }
}
