//! Generation pipeline.
//!
//! [`PipelineController`] sequences a run:
//!
//! 1. **Planning** - build the [`GenerationPlan`](crate::plan::GenerationPlan)
//!    and reject empty scopes.
//! 2. **Generating** - round 0, scoped to the planned tiles not yet on disk.
//! 3. **Validating / Retrying** - [`RetryController`] re-runs workers for the
//!    missing tiles, bounded by `max_rounds`.
//! 4. **Report** - a [`PipelineReport`] with the terminal state.
//!
//! Infrastructure failures (worker cannot start, endpoint unreachable, crash
//! without a summary, cancellation) end the run as `Aborted`; tiles still
//! missing after the last retry end it as `PartialFailure`.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tilegen::pipeline::{NoopObserver, PipelineController};
//! use tilegen::supervisor::{ExecutionSupervisor, WorkerLauncher};
//! use tilegen::worker::WorkerScriptSynthesizer;
//!
//! let supervisor = ExecutionSupervisor::new(WorkerLauncher::parse("python3 -u -")?);
//! let controller = PipelineController::new(Arc::new(supervisor), WorkerScriptSynthesizer::python());
//! let report = controller
//!     .run(&scope, zooms, &ctx, CancellationToken::new(), &NoopObserver)
//!     .await?;
//! println!("{}", report);
//! ```

mod controller;
mod observer;
mod retry;
mod state;

pub use controller::{PipelineController, PipelineReport};
pub use observer::{NoopObserver, ProgressObserver};
pub use retry::{RetryController, RetryResult, RetryVerdict, RoundSummary, DEFAULT_MAX_ROUNDS};
pub use state::{PipelineState, RunOutcome};

use thiserror::Error;

use crate::plan::PlanError;

/// Inputs rejected before any work starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// Scope or zoom range failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] PlanError),

    /// The scope plans zero tiles.
    #[error("Empty scope: {scope} scope at zoom {min_zoom}-{max_zoom} covers no tiles")]
    EmptyScope {
        scope: &'static str,
        min_zoom: u8,
        max_zoom: u8,
    },
}
