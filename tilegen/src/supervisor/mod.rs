//! Worker execution and progress streaming.
//!
//! [`ExecutionSupervisor`] launches a [`WorkerProgram`] through a
//! [`WorkerLauncher`], reads the worker's stdout line by line and yields
//! [`ProgressEvent`]s through an [`EventStream`]. Cancellation and timeouts
//! interrupt the child first and kill it after a grace period.
//!
//! The [`RoundRunner`] trait is the seam the pipeline drives; tests swap in
//! scripted runners.

mod events;
mod launcher;
mod process;
mod stream;

pub use events::{ProgressEvent, CANCELLED_MESSAGE};
pub use launcher::WorkerLauncher;
pub use process::{
    ExecutionSupervisor, SupervisorConfig, DEFAULT_GRACE_PERIOD, DEFAULT_STDERR_TAIL,
};
pub use stream::EventStream;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::worker::WorkerProgram;

/// Errors raised before a worker is running.
///
/// Everything that goes wrong after the worker started is reported as a
/// [`ProgressEvent::RunError`] on the stream instead.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Launcher command line has no program.
    #[error("Worker launcher command is empty")]
    EmptyLauncher,

    /// The launcher could not be started.
    #[error("Failed to start worker with '{launcher}': {source}")]
    Spawn {
        launcher: String,
        #[source]
        source: std::io::Error,
    },

    /// Child process was spawned without a requested pipe.
    #[error("Worker process has no {0} pipe")]
    MissingPipe(&'static str),
}

/// Starts one worker round.
pub trait RoundRunner: Send + Sync {
    /// Launches `program`; the returned stream ends with exactly one terminal
    /// event unless the producer fails.
    fn start_round(
        &self,
        program: &WorkerProgram,
        cancel: CancellationToken,
    ) -> Result<EventStream, SupervisorError>;
}
