//! Progress events produced while a worker runs.

use std::fmt;

use crate::coord::TileCoord;
use crate::worker::ProtocolLine;

/// Message carried by [`ProgressEvent::RunError`] when a run is cancelled or
/// times out.
pub const CANCELLED_MESSAGE: &str = "cancelled";

/// One step of worker progress, in the order the worker reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Tile fetched and written (or already present).
    TileCompleted { coord: TileCoord },
    /// Tile failed after the worker's local retries.
    TileFailed { coord: TileCoord, reason: String },
    /// Worker finished its walk. Terminal.
    RunFinished { success_count: u64, fail_count: u64 },
    /// Worker could not complete the round at all. Terminal.
    RunError { message: String },
    /// Non-protocol output line, forwarded untouched.
    Diagnostic { line: String },
}

impl ProgressEvent {
    pub fn cancelled() -> Self {
        ProgressEvent::RunError {
            message: CANCELLED_MESSAGE.to_string(),
        }
    }

    /// True for the events that end a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::RunFinished { .. } | ProgressEvent::RunError { .. }
        )
    }

    /// True for `RunError { message: "cancelled" }`.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProgressEvent::RunError { message } if message == CANCELLED_MESSAGE)
    }
}

impl From<ProtocolLine> for ProgressEvent {
    /// `DONE` maps to `RunFinished`; callers that must check the exit status
    /// first hold it back.
    fn from(line: ProtocolLine) -> Self {
        match line {
            ProtocolLine::TileOk(coord) => ProgressEvent::TileCompleted { coord },
            ProtocolLine::TileErr { tile, reason } => ProgressEvent::TileFailed {
                coord: tile,
                reason,
            },
            ProtocolLine::Done { ok, err, .. } => ProgressEvent::RunFinished {
                success_count: ok,
                fail_count: err,
            },
            ProtocolLine::Other(line) => ProgressEvent::Diagnostic { line },
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::TileCompleted { coord } => write!(f, "tile {} ok", coord),
            ProgressEvent::TileFailed { coord, reason } => {
                write!(f, "tile {} failed: {}", coord, reason)
            }
            ProgressEvent::RunFinished {
                success_count,
                fail_count,
            } => write!(f, "run finished: {} ok, {} failed", success_count, fail_count),
            ProgressEvent::RunError { message } => write!(f, "run error: {}", message),
            ProgressEvent::Diagnostic { line } => f.write_str(line),
        }
    }
}
