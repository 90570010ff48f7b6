//! Progress callbacks for UI collaborators.

use super::state::PipelineState;
use crate::supervisor::ProgressEvent;

/// Receives pipeline progress as it happens.
///
/// Callbacks run on the pipeline's task between events, so they should be
/// cheap (print, count, update a progress bar).
pub trait ProgressObserver: Send + Sync {
    /// Called on every state transition, terminal states included.
    fn on_state(&self, _state: &PipelineState) {}

    /// Called before a worker round starts.
    fn on_round_start(&self, _round: u32, _tiles: u64) {}

    /// Called for every event of a round, in order.
    fn on_event(&self, _round: u32, _event: &ProgressEvent) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}
