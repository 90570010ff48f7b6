//! Template seam for worker program text.

use std::path::PathBuf;

use super::program::{FetchPolicy, TileRun};

/// Version of the worker program grammar and output protocol.
///
/// Bumped whenever the template parameters or the line protocol change.
pub const WORKER_PROTOCOL_VERSION: u32 = 1;

/// Worker exit status when at least one tile failed.
pub const EXIT_PARTIAL: i32 = 2;

/// Worker exit status when the endpoint never answered a single request.
pub const EXIT_UNREACHABLE: i32 = 3;

/// Parameters a template is instantiated with.
#[derive(Debug, Clone)]
pub struct WorkerParams<'a> {
    /// Endpoint base URL, without trailing slash.
    pub endpoint_base_url: &'a str,
    /// Project directory as seen by the worker.
    pub project_dir: PathBuf,
    /// Tiles to walk, in plan order.
    pub runs: &'a [TileRun],
    /// Number of tiles covered by `runs`.
    pub tile_count: u64,
    /// Per-tile fetch behaviour.
    pub fetch: FetchPolicy,
}

/// Turns [`WorkerParams`] into program text for one execution environment.
///
/// Implementations are pure: the same parameters always render the same
/// text. Every rendered program must honour the line protocol in
/// [`protocol`](super::protocol) and the exit statuses above.
pub trait WorkerTemplate: Send + Sync {
    /// Short identifier, e.g. `"python"`.
    fn name(&self) -> &'static str;

    /// Launcher command line that executes this template's programs when the
    /// program text is piped to its stdin.
    fn default_launcher(&self) -> Vec<String>;

    /// Renders the program text.
    fn render(&self, params: &WorkerParams<'_>) -> String;
}
