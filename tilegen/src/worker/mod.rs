//! Worker program synthesis.
//!
//! A worker is a self-contained program that runs inside the rendering
//! stack's environment (typically a container), fetches each tile from the
//! rendering endpoint and writes it under the project directory. The
//! orchestrator never fetches tiles itself; it only renders the program,
//! launches it and reads its stdout.
//!
//! Program text comes from a [`WorkerTemplate`]. Two templates ship with the
//! crate:
//!
//! - [`PythonTemplate`] (default), launched with `python3 -u -`
//! - [`ShellCurlTemplate`], launched with `sh -s`
//!
//! Both speak the [`protocol`] line format and use the exit statuses
//! [`EXIT_PARTIAL`] and [`EXIT_UNREACHABLE`].

pub mod protocol;

mod program;
mod python;
mod shell;
mod synthesizer;
mod template;

pub use program::{
    runs_from_plan, runs_from_tiles, FetchPolicy, TileRun, WorkerProgram,
    DEFAULT_FETCH_ATTEMPTS, DEFAULT_FETCH_BACKOFF, DEFAULT_REQUEST_TIMEOUT,
};
pub use protocol::ProtocolLine;
pub use python::PythonTemplate;
pub use shell::ShellCurlTemplate;
pub use synthesizer::WorkerScriptSynthesizer;
pub use template::{
    WorkerParams, WorkerTemplate, EXIT_PARTIAL, EXIT_UNREACHABLE, WORKER_PROTOCOL_VERSION,
};

use std::sync::Arc;

/// Looks up a built-in template by name (`"python"` or `"shell"`).
pub fn template_by_name(name: &str) -> Option<Arc<dyn WorkerTemplate>> {
    match name {
        "python" => Some(Arc::new(PythonTemplate)),
        "shell" => Some(Arc::new(ShellCurlTemplate)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_by_name() {
        assert_eq!(template_by_name("python").unwrap().name(), "python");
        assert_eq!(template_by_name("shell").unwrap().name(), "shell");
        assert!(template_by_name("perl").is_none());
    }
}
