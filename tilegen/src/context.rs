//! Explicit run context shared by every stage of a generation run.
//!
//! The context carries everything that would otherwise be ambient state
//! (working directory, hard-coded endpoint, output location) and is passed
//! by reference from planning through synthesis, supervision and retry.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::coord::TileCoord;

/// Errors raised when building a [`RunContext`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// Project names become a directory name and must be a single path segment.
    #[error("Invalid project name '{0}': must be a non-empty single path segment")]
    InvalidProjectName(String),

    /// Endpoint base URL is empty or has no scheme.
    #[error("Invalid endpoint URL '{0}': expected something like http://host/tile")]
    InvalidEndpoint(String),
}

/// Where tiles come from and where they go for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    output_root: PathBuf,
    worker_output_root: Option<PathBuf>,
    project_name: String,
    endpoint_base_url: String,
}

impl RunContext {
    /// Creates a context.
    ///
    /// # Arguments
    ///
    /// * `output_root` - Directory holding one subdirectory per project
    /// * `project_name` - Project directory name
    /// * `endpoint_base_url` - Base URL of the rendering endpoint; a trailing
    ///   slash is removed
    pub fn new(
        output_root: impl Into<PathBuf>,
        project_name: impl Into<String>,
        endpoint_base_url: impl Into<String>,
    ) -> Result<Self, ContextError> {
        let project_name = project_name.into();
        if project_name.is_empty()
            || project_name == "."
            || project_name == ".."
            || project_name.contains(|c: char| c == '/' || c == '\\')
        {
            return Err(ContextError::InvalidProjectName(project_name));
        }

        let endpoint = endpoint_base_url.into();
        let trimmed = endpoint.trim().trim_end_matches('/');
        if !trimmed.contains("://") || trimmed.ends_with("://") {
            return Err(ContextError::InvalidEndpoint(endpoint));
        }

        Ok(Self {
            output_root: output_root.into(),
            worker_output_root: None,
            project_name,
            endpoint_base_url: trimmed.to_string(),
        })
    }

    /// Sets the output root as seen from inside the worker's environment.
    ///
    /// Needed when the worker runs in a container that mounts the host's
    /// output root at a different path (e.g. `/data/tiles`).
    pub fn with_worker_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.worker_output_root = Some(root.into());
        self
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn endpoint_base_url(&self) -> &str {
        &self.endpoint_base_url
    }

    /// Host directory holding this project's tiles.
    pub fn project_dir(&self) -> PathBuf {
        self.output_root.join(&self.project_name)
    }

    /// Project directory as the worker sees it.
    pub fn worker_project_dir(&self) -> PathBuf {
        self.worker_output_root
            .as_ref()
            .unwrap_or(&self.output_root)
            .join(&self.project_name)
    }

    /// Host path of a tile: `{output_root}/{project}/{z}/{x}/{y}.png`.
    pub fn tile_path(&self, tile: &TileCoord) -> PathBuf {
        self.project_dir().join(tile.relative_path())
    }

    /// Endpoint URL of a tile: `{base}/{z}/{x}/{y}.png`.
    pub fn tile_url(&self, tile: &TileCoord) -> String {
        format!("{}/{}", self.endpoint_base_url, tile.url_suffix())
    }
}
