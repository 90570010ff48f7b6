//! Engine settings and their INI file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::context::{ContextError, RunContext};
use crate::pipeline::DEFAULT_MAX_ROUNDS;
use crate::reconcile::TileCheck;
use crate::supervisor::{SupervisorConfig, SupervisorError, WorkerLauncher};
use crate::worker::{template_by_name, FetchPolicy, WorkerScriptSynthesizer, WorkerTemplate};

/// Default rendering endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost/tile";

/// Default output root, relative to the working directory.
pub const DEFAULT_OUTPUT_ROOT: &str = "tiles";

/// Default worker template.
pub const DEFAULT_TEMPLATE: &str = "python";

/// Errors reading or applying the settings file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Settings produce an unusable launcher.
    #[error("Invalid worker launcher: {0}")]
    Launcher(#[from] SupervisorError),

    /// Settings produce an unusable run context.
    #[error(transparent)]
    Context(#[from] ContextError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSettings {
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSettings {
    /// Host directory holding one subdirectory per project.
    pub root: PathBuf,
    /// The same directory as mounted inside the worker's container.
    pub worker_root: Option<PathBuf>,
    pub tile_check: TileCheck,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Template name, `python` or `shell`.
    pub template: String,
    /// Launcher command line; the template's default when unset.
    pub launcher: Option<String>,
    /// Container to `docker exec` the launcher in.
    pub container: Option<String>,
    pub fetch: FetchPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    pub max_rounds: u32,
}

/// Every engine knob, defaults overlaid with `~/.tilegen/config.ini`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub endpoint: EndpointSettings,
    pub output: OutputSettings,
    pub worker: WorkerSettings,
    pub supervisor: SupervisorConfig,
    pub retry: RetrySettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            endpoint: EndpointSettings {
                base_url: DEFAULT_ENDPOINT.to_string(),
            },
            output: OutputSettings {
                root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
                worker_root: None,
                tile_check: TileCheck::default(),
            },
            worker: WorkerSettings {
                template: DEFAULT_TEMPLATE.to_string(),
                launcher: None,
                container: None,
                fetch: FetchPolicy::default(),
            },
            supervisor: SupervisorConfig::default(),
            retry: RetrySettings {
                max_rounds: DEFAULT_MAX_ROUNDS,
            },
        }
    }
}

impl EngineSettings {
    /// Loads from the default path (`~/.tilegen/config.ini`).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Loads from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Parses INI text directly.
    pub fn from_ini_str(content: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(content).map_err(ini::Error::Parse)?;
        super::parser::parse_ini(&ini)
    }

    /// Template selected by `[worker] template`.
    pub fn template(&self) -> Result<Arc<dyn WorkerTemplate>, ConfigFileError> {
        template_by_name(&self.worker.template).ok_or_else(|| ConfigFileError::InvalidValue {
            section: "worker".to_string(),
            key: "template".to_string(),
            value: self.worker.template.clone(),
            reason: "must be 'python' or 'shell'".to_string(),
        })
    }

    pub fn synthesizer(&self) -> Result<WorkerScriptSynthesizer, ConfigFileError> {
        Ok(WorkerScriptSynthesizer::new(self.template()?).with_fetch_policy(self.worker.fetch))
    }

    /// Launcher for the configured template, wrapped in `docker exec` when a
    /// container is set.
    pub fn launcher(&self) -> Result<WorkerLauncher, ConfigFileError> {
        let inner = match &self.worker.launcher {
            Some(command_line) => WorkerLauncher::parse(command_line)?,
            None => WorkerLauncher::for_template(self.template()?.as_ref())?,
        };
        Ok(match &self.worker.container {
            Some(container) => WorkerLauncher::in_container(container, &inner),
            None => inner,
        })
    }

    /// Run context for `project_name` under the configured output root.
    pub fn run_context(&self, project_name: &str) -> Result<RunContext, ConfigFileError> {
        let ctx = RunContext::new(&self.output.root, project_name, &self.endpoint.base_url)?;
        Ok(match &self.output.worker_root {
            Some(root) => ctx.with_worker_output_root(root),
            None => ctx,
        })
    }

    /// Supervision timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.supervisor.timeout
    }
}

/// Config directory (`~/.tilegen`).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tilegen")
}

/// Config file (`~/.tilegen/config.ini`).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
