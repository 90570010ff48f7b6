//! CLI runner for common setup and operations.
//!
//! Encapsulates logging initialization and settings loading so command
//! handlers start from the same place.

use std::path::Path;

use tilegen::config::{config_file_path, EngineSettings};
use tilegen::logging::{default_log_dir, default_log_file, init_logging, LoggingGuard};
use tracing::info;

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    settings: EngineSettings,
}

impl CliRunner {
    /// Loads settings and initializes logging.
    ///
    /// # Arguments
    ///
    /// * `config` - Settings file; `~/.tilegen/config.ini` when `None`
    /// * `console` - Mirror log events to stderr
    pub fn new(config: Option<&Path>, console: bool) -> Result<Self, CliError> {
        let (settings, path) = match config {
            Some(path) => (EngineSettings::load_from(path)?, path.to_path_buf()),
            None => (EngineSettings::load()?, config_file_path()),
        };

        let logging_guard = init_logging(&default_log_dir(), default_log_file(), console)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        info!(config = %path.display(), "Settings loaded");
        Ok(Self {
            logging_guard,
            settings,
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut EngineSettings {
        &mut self.settings
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("tilegen v{}", tilegen::VERSION);
        info!("tilegen CLI: {} command", command);
    }
}
