//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use tilegen::config::{ConfigFileError, ProjectConfigError};
use tilegen::pipeline::PipelineError;
use tilegen::plan::PlanError;

/// Exit status for runs that aborted or never started.
pub const EXIT_FAILURE: i32 = 1;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Engine settings could not be loaded or applied
    Config(ConfigFileError),
    /// Project file could not be read or is invalid
    Project(ProjectConfigError),
    /// Scope or zoom range rejected by the planner
    Plan(PlanError),
    /// Pipeline refused to start
    Pipeline(PipelineError),
    /// Failed to install the Ctrl-C handler
    Signal(String),
    /// Async runtime could not be created
    Runtime(std::io::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Config(ConfigFileError::InvalidValue { section, key, .. }) => {
                eprintln!();
                eprintln!("Fix '{}' in the [{}] section of the config file.", key, section);
            }
            CliError::Pipeline(PipelineError::EmptyScope { .. }) => {
                eprintln!();
                eprintln!("Check the project's bbox: min and max must differ.");
            }
            _ => {}
        }

        process::exit(EXIT_FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Project(e) => write!(f, "Project error: {}", e),
            CliError::Plan(e) => write!(f, "Planning error: {}", e),
            CliError::Pipeline(e) => write!(f, "Pipeline error: {}", e),
            CliError::Signal(msg) => write!(f, "Failed to set signal handler: {}", msg),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Project(e) => Some(e),
            CliError::Plan(e) => Some(e),
            CliError::Pipeline(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<ProjectConfigError> for CliError {
    fn from(e: ProjectConfigError) -> Self {
        CliError::Project(e)
    }
}

impl From<PlanError> for CliError {
    fn from(e: PlanError) -> Self {
        CliError::Plan(e)
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Pipeline(e)
    }
}
