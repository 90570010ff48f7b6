//! Configuration.
//!
//! Two layers:
//!
//! - [`ProjectConfig`] - one project's scope and zoom range, as JSON written
//!   by the project front end
//! - [`EngineSettings`] - engine knobs (endpoint, output, worker, supervision,
//!   retry) from `~/.tilegen/config.ini`, all optional
//!
//! # Example
//!
//! ```ignore
//! let settings = EngineSettings::load()?;
//! let project = ProjectConfig::load(Path::new("projects/cyprus.json"))?;
//! let ctx = settings.run_context(&project.name)?;
//! ```

mod parser;
mod project;
mod settings;

pub use project::{BboxConfig, ProjectConfig, ProjectConfigError, RenderType, ZoomLevels};
pub use settings::{
    config_directory, config_file_path, ConfigFileError, EndpointSettings, EngineSettings,
    OutputSettings, RetrySettings, WorkerSettings, DEFAULT_ENDPOINT, DEFAULT_OUTPUT_ROOT,
    DEFAULT_TEMPLATE,
};
