//! Common types and utilities shared across CLI commands.

use std::path::PathBuf;

use clap::Args;
use tilegen::config::{EngineSettings, ProjectConfig};
use tilegen::pipeline::PipelineState;
use tilegen::plan::{Scope, ZoomRange};

use crate::error::{CliError, EXIT_FAILURE};

/// Exit status when some tiles are still missing.
pub const EXIT_PARTIAL: i32 = 2;

/// Project file selection.
#[derive(Debug, Clone, Args)]
pub struct ProjectArgs {
    /// Project file (JSON with name, render_type, bbox, zoom_levels)
    #[arg(long, short = 'p', value_name = "JSON")]
    pub project: PathBuf,
}

/// A project file with its validated scope and zoom range.
pub struct LoadedProject {
    pub config: ProjectConfig,
    pub scope: Scope,
    pub zoom_range: ZoomRange,
}

impl ProjectArgs {
    pub fn load(&self) -> Result<LoadedProject, CliError> {
        let config = ProjectConfig::load(&self.project)?;
        let scope = config.scope()?;
        let zoom_range = config.zoom_range()?;
        Ok(LoadedProject {
            config,
            scope,
            zoom_range,
        })
    }
}

/// Output location overrides.
#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// Output root holding one directory per project (overrides config)
    #[arg(long, short = 'o', value_name = "DIR")]
    pub output: Option<PathBuf>,
}

impl OutputArgs {
    /// CLI takes precedence over config.
    pub fn apply(&self, settings: &mut EngineSettings) {
        if let Some(root) = &self.output {
            settings.output.root = root.clone();
            // An explicit host path is also what the worker should use.
            settings.output.worker_root = None;
        }
    }
}

/// Exit code for a terminal pipeline state.
pub fn exit_code(state: &PipelineState) -> i32 {
    match state {
        PipelineState::Completed => 0,
        PipelineState::PartialFailure { .. } => EXIT_PARTIAL,
        _ => EXIT_FAILURE,
    }
}

/// Formats a count with thousands separators (`1234567` -> `1,234,567`).
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&PipelineState::Completed), 0);
        assert_eq!(
            exit_code(&PipelineState::PartialFailure {
                failed: BTreeSet::new()
            }),
            2
        );
        assert_eq!(
            exit_code(&PipelineState::Aborted {
                message: "cancelled".into()
            }),
            1
        );
    }

    #[test]
    fn test_output_override_clears_worker_root() {
        let mut settings = EngineSettings::default();
        settings.output.worker_root = Some(PathBuf::from("/data/tiles"));
        OutputArgs {
            output: Some(PathBuf::from("/srv/tiles")),
        }
        .apply(&mut settings);
        assert_eq!(settings.output.root, PathBuf::from("/srv/tiles"));
        assert!(settings.output.worker_root.is_none());
    }

    #[test]
    fn test_project_file_is_loaded_and_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cyprus.json");
        std::fs::write(
            &path,
            r#"{"name": "cyprus", "render_type": "bbox",
                "bbox": {"min_lat": 34.5, "max_lat": 35.7, "min_lon": 32.2, "max_lon": 34.6},
                "zoom_levels": {"min_zoom": 8, "max_zoom": 10}}"#,
        )
        .unwrap();

        let loaded = ProjectArgs { project: path }.load().unwrap();
        assert_eq!(loaded.config.name, "cyprus");
        assert_eq!(loaded.zoom_range.min(), 8);
        assert!(matches!(loaded.scope, Scope::BoundingBox(_)));
    }
}
