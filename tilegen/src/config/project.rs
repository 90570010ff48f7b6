//! Project definition handed over by the configuration front end.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plan::{GeoBoundingBox, PlanError, Scope, ZoomRange};

/// Errors loading or interpreting a project file.
#[derive(Debug, Error)]
pub enum ProjectConfigError {
    #[error("Failed to read project file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse project file: {0}")]
    Parse(#[from] serde_json::Error),

    /// `render_type` is `bbox` but no `bbox` object was given.
    #[error("Project '{0}' uses render_type \"bbox\" but has no bbox")]
    MissingBoundingBox(String),

    #[error("Project '{name}': {source}")]
    Invalid {
        name: String,
        #[source]
        source: PlanError,
    },
}

/// Whole-world or bounding-box rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderType {
    Full,
    Bbox,
}

/// Bounding box as written in project files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BboxConfig {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomLevels {
    pub min_zoom: u8,
    pub max_zoom: u8,
}

/// A finalized project.
///
/// Unknown keys (`pbf_path`, `style`, `created_at`, ...) belong to other
/// stages and are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub render_type: RenderType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BboxConfig>,
    pub zoom_levels: ZoomLevels,
}

impl ProjectConfig {
    pub fn from_json(json: &str) -> Result<Self, ProjectConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ProjectConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ProjectConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Validated geographic scope.
    pub fn scope(&self) -> Result<Scope, ProjectConfigError> {
        match self.render_type {
            RenderType::Full => Ok(Scope::Full),
            RenderType::Bbox => {
                let b = self
                    .bbox
                    .ok_or_else(|| ProjectConfigError::MissingBoundingBox(self.name.clone()))?;
                GeoBoundingBox::new(b.min_lat, b.max_lat, b.min_lon, b.max_lon)
                    .map(Scope::BoundingBox)
                    .map_err(|source| self.invalid(source))
            }
        }
    }

    /// Validated zoom range.
    pub fn zoom_range(&self) -> Result<ZoomRange, ProjectConfigError> {
        ZoomRange::new(self.zoom_levels.min_zoom, self.zoom_levels.max_zoom)
            .map_err(|source| self.invalid(source))
    }

    fn invalid(&self, source: PlanError) -> ProjectConfigError {
        ProjectConfigError::Invalid {
            name: self.name.clone(),
            source,
        }
    }
}
