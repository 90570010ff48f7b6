//! Tile grid planning.
//!
//! Turns a project's geographic [`Scope`] and [`ZoomRange`] into a
//! [`GenerationPlan`]: the exact, deterministic sequence of tiles a run has
//! to produce.
//!
//! # Ordering
//!
//! Plans are walked by zoom, then row (`y`, north to south), then column
//! (`x`, west to east). The same order is used by worker programs and by
//! `BTreeSet<TileCoord>`, so any subset of a plan iterates consistently.
//!
//! # Example
//!
//! ```
//! use tilegen::plan::{GeoBoundingBox, GridPlanner, Scope, ZoomRange};
//!
//! let scope = Scope::BoundingBox(GeoBoundingBox::new(35.1, 35.2, 33.3, 33.4).unwrap());
//! let zooms = ZoomRange::new(9, 10).unwrap();
//!
//! let plan = GridPlanner::plan(&scope, zooms).unwrap();
//! assert_eq!(plan.len(), GridPlanner::estimate(&scope, zooms).unwrap());
//! ```

mod planner;
mod scope;

pub use planner::{tile_range, tile_ranges, GenerationPlan, GridPlanner, PlanIter, TileRange};
pub use scope::{GeoBoundingBox, Scope, ZoomRange};

use thiserror::Error;

use crate::coord::CoordError;

/// Errors raised while validating scope inputs or planning a grid.
///
/// Every variant belongs to the invalid-input class: they are raised before
/// any work starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    /// Bounding box values are out of range or inverted.
    #[error("Invalid bounding box: {0}")]
    InvalidBoundingBox(String),

    /// Zoom range is inverted or above the supported maximum.
    #[error("Invalid zoom range {min}-{max} (expected 0 <= min <= max <= 20)")]
    InvalidZoomRange { min: u8, max: u8 },

    /// Coordinate conversion rejected a value.
    #[error(transparent)]
    Coord(#[from] CoordError),
}
