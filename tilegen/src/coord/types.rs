//! Coordinate type definitions

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Web Mercator projection limit (exclusive) in degrees latitude.
pub const MAX_LAT: f64 = 85.0511;
pub const MIN_LAT: f64 = -85.0511;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Zoom levels supported by the rendering stack
pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 20;

/// Address of one tile in the standard XYZ quadtree of a Mercator map.
///
/// Tiles order by zoom, then row (`y`), then column (`x`), which is the
/// order every generation plan and worker program walks them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Zoom level (0-20)
    pub zoom: u8,
    /// Column (east-west), 0 at the antimeridian west edge
    pub x: u32,
    /// Row (north-south), 0 at north
    pub y: u32,
}

impl TileCoord {
    /// Creates a tile coordinate, checking it lies inside the grid for its zoom.
    pub fn new(zoom: u8, x: u32, y: u32) -> Result<Self, CoordError> {
        if zoom > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(zoom));
        }
        let n = tiles_per_axis(zoom);
        if u64::from(x) >= n || u64::from(y) >= n {
            return Err(CoordError::OutOfGrid { zoom, x, y });
        }
        Ok(Self { zoom, x, y })
    }

    /// Relative path of this tile below a project directory: `{z}/{x}/{y}.png`.
    pub fn relative_path(&self) -> PathBuf {
        let mut path = PathBuf::from(self.zoom.to_string());
        path.push(self.x.to_string());
        path.push(format!("{}.png", self.y));
        path
    }

    /// URL suffix of this tile on a rendering endpoint: `{z}/{x}/{y}.png`.
    pub fn url_suffix(&self) -> String {
        format!("{}/{}/{}.png", self.zoom, self.x, self.y)
    }
}

impl Ord for TileCoord {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.zoom, self.y, self.x).cmp(&(other.zoom, other.y, other.x))
    }
}

impl PartialOrd for TileCoord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Number of tiles along one axis at `zoom` (`2^zoom`).
#[inline]
pub fn tiles_per_axis(zoom: u8) -> u64 {
    1u64 << zoom
}

/// Errors that can occur during coordinate conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Latitude is outside the Mercator band (-85.0511, 85.0511)
    #[error("Invalid latitude: {0} (must be strictly between {} and {})", MIN_LAT, MAX_LAT)]
    InvalidLatitude(f64),

    /// Longitude is outside valid range (-180.0 to 180.0)
    #[error("Invalid longitude: {0} (must be between {} and {})", MIN_LON, MAX_LON)]
    InvalidLongitude(f64),

    /// Zoom level is above the supported maximum
    #[error("Invalid zoom level: {0} (must be between {} and {})", MIN_ZOOM, MAX_ZOOM)]
    InvalidZoom(u8),

    /// Column or row does not exist at this zoom
    #[error("Tile {zoom}/{x}/{y} lies outside the grid for zoom {zoom}")]
    OutOfGrid { zoom: u8, x: u32, y: u32 },
}
