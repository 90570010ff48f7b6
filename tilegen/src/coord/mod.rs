//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (latitude/longitude)
//! and the spherical Web Mercator XYZ tile grid used by slippy-map renderers.
//! Everything here is pure math with no I/O.

mod types;

pub use types::{
    tiles_per_axis, CoordError, TileCoord, MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON, MIN_ZOOM,
};

use std::f64::consts::PI;

/// Converts geographic coordinates to the tile containing them.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees, strictly inside (-85.0511, 85.0511)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to 20)
///
/// Column and row are clamped to `[0, 2^zoom - 1]`, so the antimeridian at
/// +180° lands on the last column instead of one past it.
#[inline]
pub fn lat_lon_to_tile(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord, CoordError> {
    // NaN fails both comparisons and is rejected here too
    if !(lat > MIN_LAT && lat < MAX_LAT) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let n = tiles_per_axis(zoom) as f64;
    let max_index = n - 1.0;

    let x = ((lon + 180.0) / 360.0 * n).floor();

    let lat_rad = lat * PI / 180.0;
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor();

    Ok(TileCoord {
        zoom,
        x: x.clamp(0.0, max_index) as u32,
        y: y.clamp(0.0, max_index) as u32,
    })
}

/// Converts tile coordinates back to geographic coordinates.
///
/// Returns the latitude/longitude of the tile's northwest corner.
#[inline]
pub fn tile_to_lat_lon(tile: &TileCoord) -> (f64, f64) {
    let n = tiles_per_axis(tile.zoom) as f64;

    let lon = tile.x as f64 / n * 360.0 - 180.0;

    let y = tile.y as f64 / n;
    let lat_rad = (PI * (1.0 - 2.0 * y)).sinh().atan();
    let lat = lat_rad * 180.0 / PI;

    (lat, lon)
}
