//! Geographic scope and zoom range of a generation run.

use std::ops::RangeInclusive;

use crate::coord::{MAX_LON, MAX_ZOOM, MIN_LON};

use super::PlanError;

/// Axis-aligned WGS84 bounding box in degrees.
///
/// `min <= max` holds on both axes. A box with zero width or height is
/// representable but covers no tiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBoundingBox {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
}

impl GeoBoundingBox {
    /// Creates a bounding box, rejecting out-of-range or inverted bounds.
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self, PlanError> {
        for (name, lat) in [("min_lat", min_lat), ("max_lat", max_lat)] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(PlanError::InvalidBoundingBox(format!(
                    "{} = {} is outside -90..90",
                    name, lat
                )));
            }
        }
        for (name, lon) in [("min_lon", min_lon), ("max_lon", max_lon)] {
            if !(MIN_LON..=MAX_LON).contains(&lon) {
                return Err(PlanError::InvalidBoundingBox(format!(
                    "{} = {} is outside -180..180",
                    name, lon
                )));
            }
        }
        if min_lat > max_lat {
            return Err(PlanError::InvalidBoundingBox(format!(
                "min_lat {} is greater than max_lat {}",
                min_lat, max_lat
            )));
        }
        if min_lon > max_lon {
            return Err(PlanError::InvalidBoundingBox(format!(
                "min_lon {} is greater than max_lon {}",
                min_lon, max_lon
            )));
        }

        Ok(Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        })
    }

    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }

    /// True when the box has zero width or zero height.
    pub fn is_degenerate(&self) -> bool {
        self.min_lat == self.max_lat || self.min_lon == self.max_lon
    }
}

/// Inclusive zoom range, `0 <= min <= max <= 20`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomRange {
    min: u8,
    max: u8,
}

impl ZoomRange {
    pub fn new(min: u8, max: u8) -> Result<Self, PlanError> {
        if min > max || max > MAX_ZOOM {
            return Err(PlanError::InvalidZoomRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// Range covering a single zoom level.
    pub fn single(zoom: u8) -> Result<Self, PlanError> {
        Self::new(zoom, zoom)
    }

    pub fn min(&self) -> u8 {
        self.min
    }

    pub fn max(&self) -> u8 {
        self.max
    }

    /// Zoom levels in ascending order.
    pub fn levels(&self) -> RangeInclusive<u8> {
        self.min..=self.max
    }
}

/// Geographic extent a project renders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scope {
    /// The whole world grid at every zoom.
    ///
    /// Only sensible when the source dataset is a small contiguous region;
    /// callers should gate on [`GridPlanner::estimate`](super::GridPlanner::estimate).
    Full,
    /// Tiles intersecting a bounding box.
    BoundingBox(GeoBoundingBox),
}

impl Scope {
    /// Short name used in logs and reports.
    pub fn mode_name(&self) -> &'static str {
        match self {
            Scope::Full => "full",
            Scope::BoundingBox(_) => "bbox",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_accepts_valid_bounds() {
        let bbox = GeoBoundingBox::new(35.1, 35.2, 33.3, 33.4).unwrap();
        assert_eq!(bbox.min_lat(), 35.1);
        assert_eq!(bbox.max_lon(), 33.4);
        assert!(!bbox.is_degenerate());
    }

    #[test]
    fn test_bbox_rejects_inverted_latitudes() {
        let result = GeoBoundingBox::new(10.0, 5.0, 0.0, 1.0);
        assert!(matches!(result, Err(PlanError::InvalidBoundingBox(_))));
    }

    #[test]
    fn test_bbox_rejects_out_of_range_longitude() {
        let result = GeoBoundingBox::new(0.0, 1.0, -181.0, 1.0);
        assert!(matches!(result, Err(PlanError::InvalidBoundingBox(_))));
    }

    #[test]
    fn test_bbox_rejects_nan() {
        assert!(GeoBoundingBox::new(f64::NAN, 1.0, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_zero_area_bbox_is_degenerate() {
        let bbox = GeoBoundingBox::new(10.0, 10.0, 0.0, 1.0).unwrap();
        assert!(bbox.is_degenerate());
    }

    #[test]
    fn test_zoom_range_bounds() {
        assert!(ZoomRange::new(0, 20).is_ok());
        assert_eq!(
            ZoomRange::new(5, 4),
            Err(PlanError::InvalidZoomRange { min: 5, max: 4 })
        );
        assert!(ZoomRange::new(0, 21).is_err());
        assert_eq!(ZoomRange::single(7).unwrap().levels().count(), 1);
    }
}
