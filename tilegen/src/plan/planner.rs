//! Grid planning: scope + zoom range → ordered tile coordinates.

use std::iter::FusedIterator;

use tracing::debug;

use crate::coord::{lat_lon_to_tile, tile_to_lat_lon, tiles_per_axis, TileCoord, MAX_LAT, MIN_LAT};

use super::scope::{GeoBoundingBox, Scope, ZoomRange};
use super::PlanError;

/// Largest latitude the planner feeds into the Mercator conversion.
///
/// Bounding boxes reaching the poles are clipped to this band so they still
/// plan the edge rows instead of failing the conversion.
const PLANNABLE_LAT: f64 = MAX_LAT - 1e-7;

/// Closed rectangle of tiles at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub zoom: u8,
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

impl TileRange {
    /// Number of tiles in the rectangle.
    pub fn count(&self) -> u64 {
        u64::from(self.x_max - self.x_min + 1) * u64::from(self.y_max - self.y_min + 1)
    }

    /// Area covered by the rectangle as `(north, west, south, east)` degrees.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let (north, west) = tile_to_lat_lon(&TileCoord {
            zoom: self.zoom,
            x: self.x_min,
            y: self.y_min,
        });
        // south-east corner is the north-west corner of the next tile
        let (south, east) = tile_to_lat_lon(&TileCoord {
            zoom: self.zoom,
            x: self.x_max + 1,
            y: self.y_max + 1,
        });
        (north, west, south, east)
    }

    pub fn contains(&self, tile: &TileCoord) -> bool {
        tile.zoom == self.zoom
            && (self.x_min..=self.x_max).contains(&tile.x)
            && (self.y_min..=self.y_max).contains(&tile.y)
    }
}

/// Computes the tile rectangle for `scope` at `zoom`.
///
/// Returns `None` when the scope covers no tiles at this zoom.
pub fn tile_range(scope: &Scope, zoom: u8) -> Result<Option<TileRange>, PlanError> {
    match scope {
        Scope::Full => {
            let last = (tiles_per_axis(zoom) - 1) as u32;
            Ok(Some(TileRange {
                zoom,
                x_min: 0,
                x_max: last,
                y_min: 0,
                y_max: last,
            }))
        }
        Scope::BoundingBox(bbox) => bbox_range(bbox, zoom),
    }
}

fn bbox_range(bbox: &GeoBoundingBox, zoom: u8) -> Result<Option<TileRange>, PlanError> {
    let north = bbox.max_lat().clamp(-PLANNABLE_LAT, PLANNABLE_LAT);
    let south = bbox.min_lat().clamp(-PLANNABLE_LAT, PLANNABLE_LAT);

    if bbox.is_degenerate() || north == south {
        return Ok(None);
    }
    debug_assert!(south > MIN_LAT && north < MAX_LAT);

    // Increasing latitude decreases the tile row
    let top_left = lat_lon_to_tile(north, bbox.min_lon(), zoom)?;
    let bottom_right = lat_lon_to_tile(south, bbox.max_lon(), zoom)?;

    Ok(Some(TileRange {
        zoom,
        x_min: top_left.x,
        x_max: bottom_right.x,
        y_min: top_left.y,
        y_max: bottom_right.y,
    }))
}

/// Per-zoom rectangles for a scope, in ascending zoom order.
pub fn tile_ranges(scope: &Scope, zoom_range: ZoomRange) -> Result<Vec<TileRange>, PlanError> {
    let mut ranges = Vec::new();
    for zoom in zoom_range.levels() {
        if let Some(range) = tile_range(scope, zoom)? {
            ranges.push(range);
        }
    }
    Ok(ranges)
}

/// The deterministic, ordered set of tiles a run must produce.
///
/// Stored as per-zoom rectangles; [`GenerationPlan::iter`] walks them in
/// zoom, row, column order without materializing every coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationPlan {
    scope: Scope,
    zoom_range: ZoomRange,
    ranges: Vec<TileRange>,
    len: u64,
}

impl GenerationPlan {
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn zoom_range(&self) -> ZoomRange {
        self.zoom_range
    }

    pub fn ranges(&self) -> &[TileRange] {
        &self.ranges
    }

    /// Total number of tiles in the plan.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, tile: &TileCoord) -> bool {
        self.ranges.iter().any(|r| r.contains(tile))
    }

    pub fn iter(&self) -> PlanIter<'_> {
        PlanIter {
            ranges: &self.ranges,
            index: 0,
            next_x: self.ranges.first().map(|r| r.x_min).unwrap_or(0),
            next_y: self.ranges.first().map(|r| r.y_min).unwrap_or(0),
            remaining: self.len,
        }
    }
}

impl<'a> IntoIterator for &'a GenerationPlan {
    type Item = TileCoord;
    type IntoIter = PlanIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a plan in zoom, row, column order.
#[derive(Debug, Clone)]
pub struct PlanIter<'a> {
    ranges: &'a [TileRange],
    index: usize,
    next_x: u32,
    next_y: u32,
    remaining: u64,
}

impl Iterator for PlanIter<'_> {
    type Item = TileCoord;

    fn next(&mut self) -> Option<Self::Item> {
        let range = self.ranges.get(self.index)?;
        let tile = TileCoord {
            zoom: range.zoom,
            x: self.next_x,
            y: self.next_y,
        };

        if self.next_x < range.x_max {
            self.next_x += 1;
        } else if self.next_y < range.y_max {
            self.next_x = range.x_min;
            self.next_y += 1;
        } else {
            self.index += 1;
            if let Some(next) = self.ranges.get(self.index) {
                self.next_x = next.x_min;
                self.next_y = next.y_min;
            }
        }

        self.remaining -= 1;
        Some(tile)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

impl FusedIterator for PlanIter<'_> {}

/// Builds generation plans and estimates their size.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridPlanner;

impl GridPlanner {
    /// Builds the plan for `scope` over `zoom_range`.
    ///
    /// The same inputs always produce an equal plan.
    pub fn plan(scope: &Scope, zoom_range: ZoomRange) -> Result<GenerationPlan, PlanError> {
        let ranges = tile_ranges(scope, zoom_range)?;
        let len = ranges.iter().map(TileRange::count).sum();

        debug!(
            mode = scope.mode_name(),
            min_zoom = zoom_range.min(),
            max_zoom = zoom_range.max(),
            tiles = len,
            "Generation plan built"
        );

        Ok(GenerationPlan {
            scope: *scope,
            zoom_range,
            ranges,
            len,
        })
    }

    /// Counts the tiles [`GridPlanner::plan`] would produce, analytically.
    pub fn estimate(scope: &Scope, zoom_range: ZoomRange) -> Result<u64, PlanError> {
        let mut total = 0u64;
        for zoom in zoom_range.levels() {
            total += match scope {
                Scope::Full => 1u64 << (2 * u32::from(zoom)),
                Scope::BoundingBox(bbox) => match bbox_range(bbox, zoom)? {
                    Some(range) => {
                        u64::from(range.x_max - range.x_min + 1)
                            * u64::from(range.y_max - range.y_min + 1)
                    }
                    None => 0,
                },
            };
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cyprus_bbox() -> Scope {
        Scope::BoundingBox(GeoBoundingBox::new(35.1, 35.2, 33.3, 33.4).unwrap())
    }

    #[test]
    fn test_range_bounds() {
        let world = tile_range(&Scope::Full, 0).unwrap().unwrap();
        let (north, west, south, east) = world.bounds();
        assert!((north - MAX_LAT).abs() < 1e-3);
        assert!((south - MIN_LAT).abs() < 1e-3);
        assert_eq!((west, east), (-180.0, 180.0));

        let range = tile_range(&cyprus_bbox(), 10).unwrap().unwrap();
        let (north, west, south, east) = range.bounds();
        assert!(north >= 35.2 && south <= 35.1);
        assert!(west <= 33.3 && east >= 33.4);
    }

    #[test]
    fn test_small_bbox_single_tile_at_zoom_9() {
        let range = ZoomRange::single(9).unwrap();
        let plan = GridPlanner::plan(&cyprus_bbox(), range).unwrap();

        let tiles: Vec<_> = plan.iter().collect();
        assert_eq!(tiles, vec![TileCoord { zoom: 9, x: 303, y: 202 }]);
        assert_eq!(GridPlanner::estimate(&cyprus_bbox(), range).unwrap(), 1);
    }

    #[test]
    fn test_small_bbox_straddles_tile_edges_at_zoom_10() {
        let range = ZoomRange::single(10).unwrap();
        let plan = GridPlanner::plan(&cyprus_bbox(), range).unwrap();

        let tiles: Vec<_> = plan.iter().collect();
        assert_eq!(
            tiles,
            vec![
                TileCoord { zoom: 10, x: 606, y: 404 },
                TileCoord { zoom: 10, x: 607, y: 404 },
                TileCoord { zoom: 10, x: 606, y: 405 },
                TileCoord { zoom: 10, x: 607, y: 405 },
            ]
        );
        assert_eq!(plan.len(), 4);
        assert_eq!(GridPlanner::estimate(&cyprus_bbox(), range).unwrap(), 4);
    }

    #[test]
    fn test_full_scope_zoom_0_to_1() {
        let range = ZoomRange::new(0, 1).unwrap();
        let plan = GridPlanner::plan(&Scope::Full, range).unwrap();

        let tiles: Vec<_> = plan.iter().collect();
        assert_eq!(tiles.len(), 5);
        assert_eq!(tiles[0], TileCoord { zoom: 0, x: 0, y: 0 });
        assert_eq!(tiles[1], TileCoord { zoom: 1, x: 0, y: 0 });
        assert_eq!(tiles[2], TileCoord { zoom: 1, x: 1, y: 0 });
        assert_eq!(tiles[3], TileCoord { zoom: 1, x: 0, y: 1 });
        assert_eq!(GridPlanner::estimate(&Scope::Full, range).unwrap(), 5);
    }

    #[test]
    fn test_full_scope_estimate_at_max_zoom_does_not_overflow() {
        let range = ZoomRange::new(0, 20).unwrap();
        let expected: u64 = (0..=20u32).map(|z| 4u64.pow(z)).sum();
        assert_eq!(GridPlanner::estimate(&Scope::Full, range).unwrap(), expected);
    }

    #[test]
    fn test_degenerate_bbox_plans_nothing() {
        let scope = Scope::BoundingBox(GeoBoundingBox::new(10.0, 10.0, 5.0, 6.0).unwrap());
        let range = ZoomRange::new(0, 5).unwrap();

        let plan = GridPlanner::plan(&scope, range).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.iter().count(), 0);
        assert_eq!(GridPlanner::estimate(&scope, range).unwrap(), 0);
    }

    #[test]
    fn test_polar_bbox_is_clipped_not_rejected() {
        let scope = Scope::BoundingBox(GeoBoundingBox::new(80.0, 90.0, -10.0, 10.0).unwrap());
        let plan = GridPlanner::plan(&scope, ZoomRange::single(3).unwrap()).unwrap();
        assert!(plan.iter().all(|t| t.y == 0));
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_bbox_entirely_above_mercator_band_is_empty() {
        let scope = Scope::BoundingBox(GeoBoundingBox::new(86.0, 89.0, 0.0, 10.0).unwrap());
        let plan = GridPlanner::plan(&scope, ZoomRange::single(3).unwrap()).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_plan_contains() {
        let plan = GridPlanner::plan(&cyprus_bbox(), ZoomRange::single(10).unwrap()).unwrap();
        assert!(plan.contains(&TileCoord { zoom: 10, x: 607, y: 405 }));
        assert!(!plan.contains(&TileCoord { zoom: 10, x: 608, y: 405 }));
        assert!(!plan.contains(&TileCoord { zoom: 9, x: 303, y: 202 }));
    }

    #[test]
    fn test_plan_is_referentially_transparent() {
        let range = ZoomRange::new(8, 12).unwrap();
        let a = GridPlanner::plan(&cyprus_bbox(), range).unwrap();
        let b = GridPlanner::plan(&cyprus_bbox(), range).unwrap();
        assert_eq!(a, b);
        assert!(a.iter().eq(b.iter()));
    }

    proptest! {
        #[test]
        fn prop_estimate_matches_plan_length(
            lat in -84.0f64..84.0,
            lon in -179.0f64..179.0,
            height in 0.0f64..1.0,
            width in 0.0f64..1.0,
            min_zoom in 0u8..=10,
            span in 0u8..=3,
        ) {
            let bbox = GeoBoundingBox::new(lat, lat + height, lon, lon + width).unwrap();
            let scope = Scope::BoundingBox(bbox);
            let range = ZoomRange::new(min_zoom, min_zoom + span).unwrap();

            let plan = GridPlanner::plan(&scope, range).unwrap();
            let estimate = GridPlanner::estimate(&scope, range).unwrap();

            prop_assert_eq!(estimate, plan.len());
            prop_assert_eq!(estimate, plan.iter().count() as u64);
        }

        #[test]
        fn prop_plan_is_strictly_ordered(
            lat in -80.0f64..80.0,
            lon in -170.0f64..170.0,
            size in 0.01f64..2.0,
            min_zoom in 0u8..=8,
        ) {
            let bbox = GeoBoundingBox::new(lat, lat + size, lon, lon + size).unwrap();
            let plan = GridPlanner::plan(
                &Scope::BoundingBox(bbox),
                ZoomRange::new(min_zoom, min_zoom + 2).unwrap(),
            ).unwrap();

            let tiles: Vec<_> = plan.iter().collect();
            prop_assert!(tiles.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn prop_full_estimate_matches_plan(min_zoom in 0u8..=4, span in 0u8..=2) {
            let range = ZoomRange::new(min_zoom, min_zoom + span).unwrap();
            let plan = GridPlanner::plan(&Scope::Full, range).unwrap();
            prop_assert_eq!(GridPlanner::estimate(&Scope::Full, range).unwrap(), plan.iter().count() as u64);
        }
    }
}
