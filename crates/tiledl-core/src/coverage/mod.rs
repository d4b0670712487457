//! Coverage calculation: selection (polygons or whole world) × zoom range →
//! the ordered, deduplicated set of tiles to fetch.
//!
//! Pure computation; runs before any network activity so that an empty or
//! invalid selection fails the run up front.

mod polygon;
mod tile;

pub use polygon::{GeoPoint, Polygon};
pub use tile::{grid_size, project, TileBounds, TileCoordinate, MAX_LAT, MAX_TILE_ZOOM};

use std::collections::BTreeSet;

use crate::error::CoverageError;
use polygon::{clipped_area, ring_area, segment_clip, Pt};
use tile::clamp_index;

/// Deepest zoom a world selection may ever reach (about 1.4M tiles in total).
pub const MAX_WORLD_ZOOM: u8 = 10;

/// Overlap below this (in tile² at the current zoom) counts as touching only.
const AREA_EPS: f64 = 1e-12;

/// What the user selected.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Polygons(Vec<Polygon>),
    World,
}

/// Zoom limits applied while computing coverage (from config).
#[derive(Debug, Clone, Copy)]
pub struct ZoomLimits {
    /// Deepest zoom accepted for polygon selections.
    pub max_zoom: u8,
    /// Deepest zoom for world selections; deeper requests are clamped.
    pub world_max_zoom: u8,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self {
            max_zoom: 19,
            world_max_zoom: 7,
        }
    }
}

/// The resolved tile set for a run, ordered by `(zoom, x, y)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Coverage {
    tiles: Vec<TileCoordinate>,
}

impl Coverage {
    /// Deterministic denominator for progress.
    pub fn total(&self) -> u64 {
        self.tiles.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[TileCoordinate] {
        &self.tiles
    }

    pub fn into_tiles(self) -> Vec<TileCoordinate> {
        self.tiles
    }

    pub fn contains(&self, coord: &TileCoordinate) -> bool {
        self.tiles.binary_search(coord).is_ok()
    }
}

/// Compute the coverage for `selection` over `zoom_min..=zoom_max`.
pub fn compute(
    selection: &Selection,
    zoom_min: u8,
    zoom_max: u8,
    limits: ZoomLimits,
) -> Result<Coverage, CoverageError> {
    match selection {
        Selection::World => {
            let ceiling = limits.world_max_zoom.min(MAX_WORLD_ZOOM);
            let mut max = zoom_max;
            if max > ceiling {
                tracing::warn!(
                    requested = zoom_max,
                    limit = ceiling,
                    "world coverage clamped to maximum zoom"
                );
                max = ceiling;
            }
            if zoom_min > max {
                return Err(CoverageError::InvalidZoomRange {
                    min: zoom_min,
                    max,
                    limit: ceiling,
                });
            }
            Ok(world(zoom_min, max))
        }
        Selection::Polygons(polygons) => {
            if polygons.is_empty() {
                return Err(CoverageError::NoCoverage);
            }
            let limit = limits.max_zoom.min(MAX_TILE_ZOOM);
            if zoom_min > zoom_max || zoom_max > limit {
                return Err(CoverageError::InvalidZoomRange {
                    min: zoom_min,
                    max: zoom_max,
                    limit,
                });
            }
            for (i, p) in polygons.iter().enumerate() {
                p.validate(i)?;
            }
            let mut set = BTreeSet::new();
            for z in zoom_min..=zoom_max {
                for p in polygons {
                    tiles_for_polygon(p, z, &mut set);
                }
            }
            Ok(Coverage {
                tiles: set.into_iter().collect(),
            })
        }
    }
}

/// Number of tiles a world selection covers: `sum of 4^z`. Saturates at `u64::MAX`.
pub fn world_tile_count(zoom_min: u8, zoom_max: u8) -> u64 {
    (zoom_min..=zoom_max)
        .map(|z| 1u64.checked_shl(2 * z as u32).unwrap_or(u64::MAX))
        .fold(0u64, |acc, n| acc.saturating_add(n))
}

fn world(zoom_min: u8, zoom_max: u8) -> Coverage {
    let mut tiles = Vec::with_capacity(world_tile_count(zoom_min, zoom_max) as usize);
    for z in zoom_min..=zoom_max {
        let n = grid_size(z);
        for x in 0..n {
            for y in 0..n {
                tiles.extend(TileCoordinate::new(z, x, y));
            }
        }
    }
    Coverage { tiles }
}

/// Insert every tile at `zoom` whose footprint intersects `polygon`.
fn tiles_for_polygon(polygon: &Polygon, zoom: u8, out: &mut BTreeSet<TileCoordinate>) {
    let ring: Vec<Pt> = polygon
        .vertices()
        .iter()
        .map(|p| project(*p, zoom))
        .collect();

    let (min_x, max_x, min_y, max_y) = ring.iter().fold(
        (f64::MAX, f64::MIN, f64::MAX, f64::MIN),
        |(a, b, c, d), &(x, y)| (a.min(x), b.max(x), c.min(y), d.max(y)),
    );
    let (x_lo, x_hi) = (clamp_index(min_x, zoom), clamp_index(max_x, zoom));
    let (y_lo, y_hi) = (clamp_index(min_y, zoom), clamp_index(max_y, zoom));

    let diag2 = (max_x - min_x).powi(2) + (max_y - min_y).powi(2);
    let area = ring_area(&ring);
    if area <= 1e-9 * diag2 || area < AREA_EPS {
        degenerate_tiles(&ring, zoom, out);
        return;
    }

    for x in x_lo..=x_hi {
        for y in y_lo..=y_hi {
            let (fx, fy) = (x as f64, y as f64);
            if clipped_area(&ring, fx, fy, fx + 1.0, fy + 1.0) > AREA_EPS {
                out.extend(TileCoordinate::new(zoom, x, y));
            }
        }
    }
}

/// Zero-area selections (a point, a line, a collapsed ring) still select the
/// tiles containing their vertices and the tiles their edges run through.
/// Edges lying on a tile boundary are attributed to the tile east/south of it.
fn degenerate_tiles(ring: &[Pt], zoom: u8, out: &mut BTreeSet<TileCoordinate>) {
    let n = grid_size(zoom) as f64;
    for &(x, y) in ring {
        out.extend(TileCoordinate::new(
            zoom,
            clamp_index(x, zoom),
            clamp_index(y, zoom),
        ));
    }
    if ring.len() < 2 {
        return;
    }
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        if a == b {
            continue;
        }
        let (x_lo, x_hi) = (clamp_index(a.0.min(b.0), zoom), clamp_index(a.0.max(b.0), zoom));
        let (y_lo, y_hi) = (clamp_index(a.1.min(b.1), zoom), clamp_index(a.1.max(b.1), zoom));
        for x in x_lo..=x_hi {
            for y in y_lo..=y_hi {
                let (fx, fy) = (x as f64, y as f64);
                let Some((t0, t1)) = segment_clip(a, b, fx, fy, fx + 1.0, fy + 1.0) else {
                    continue;
                };
                let t = (t0 + t1) / 2.0;
                let mx = a.0 + t * (b.0 - a.0);
                let my = a.1 + t * (b.1 - a.1);
                let in_x = mx < fx + 1.0 || fx + 1.0 >= n;
                let in_y = my < fy + 1.0 || fy + 1.0 >= n;
                if in_x && in_y {
                    out.extend(TileCoordinate::new(zoom, x, y));
                }
            }
        }
    }
}
