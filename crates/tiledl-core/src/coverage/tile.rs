//! Slippy-map tile coordinates and the Web Mercator projection.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

use super::polygon::GeoPoint;

/// Web Mercator latitude limit; the projection is undefined at the poles.
pub const MAX_LAT: f64 = 85.051_128_78;

/// Deepest zoom whose grid (2^z per side) still fits a `u32` index.
pub const MAX_TILE_ZOOM: u8 = 30;

/// One tile in a provider's pyramid. Only valid triples can be constructed:
/// `x, y < 2^zoom`. Ordering is `(zoom, x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileCoordinate {
    zoom: u8,
    x: u32,
    y: u32,
}

/// Geographic bounds of a tile in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl TileCoordinate {
    /// Returns `None` unless `0 <= x, y < 2^zoom` and `zoom <= MAX_TILE_ZOOM`.
    pub fn new(zoom: u8, x: u32, y: u32) -> Option<Self> {
        if zoom > MAX_TILE_ZOOM {
            return None;
        }
        let n = grid_size(zoom);
        if x >= n || y >= n {
            return None;
        }
        Some(Self { zoom, x, y })
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    /// The tile containing `point` at `zoom`. Points on a tile edge belong to
    /// the tile east/south of the edge; the antimeridian and the latitude
    /// limits clamp into the grid.
    pub fn containing(point: GeoPoint, zoom: u8) -> Self {
        let zoom = zoom.min(MAX_TILE_ZOOM);
        let (fx, fy) = project(point, zoom);
        Self {
            zoom,
            x: clamp_index(fx, zoom),
            y: clamp_index(fy, zoom),
        }
    }

    pub fn bounds(&self) -> TileBounds {
        TileBounds {
            west: tile_lon(self.x as f64, self.zoom),
            east: tile_lon(self.x as f64 + 1.0, self.zoom),
            north: tile_lat(self.y as f64, self.zoom),
            south: tile_lat(self.y as f64 + 1.0, self.zoom),
        }
    }
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Tiles per side at `zoom`.
pub fn grid_size(zoom: u8) -> u32 {
    1u32 << zoom.min(MAX_TILE_ZOOM)
}

/// Project a lon/lat point to fractional tile coordinates at `zoom`
/// (x grows east, y grows south; the grid spans `[0, 2^zoom]` on both axes).
pub fn project(point: GeoPoint, zoom: u8) -> (f64, f64) {
    let n = grid_size(zoom) as f64;
    let lon = point.lon.clamp(-180.0, 180.0);
    let lat = point.lat.clamp(-MAX_LAT, MAX_LAT).to_radians();
    let x = (lon + 180.0) / 360.0 * n;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * n;
    (x, y.clamp(0.0, n))
}

/// Floor a fractional tile coordinate into a valid index at `zoom`.
pub(crate) fn clamp_index(v: f64, zoom: u8) -> u32 {
    let max = grid_size(zoom) - 1;
    if v <= 0.0 {
        0
    } else {
        (v.floor() as u64).min(max as u64) as u32
    }
}

fn tile_lon(x: f64, zoom: u8) -> f64 {
    x / grid_size(zoom) as f64 * 360.0 - 180.0
}

fn tile_lat(y: f64, zoom: u8) -> f64 {
    let n = grid_size(zoom) as f64;
    (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees()
}
