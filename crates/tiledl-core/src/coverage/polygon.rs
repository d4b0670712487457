//! Selection polygons and the planar geometry used to intersect them with tiles.
//!
//! All tests run in projected tile space (fractional tile indices at one
//! zoom), where a tile is the unit square `[x, x+1] x [y, y+1]` and polygon
//! edges are straight lines, as they are on a Web Mercator map.

use serde::{Deserialize, Serialize};

use crate::error::CoverageError;

/// A longitude/latitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// A selection ring as an ordered vertex sequence. The closing edge from the
/// last vertex back to the first is implied; a repeated closing vertex is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    vertices: Vec<GeoPoint>,
}

impl Polygon {
    pub fn new(vertices: Vec<GeoPoint>) -> Self {
        Self { vertices }
    }

    /// Axis-aligned rectangle from west/south/east/north degrees.
    pub fn from_bbox(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self::new(vec![
            GeoPoint::new(west, south),
            GeoPoint::new(east, south),
            GeoPoint::new(east, north),
            GeoPoint::new(west, north),
        ])
    }

    pub fn vertices(&self) -> &[GeoPoint] {
        &self.vertices
    }

    pub(crate) fn validate(&self, index: usize) -> Result<(), CoverageError> {
        if self.vertices.is_empty() {
            return Err(CoverageError::InvalidPolygon {
                index,
                reason: "no vertices".into(),
            });
        }
        if let Some(p) = self
            .vertices
            .iter()
            .find(|p| !p.lon.is_finite() || !p.lat.is_finite())
        {
            return Err(CoverageError::InvalidPolygon {
                index,
                reason: format!("non-finite vertex ({}, {})", p.lon, p.lat),
            });
        }
        Ok(())
    }
}

pub(crate) type Pt = (f64, f64);

/// Absolute shoelace area of a ring.
pub(crate) fn ring_area(ring: &[Pt]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for i in 0..ring.len() {
        let (x0, y0) = ring[i];
        let (x1, y1) = ring[(i + 1) % ring.len()];
        twice += x0 * y1 - x1 * y0;
    }
    (twice / 2.0).abs()
}

/// Area of `ring` inside the axis-aligned box, via Sutherland-Hodgman
/// clipping. The box is convex, so concave subjects clip correctly (the result
/// may contain zero-width bridges, which contribute no area).
pub(crate) fn clipped_area(ring: &[Pt], x0: f64, y0: f64, x1: f64, y1: f64) -> f64 {
    let mut out: Vec<Pt> = ring.to_vec();
    out = clip_edge(&out, |p| p.0 >= x0, |a, b| lerp_x(a, b, x0));
    out = clip_edge(&out, |p| p.0 <= x1, |a, b| lerp_x(a, b, x1));
    out = clip_edge(&out, |p| p.1 >= y0, |a, b| lerp_y(a, b, y0));
    out = clip_edge(&out, |p| p.1 <= y1, |a, b| lerp_y(a, b, y1));
    ring_area(&out)
}

fn clip_edge<I, X>(input: &[Pt], inside: I, intersect: X) -> Vec<Pt>
where
    I: Fn(Pt) -> bool,
    X: Fn(Pt, Pt) -> Pt,
{
    let mut output = Vec::with_capacity(input.len() + 4);
    if input.is_empty() {
        return output;
    }
    let mut prev = input[input.len() - 1];
    for &cur in input {
        match (inside(prev), inside(cur)) {
            (true, true) => output.push(cur),
            (true, false) => output.push(intersect(prev, cur)),
            (false, true) => {
                output.push(intersect(prev, cur));
                output.push(cur);
            }
            (false, false) => {}
        }
        prev = cur;
    }
    output
}

fn lerp_x(a: Pt, b: Pt, x: f64) -> Pt {
    let t = (x - a.0) / (b.0 - a.0);
    (x, a.1 + t * (b.1 - a.1))
}

fn lerp_y(a: Pt, b: Pt, y: f64) -> Pt {
    let t = (y - a.1) / (b.1 - a.1);
    (a.0 + t * (b.0 - a.0), y)
}

/// Liang-Barsky: the parameter interval of segment `a -> b` inside the closed
/// box, or `None` when it misses.
pub(crate) fn segment_clip(a: Pt, b: Pt, x0: f64, y0: f64, x1: f64, y1: f64) -> Option<(f64, f64)> {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    for (p, q) in [
        (-dx, a.0 - x0),
        (dx, x1 - a.0),
        (-dy, a.1 - y0),
        (dy, y1 - a.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((t0, t1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Pt> {
        vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)]
    }

    #[test]
    fn shoelace_area_of_unit_square() {
        assert!((ring_area(&square(0.0, 0.0, 1.0, 1.0)) - 1.0).abs() < 1e-12);
        assert_eq!(ring_area(&[(0.0, 0.0), (1.0, 1.0)]), 0.0);
    }

    #[test]
    fn clipping_partial_overlap() {
        let ring = square(0.5, 0.5, 1.5, 1.5);
        let a = clipped_area(&ring, 0.0, 0.0, 1.0, 1.0);
        assert!((a - 0.25).abs() < 1e-12);
    }

    #[test]
    fn clipping_box_inside_polygon() {
        let ring = square(-5.0, -5.0, 5.0, 5.0);
        let a = clipped_area(&ring, 1.0, 1.0, 2.0, 2.0);
        assert!((a - 1.0).abs() < 1e-12);
    }

    #[test]
    fn touching_edge_has_no_area() {
        let ring = square(1.0, 0.0, 2.0, 1.0);
        assert!(clipped_area(&ring, 0.0, 0.0, 1.0, 1.0) < 1e-12);
    }

    #[test]
    fn concave_polygon_notch_excluded() {
        // U shape: the notch covers x in [1,2], y in [0,2].
        let ring = vec![
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 2.0),
            (2.0, 2.0),
            (2.0, 0.0),
            (3.0, 0.0),
            (3.0, 3.0),
            (0.0, 3.0),
        ];
        assert!(clipped_area(&ring, 1.0, 0.0, 2.0, 1.0) < 1e-12);
        assert!((clipped_area(&ring, 1.0, 2.0, 2.0, 3.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn segment_clip_hits_and_misses() {
        let hit = segment_clip((-1.0, 0.5), (2.0, 0.5), 0.0, 0.0, 1.0, 1.0).unwrap();
        assert!((hit.0 - 1.0 / 3.0).abs() < 1e-12);
        assert!((hit.1 - 2.0 / 3.0).abs() < 1e-12);
        assert!(segment_clip((-1.0, 2.0), (2.0, 2.0), 0.0, 0.0, 1.0, 1.0).is_none());
    }

    #[test]
    fn validate_rejects_empty_and_nan() {
        assert!(Polygon::new(vec![]).validate(0).is_err());
        let p = Polygon::new(vec![GeoPoint::new(f64::NAN, 1.0)]);
        assert!(matches!(
            p.validate(2),
            Err(CoverageError::InvalidPolygon { index: 2, .. })
        ));
        assert!(Polygon::from_bbox(0.0, 0.0, 1.0, 1.0).validate(0).is_ok());
    }
}
