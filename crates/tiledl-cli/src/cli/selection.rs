//! Turn `--polygon` files, `--bbox` values and `--world` into a [`Selection`].
//!
//! Polygon files hold `[lat, lng]` pairs, either one ring or a list of rings:
//!
//! ```json
//! [[50.6, 5.9], [50.6, 6.3], [50.9, 6.3], [50.9, 5.9]]
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tiledl_core::coverage::{GeoPoint, Polygon, Selection};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PolygonFile {
    Many(Vec<Vec<[f64; 2]>>),
    One(Vec<[f64; 2]>),
}

fn ring(pairs: Vec<[f64; 2]>) -> Polygon {
    Polygon::new(
        pairs
            .into_iter()
            .map(|[lat, lng]| GeoPoint::new(lng, lat))
            .collect(),
    )
}

pub fn parse_polygons(json: &str) -> Result<Vec<Polygon>> {
    let parsed: PolygonFile =
        serde_json::from_str(json).context("expected [[lat, lng], ...] or a list of such rings")?;
    Ok(match parsed {
        PolygonFile::Many(rings) => rings.into_iter().map(ring).collect(),
        PolygonFile::One(pairs) => vec![ring(pairs)],
    })
}

fn load_polygons(path: &Path) -> Result<Vec<Polygon>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading polygon file {}", path.display()))?;
    parse_polygons(&data).with_context(|| format!("parsing polygon file {}", path.display()))
}

/// `west,south,east,north` in degrees.
pub fn parse_bbox(s: &str) -> Result<Polygon> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .with_context(|| format!("invalid bbox {:?}", s))?;
    let [west, south, east, north] = parts[..] else {
        bail!("bbox {:?} must have four values: west,south,east,north", s);
    };
    if west >= east || south >= north {
        bail!("bbox {:?} is empty: expected west < east and south < north", s);
    }
    Ok(Polygon::from_bbox(west, south, east, north))
}

pub fn build(polygon_files: &[PathBuf], bboxes: &[String], world: bool) -> Result<Selection> {
    if world {
        return Ok(Selection::World);
    }
    let mut polygons = Vec::new();
    for path in polygon_files {
        polygons.extend(load_polygons(path)?);
    }
    for b in bboxes {
        polygons.push(parse_bbox(b)?);
    }
    Ok(Selection::Polygons(polygons))
}
