use std::sync::Arc;

use crate::convert::FormatSet;
use crate::coverage::TileCoordinate;

/// One unit of work: fetch (or reuse) one tile and produce its artifacts.
/// Consumed exactly once by the pipeline.
#[derive(Debug, Clone)]
pub struct TileJob {
    pub provider: Arc<str>,
    pub coord: TileCoordinate,
    pub formats: Arc<FormatSet>,
}

/// One job per coordinate, in coverage order.
pub fn build_jobs(provider: &str, coords: Vec<TileCoordinate>, formats: FormatSet) -> Vec<TileJob> {
    let provider: Arc<str> = Arc::from(provider);
    let formats = Arc::new(formats);
    coords
        .into_iter()
        .map(|coord| TileJob {
            provider: Arc::clone(&provider),
            coord,
            formats: Arc::clone(&formats),
        })
        .collect()
}
