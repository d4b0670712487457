//! Error taxonomy shared by the engine.
//!
//! Run-level errors (`CoverageError`, `EngineError`) abort a run before it
//! starts. Tile-level errors (`TileError`) are recorded against one tile and
//! counted in the progress snapshot; they never abort the run.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::fetch::FetchError;

/// Invalid or empty coverage selection. Fatal to the run before any fetch.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CoverageError {
    #[error("no coverage selected: provide at least one polygon or the world flag")]
    NoCoverage,
    #[error("invalid zoom range {min}..={max} (must satisfy min <= max <= {limit})")]
    InvalidZoomRange { min: u8, max: u8, limit: u8 },
    #[error("polygon {index} is invalid: {reason}")]
    InvalidPolygon { index: usize, reason: String },
}

/// Decoding or re-encoding a tile image failed. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("undecodable source image: {0}")]
    Decode(String),
    #[error("unsupported source colour depth: {0}")]
    UnsupportedColorDepth(String),
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Tile cache failures (disk or permission problems).
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("refusing to cache an empty tile")]
    EmptyTile,
    #[error("cache I/O at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Provider descriptor and URL template problems.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    Unknown(String),
    #[error("provider {provider}: {reason}")]
    InvalidTemplate { provider: String, reason: String },
    #[error("read provider descriptor {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse provider descriptor: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Terminal failure of a single tile job.
#[derive(Debug, thiserror::Error)]
pub enum TileError {
    /// Transient failures persisted past the attempt ceiling.
    #[error("fetch failed after {attempts} attempts: {source}")]
    FetchFailed {
        attempts: u32,
        #[source]
        source: FetchError,
    },
    #[error("permanent fetch error: {0}")]
    PermanentFetch(#[source] FetchError),
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("output write failed at {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Provider(#[from] ProviderError),
    #[error("cancelled")]
    Cancelled,
}

impl TileError {
    pub fn reason(&self) -> FailureReason {
        match self {
            TileError::FetchFailed { .. } => FailureReason::FetchFailed,
            TileError::PermanentFetch(_) | TileError::Provider(_) => FailureReason::PermanentFetch,
            TileError::Conversion(_) => FailureReason::Conversion,
            TileError::Cache(_) | TileError::Output { .. } => FailureReason::Io,
            TileError::Cancelled => FailureReason::Cancelled,
        }
    }
}

/// Reason code recorded in the progress snapshot for each failed tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    FetchFailed,
    PermanentFetch,
    Conversion,
    Io,
    Cancelled,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::FetchFailed => "fetch_failed",
            FailureReason::PermanentFetch => "permanent_fetch",
            FailureReason::Conversion => "conversion",
            FailureReason::Io => "io",
            FailureReason::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Errors returned by the front-end facing engine API.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Coverage(#[from] CoverageError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("output directory {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown run id {0}")]
    UnknownRun(u64),
    #[error("run {0} is still active")]
    RunActive(u64),
}
