//! Progress reporting for runs (tile counts, throughput, ETA, terminal state).
//!
//! Workers never touch shared counters: they send `TileEvent`s over an
//! unbounded channel to a single aggregator task that owns the
//! `ProgressReporter` and publishes `ProgressSnapshot`s on a watch channel.

mod aggregator;
mod reporter;

pub(crate) use aggregator::run_aggregator;
pub use reporter::ProgressReporter;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::convert::OutputFormat;
use crate::coverage::TileCoordinate;
use crate::error::FailureReason;

/// Lifecycle of a run. Everything except `Running` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Completed,
    CompletedWithFailures,
    Cancelled,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunState::Running)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::CompletedWithFailures => "completed_with_failures",
            RunState::Cancelled => "cancelled",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What a worker reports about one tile.
#[derive(Debug, Clone)]
pub enum TileEvent {
    /// Served from the tile cache; no network request.
    CacheHit { coord: TileCoordinate },
    /// Fetched from the provider and stored in the cache.
    Downloaded {
        coord: TileCoordinate,
        bytes: u64,
        attempts: u32,
    },
    /// Palette conversion produced derived artifacts.
    Converted { coord: TileCoordinate },
    /// One artifact landed in the output directory.
    Written {
        coord: TileCoordinate,
        format: OutputFormat,
        path: PathBuf,
    },
    /// All requested artifacts for the tile are on disk.
    Completed { coord: TileCoordinate },
    Failed {
        coord: TileCoordinate,
        reason: FailureReason,
        message: String,
    },
}

/// Point-in-time view of a run. Counts are monotonic within the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub state: RunState,
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    pub cache_hits: u64,
    pub downloaded: u64,
    pub converted: u64,
    /// Artifact files written (one tile can produce several).
    pub written: u64,
    pub bytes_transferred: u64,
    pub failures_by_reason: BTreeMap<FailureReason, u64>,
    pub elapsed: Duration,
    /// `None` until throughput can be estimated.
    pub eta: Option<Duration>,
}

impl ProgressSnapshot {
    /// Snapshot of a run that has not processed anything yet.
    pub fn initial(total: u64) -> Self {
        Self {
            state: RunState::Running,
            total,
            completed: 0,
            failed: 0,
            cache_hits: 0,
            downloaded: 0,
            converted: 0,
            written: 0,
            bytes_transferred: 0,
            failures_by_reason: BTreeMap::new(),
            elapsed: Duration::ZERO,
            eta: None,
        }
    }

    /// Tiles that reached a final outcome (success or failure).
    pub fn finished(&self) -> u64 {
        self.completed + self.failed
    }

    /// Fraction finished in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.finished() as f64 / self.total as f64).min(1.0)
    }
}
