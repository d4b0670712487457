//! Front-end facing engine API.
//!
//! A front end (the `tiledl` CLI, or any GUI) talks to the engine only
//! through this module: start a run, watch or poll its progress, cancel it,
//! and inspect or clear the tile cache.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cache::{CacheScope, ProviderUsage, TileCache};
use crate::config::TileDlConfig;
use crate::control::{RunControl, RunId};
use crate::convert::FormatSet;
use crate::coverage::{self, Selection, TileCoordinate, ZoomLimits};
use crate::error::EngineError;
use crate::fetch::{CurlFetcher, FetchOptions, TileFetcher};
use crate::output::OutputWriter;
use crate::progress::{ProgressSnapshot, RunState};
use crate::provider::{Provider, ProviderRegistry};
use crate::retry::RetryPolicy;
use crate::scheduler::{build_jobs, drive_run, PipelineContext};

/// Engine settings, resolved from `TileDlConfig` at the application edge.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub cache_root: PathBuf,
    pub output_root: PathBuf,
    pub fetch_workers: usize,
    pub convert_workers: usize,
    pub retry: RetryPolicy,
    pub limits: ZoomLimits,
    pub fetch: FetchOptions,
}

impl EngineOptions {
    /// Resolve paths (creating XDG defaults) and copy tunables from `cfg`.
    pub fn from_config(cfg: &TileDlConfig) -> anyhow::Result<Self> {
        cfg.validate()?;
        Ok(Self {
            cache_root: cfg.cache_root()?,
            output_root: cfg.output_root()?,
            fetch_workers: cfg.fetch_workers.max(1),
            convert_workers: cfg.convert_workers.max(1),
            retry: cfg.retry_policy(),
            limits: ZoomLimits {
                max_zoom: cfg.max_zoom,
                world_max_zoom: cfg.world_max_zoom,
            },
            fetch: FetchOptions::from_config(cfg),
        })
    }
}

/// Everything a run needs from the front end.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub selection: Selection,
    pub zoom_min: u8,
    pub zoom_max: u8,
    pub provider: String,
    pub formats: FormatSet,
    /// None = the engine's default output root.
    pub output_dir: Option<PathBuf>,
}

/// Handle to a started run.
pub struct RunHandle {
    id: RunId,
    total: u64,
    cancel: Arc<AtomicBool>,
    snapshots: watch::Receiver<ProgressSnapshot>,
    task: JoinHandle<ProgressSnapshot>,
}

impl RunHandle {
    pub fn id(&self) -> RunId {
        self.id
    }

    /// Number of tiles in the run's coverage.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Latest published progress.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that is notified whenever progress changes.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.snapshots.clone()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Wait for the run to reach a terminal state and return the final snapshot.
    pub async fn wait(self) -> ProgressSnapshot {
        match self.task.await {
            Ok(snap) => snap,
            Err(e) => {
                tracing::error!(run = self.id, "run task join: {}", e);
                let mut snap = self.snapshots.borrow().clone();
                snap.state = RunState::Failed;
                snap
            }
        }
    }
}

pub struct Engine {
    opts: EngineOptions,
    providers: ProviderRegistry,
    cache: Arc<TileCache>,
    fetcher: Arc<dyn TileFetcher>,
    control: Arc<RunControl>,
    runs: Mutex<HashMap<RunId, watch::Receiver<ProgressSnapshot>>>,
}

impl Engine {
    /// Engine fetching over HTTP with libcurl.
    pub fn new(opts: EngineOptions, providers: ProviderRegistry) -> Result<Self, EngineError> {
        let fetcher = Arc::new(CurlFetcher::new(opts.fetch.clone()));
        Self::with_fetcher(opts, providers, fetcher)
    }

    /// Engine with a custom fetcher (tests, alternative transports).
    pub fn with_fetcher(
        opts: EngineOptions,
        providers: ProviderRegistry,
        fetcher: Arc<dyn TileFetcher>,
    ) -> Result<Self, EngineError> {
        let cache = Arc::new(TileCache::open(&opts.cache_root)?);
        Ok(Self {
            opts,
            providers,
            cache,
            fetcher,
            control: Arc::new(RunControl::new()),
            runs: Mutex::new(HashMap::new()),
        })
    }

    pub fn providers(&self) -> Vec<&Provider> {
        self.providers.iter().collect()
    }

    pub fn cache(&self) -> &Arc<TileCache> {
        &self.cache
    }

    pub fn control(&self) -> &Arc<RunControl> {
        &self.control
    }

    /// Validate the request, compute coverage, and start the pools.
    ///
    /// Coverage and provider errors are returned before any network activity.
    /// Must be called from within a Tokio runtime.
    pub fn start_run(&self, req: RunRequest) -> Result<RunHandle, EngineError> {
        let provider = self.providers.get(&req.provider)?.clone();
        let coverage = coverage::compute(&req.selection, req.zoom_min, req.zoom_max, self.opts.limits)?;
        let output_root = req.output_dir.unwrap_or_else(|| self.opts.output_root.clone());
        std::fs::create_dir_all(&output_root).map_err(|source| EngineError::Output {
            path: output_root.clone(),
            source,
        })?;
        let output = OutputWriter::new(output_root);
        match output.sweep_stale(provider.id()) {
            Ok(0) => {}
            Ok(n) => tracing::info!(provider = provider.id(), removed = n, "removed stale temp files from output"),
            Err(e) => tracing::warn!(provider = provider.id(), "stale temp sweep failed: {}", e),
        }

        let total = coverage.total();
        let jobs = build_jobs(provider.id(), coverage.into_tiles(), req.formats);
        let (id, cancel) = self.control.register();
        let (snap_tx, snap_rx) = watch::channel(ProgressSnapshot::initial(total));
        let ctx = PipelineContext {
            provider,
            cache: Arc::clone(&self.cache),
            output,
            fetcher: Arc::clone(&self.fetcher),
            retry: self.opts.retry,
            fetch_workers: self.opts.fetch_workers,
            convert_workers: self.opts.convert_workers,
            cancel: Arc::clone(&cancel),
        };
        let task = tokio::spawn(drive_run(id, ctx, jobs, snap_tx, Arc::clone(&self.control)));
        self.runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, snap_rx.clone());
        Ok(RunHandle {
            id,
            total,
            cancel,
            snapshots: snap_rx,
            task,
        })
    }

    /// Request cancellation of a run. Cancelling a finished run is a no-op.
    pub fn cancel(&self, id: RunId) -> Result<(), EngineError> {
        if self.control.cancel(id) {
            return Ok(());
        }
        if self.runs.lock().unwrap_or_else(|e| e.into_inner()).contains_key(&id) {
            return Ok(());
        }
        Err(EngineError::UnknownRun(id))
    }

    /// Latest snapshot of any run started by this engine, finished or not.
    pub fn query_progress(&self, id: RunId) -> Result<ProgressSnapshot, EngineError> {
        self.runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .map(|rx| rx.borrow().clone())
            .ok_or(EngineError::UnknownRun(id))
    }

    /// Drop the record of a finished run and return its final snapshot.
    /// Long-lived front ends call this once they no longer need to query it.
    pub fn forget(&self, id: RunId) -> Result<ProgressSnapshot, EngineError> {
        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        let snap = runs
            .get(&id)
            .map(|rx| rx.borrow().clone())
            .ok_or(EngineError::UnknownRun(id))?;
        if !snap.state.is_terminal() {
            return Err(EngineError::RunActive(id));
        }
        runs.remove(&id);
        Ok(snap)
    }

    pub fn cache_usage(&self) -> Result<Vec<ProviderUsage>, EngineError> {
        Ok(self.cache.usage()?)
    }

    /// Clear the cache for one provider or all. Returns bytes freed.
    pub fn clear_cache(&self, scope: &CacheScope) -> Result<u64, EngineError> {
        Ok(self.cache.clear(scope)?)
    }

    pub fn list_cached_tiles(&self, provider: &str) -> Result<Vec<TileCoordinate>, EngineError> {
        Ok(self.cache.list_tiles(provider)?)
    }
}
