//! Blocking two-stage pipeline: fetch pool → bounded channel → convert pool.
//!
//! The fetch pool is I/O bound and the convert pool CPU bound, so they are
//! sized independently. Tiles reach the convert pool in completion order.

use anyhow::Result;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;

use crate::cache::TileCache;
use crate::convert::{convert, OutputFormat};
use crate::error::TileError;
use crate::fetch::{check_tile_body, TileFetcher};
use crate::output::OutputWriter;
use crate::progress::TileEvent;
use crate::provider::Provider;
use crate::retry::{run_with_retry, RetryPolicy};

use super::job::TileJob;

/// Fetched tiles waiting for conversion, per convert worker.
const HANDOFF_PER_CONVERTER: usize = 4;

/// Everything the pool threads share for one run.
pub struct PipelineContext {
    pub provider: Provider,
    pub cache: Arc<TileCache>,
    pub output: OutputWriter,
    pub fetcher: Arc<dyn TileFetcher>,
    pub retry: RetryPolicy,
    pub fetch_workers: usize,
    pub convert_workers: usize,
    pub cancel: Arc<AtomicBool>,
}

struct Shared {
    provider: Provider,
    cache: Arc<TileCache>,
    output: OutputWriter,
    fetcher: Arc<dyn TileFetcher>,
    retry: RetryPolicy,
    cancel: Arc<AtomicBool>,
    events: UnboundedSender<TileEvent>,
}

impl Shared {
    fn emit(&self, event: TileEvent) {
        let _ = self.events.send(event);
    }

    fn fail(&self, job: &TileJob, err: TileError) {
        if matches!(err, TileError::Cancelled) {
            return;
        }
        self.emit(TileEvent::Failed {
            coord: job.coord,
            reason: err.reason(),
            message: err.to_string(),
        });
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Cache first; on miss fetch with retry and store before forwarding.
    fn acquire(&self, job: &TileJob) -> Result<Vec<u8>, TileError> {
        match self.cache.get(&job.provider, &job.coord) {
            Ok(Some(entry)) if check_tile_body(&entry.bytes).is_ok() => {
                self.emit(TileEvent::CacheHit { coord: job.coord });
                return Ok(entry.bytes);
            }
            Ok(Some(_)) => {
                tracing::warn!(tile = %job.coord, "cached tile is not an image, refetching");
                if let Err(e) = self.cache.evict(&job.provider, &[job.coord]) {
                    tracing::warn!(tile = %job.coord, "evicting bad cache entry failed: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(tile = %job.coord, "cache read failed, refetching: {}", e),
        }
        let url = self.provider.tile_url(&job.coord);
        // Validate before caching so a bad body is never served from cache.
        let (bytes, attempts) = run_with_retry(&self.retry, &self.cancel, || {
            let body = self.fetcher.fetch(&url, &self.cancel)?;
            check_tile_body(&body)?;
            Ok(body)
        })?;
        self.cache.put(&job.provider, &job.coord, &bytes)?;
        self.emit(TileEvent::Downloaded {
            coord: job.coord,
            bytes: bytes.len() as u64,
            attempts,
        });
        Ok(bytes)
    }

    /// Convert and write every requested artifact for one tile.
    fn finish(&self, job: &TileJob, raw: &[u8]) -> Result<(), TileError> {
        let results = convert(job.coord, raw, &job.formats)?;
        if results.iter().any(|r| r.format != OutputFormat::Raw) {
            self.emit(TileEvent::Converted { coord: job.coord });
        }
        for result in results {
            if self.cancelled() {
                return Err(TileError::Cancelled);
            }
            let path = self.output.write(&job.provider, &job.coord, result.format, &result.bytes)?;
            self.emit(TileEvent::Written {
                coord: job.coord,
                format: result.format,
                path,
            });
        }
        self.emit(TileEvent::Completed { coord: job.coord });
        Ok(())
    }
}

fn fetch_worker(shared: &Shared, work: &Mutex<VecDeque<TileJob>>, handoff: &SyncSender<(TileJob, Vec<u8>)>) {
    loop {
        if shared.cancelled() {
            break;
        }
        let job = match work.lock().unwrap_or_else(|e| e.into_inner()).pop_front() {
            Some(j) => j,
            None => break,
        };
        match shared.acquire(&job) {
            Ok(bytes) => {
                if handoff.send((job, bytes)).is_err() {
                    break;
                }
            }
            Err(e) => shared.fail(&job, e),
        }
    }
}

fn convert_worker(shared: &Shared, handoff: &Mutex<Receiver<(TileJob, Vec<u8>)>>) {
    loop {
        let next = handoff.lock().unwrap_or_else(|e| e.into_inner()).recv();
        let Ok((job, raw)) = next else { break };
        // Keep draining after cancel so fetch workers never block on a full channel.
        if shared.cancelled() {
            continue;
        }
        if let Err(e) = shared.finish(&job, &raw) {
            shared.fail(&job, e);
        }
    }
}

/// Run `jobs` to completion (or cancellation) on two bounded thread pools.
/// Per-tile failures are reported as events and never abort the run; an
/// error is returned only if a worker thread panicked.
pub fn run_pipeline(ctx: PipelineContext, jobs: Vec<TileJob>, events: UnboundedSender<TileEvent>) -> Result<()> {
    let count = jobs.len();
    if count == 0 {
        return Ok(());
    }
    let fetch_workers = ctx.fetch_workers.max(1).min(count);
    let convert_workers = ctx.convert_workers.max(1).min(count);
    let shared = Arc::new(Shared {
        provider: ctx.provider,
        cache: ctx.cache,
        output: ctx.output,
        fetcher: ctx.fetcher,
        retry: ctx.retry,
        cancel: ctx.cancel,
        events,
    });
    tracing::debug!(jobs = count, fetch_workers, convert_workers, "starting tile pipeline");

    let work = Arc::new(Mutex::new(jobs.into_iter().collect::<VecDeque<_>>()));
    let (tx, rx) = mpsc::sync_channel(convert_workers * HANDOFF_PER_CONVERTER);
    let rx = Arc::new(Mutex::new(rx));

    let mut converters = Vec::with_capacity(convert_workers);
    for _ in 0..convert_workers {
        let shared = Arc::clone(&shared);
        let rx = Arc::clone(&rx);
        converters.push(std::thread::spawn(move || convert_worker(&shared, &rx)));
    }
    let mut fetchers = Vec::with_capacity(fetch_workers);
    for _ in 0..fetch_workers {
        let shared = Arc::clone(&shared);
        let work = Arc::clone(&work);
        let tx = tx.clone();
        fetchers.push(std::thread::spawn(move || fetch_worker(&shared, &work, &tx)));
    }
    drop(tx);

    let mut panicked = 0usize;
    for h in fetchers.into_iter().chain(converters) {
        if h.join().is_err() {
            panicked += 1;
        }
    }
    if panicked > 0 {
        anyhow::bail!("{} pipeline worker thread(s) panicked", panicked);
    }
    Ok(())
}
