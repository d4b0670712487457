//! `tiledl run` – compute coverage, download and convert, report progress.

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tiledl_core::convert::{FormatSet, OutputFormat};
use tiledl_core::coverage::Selection;
use tiledl_core::progress::{ProgressSnapshot, RunState};
use tiledl_core::{Engine, RunRequest};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub struct RunArgs {
    pub provider: String,
    pub selection: Selection,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub formats: Vec<OutputFormat>,
    pub output: Option<PathBuf>,
    pub json: bool,
}

pub async fn run_tiles(engine: &Engine, args: RunArgs) -> Result<()> {
    let request = RunRequest {
        selection: args.selection,
        zoom_min: args.min_zoom,
        zoom_max: args.max_zoom,
        provider: args.provider,
        formats: FormatSet::new(args.formats),
        output_dir: args.output,
    };
    let formats = request.formats.to_string();
    let handle = engine.start_run(request)?;
    let id = handle.id();
    tracing::info!(run = id, total = handle.total(), formats = %formats, "run started");
    eprintln!("run {}: {} tile(s), formats {}", id, handle.total(), formats);

    let mut rx = handle.subscribe();
    let printer = tokio::spawn(async move {
        let mut last_print: Option<tokio::time::Instant> = None;
        while rx.changed().await.is_ok() {
            let snap = rx.borrow_and_update().clone();
            let now = tokio::time::Instant::now();
            let due = last_print.map_or(true, |t| now.duration_since(t) >= PROGRESS_INTERVAL);
            if due || snap.state.is_terminal() {
                eprintln!("{}", progress_line(&snap));
                last_print = Some(now);
            }
            if snap.state.is_terminal() {
                break;
            }
        }
    });

    let control = Arc::clone(engine.control());
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupted, cancelling run {}", id);
            control.cancel(id);
        }
    });

    let snap = handle.wait().await;
    interrupt.abort();
    let _ = printer.await;
    if let Err(e) = engine.forget(id) {
        tracing::debug!(run = id, "forget run: {}", e);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snap)?);
    } else {
        println!("{}", summary(&snap));
    }

    match snap.state {
        RunState::Completed | RunState::CompletedWithFailures => Ok(()),
        RunState::Cancelled => bail!("run {} cancelled after {} of {} tile(s)", id, snap.completed, snap.total),
        RunState::Failed | RunState::Running => bail!("run {} failed", id),
    }
}

fn progress_line(snap: &ProgressSnapshot) -> String {
    let eta = snap
        .eta
        .map(|d| format!("{:.0}s", d.as_secs_f64()))
        .unwrap_or_else(|| "?".to_string());
    format!(
        "  {} / {} tiles ({:.1}%)  {} failed  {} cached  {:.2} MiB  ETA {}",
        snap.completed,
        snap.total,
        snap.fraction() * 100.0,
        snap.failed,
        snap.cache_hits,
        snap.bytes_transferred as f64 / 1_048_576.0,
        eta
    )
}

fn summary(snap: &ProgressSnapshot) -> String {
    let mut out = format!(
        "{}: {} of {} tile(s) done in {:.1}s ({} downloaded, {} from cache, {} file(s) written)",
        snap.state,
        snap.completed,
        snap.total,
        snap.elapsed.as_secs_f64(),
        snap.downloaded,
        snap.cache_hits,
        snap.written
    );
    for (reason, count) in &snap.failures_by_reason {
        out.push_str(&format!("\n  failed ({}): {}", reason, count));
    }
    out
}
