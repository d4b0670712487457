//! Drive one run: blocking pipeline in `spawn_blocking`, aggregator as a task,
//! terminal state once both are done.

use std::sync::atomic::Ordering;
use tokio::sync::{mpsc, watch};

use crate::control::{RunControl, RunId};
use crate::progress::{run_aggregator, ProgressReporter, ProgressSnapshot, RunState};

use super::job::TileJob;
use super::pipeline::{run_pipeline, PipelineContext};

/// Build the event channel, run the pools, and publish the final snapshot.
/// Returns the final snapshot; the run is unregistered from `control` before
/// returning.
pub async fn drive_run(
    id: RunId,
    ctx: PipelineContext,
    jobs: Vec<TileJob>,
    snapshots: watch::Sender<ProgressSnapshot>,
    control: std::sync::Arc<RunControl>,
) -> ProgressSnapshot {
    let total = jobs.len() as u64;
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let cancel = std::sync::Arc::clone(&ctx.cancel);

    let aggregator = tokio::spawn(run_aggregator(
        events_rx,
        ProgressReporter::new(total),
        snapshots,
    ));
    tracing::info!(run = id, provider = ctx.provider.id(), tiles = total, "run started");

    let pipeline = tokio::task::spawn_blocking(move || run_pipeline(ctx, jobs, events_tx)).await;
    let pipeline_ok = match pipeline {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::error!(run = id, "pipeline failed: {:#}", e);
            false
        }
        Err(e) => {
            tracing::error!(run = id, "pipeline task join: {}", e);
            false
        }
    };

    let final_snapshot = match aggregator.await {
        Ok((mut reporter, snapshots)) => {
            let state = if pipeline_ok {
                reporter.outcome(cancel.load(Ordering::Relaxed))
            } else {
                RunState::Failed
            };
            reporter.finish(state);
            let snap = reporter.snapshot();
            snapshots.send_replace(snap.clone());
            snap
        }
        Err(e) => {
            tracing::error!(run = id, "progress aggregator join: {}", e);
            let mut snap = ProgressSnapshot::initial(total);
            snap.state = RunState::Failed;
            snap
        }
    };
    control.unregister(id);
    tracing::info!(
        run = id,
        state = %final_snapshot.state,
        completed = final_snapshot.completed,
        failed = final_snapshot.failed,
        cache_hits = final_snapshot.cache_hits,
        downloaded = final_snapshot.downloaded,
        "run finished"
    );
    final_snapshot
}
