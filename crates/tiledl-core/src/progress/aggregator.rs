//! Background task that folds worker events into snapshots.

use std::time::Duration;
use tokio::sync::{mpsc, watch};

use super::{ProgressReporter, ProgressSnapshot, TileEvent};

const TICK: Duration = Duration::from_millis(500);

/// Consume events until every sender is dropped, publishing a snapshot after
/// each event and on every tick so elapsed time and ETA stay fresh. Hands the
/// reporter and the watch sender back so the caller can publish the terminal
/// state. Spawn this with tokio::spawn.
pub(crate) async fn run_aggregator(
    mut events: mpsc::UnboundedReceiver<TileEvent>,
    mut reporter: ProgressReporter,
    snapshots: watch::Sender<ProgressSnapshot>,
) -> (ProgressReporter, watch::Sender<ProgressSnapshot>) {
    let mut tick = tokio::time::interval(TICK);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            ev = events.recv() => match ev {
                Some(ev) => {
                    if let TileEvent::Failed { coord, reason, message } = &ev {
                        tracing::debug!(tile = %coord, %reason, "tile failed: {}", message);
                    }
                    reporter.on_event(&ev);
                    snapshots.send_replace(reporter.snapshot());
                }
                None => break,
            },
            _ = tick.tick() => {
                snapshots.send_replace(reporter.snapshot());
            }
        }
    }
    (reporter, snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::TileCoordinate;
    use crate::progress::RunState;

    #[tokio::test]
    async fn publishes_events_and_returns_on_close() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (snap_tx, mut snap_rx) = watch::channel(ProgressSnapshot::initial(2));
        let task = tokio::spawn(run_aggregator(rx, ProgressReporter::new(2), snap_tx));

        let coord = TileCoordinate::new(1, 0, 0).unwrap();
        tx.send(TileEvent::CacheHit { coord }).unwrap();
        tx.send(TileEvent::Completed { coord }).unwrap();
        snap_rx
            .wait_for(|s| s.completed == 1)
            .await
            .unwrap();
        drop(tx);

        let (mut reporter, snap_tx) = task.await.unwrap();
        reporter.finish(reporter.outcome(false));
        snap_tx.send_replace(reporter.snapshot());
        let snap = snap_rx.borrow().clone();
        assert_eq!(snap.state, RunState::Completed);
        assert_eq!(snap.cache_hits, 1);
    }
}
