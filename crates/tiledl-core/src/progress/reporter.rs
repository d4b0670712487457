use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::{ProgressSnapshot, RunState, TileEvent};

/// Completion instants kept for the throughput estimate.
const WINDOW: usize = 32;

/// Running totals for one run plus a sliding-window throughput estimate.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    snap: ProgressSnapshot,
    started: Instant,
    finished_at: Option<Instant>,
    window: VecDeque<Instant>,
}

impl ProgressReporter {
    pub fn new(total: u64) -> Self {
        Self::starting_at(total, Instant::now())
    }

    pub fn starting_at(total: u64, started: Instant) -> Self {
        Self {
            snap: ProgressSnapshot::initial(total),
            started,
            finished_at: None,
            window: VecDeque::with_capacity(WINDOW),
        }
    }

    pub fn on_event(&mut self, event: &TileEvent) {
        self.record_at(event, Instant::now());
    }

    /// Apply `event` as if it happened at `at`. Events after the terminal
    /// state is set are ignored.
    pub fn record_at(&mut self, event: &TileEvent, at: Instant) {
        if self.snap.state.is_terminal() {
            return;
        }
        let s = &mut self.snap;
        match event {
            TileEvent::CacheHit { .. } => s.cache_hits += 1,
            TileEvent::Downloaded { bytes, .. } => {
                s.downloaded += 1;
                s.bytes_transferred += bytes;
            }
            TileEvent::Converted { .. } => s.converted += 1,
            TileEvent::Written { .. } => s.written += 1,
            TileEvent::Completed { .. } => {
                s.completed += 1;
                self.mark_finished(at);
            }
            TileEvent::Failed { reason, .. } => {
                s.failed += 1;
                *s.failures_by_reason.entry(*reason).or_insert(0) += 1;
                self.mark_finished(at);
            }
        }
    }

    fn mark_finished(&mut self, at: Instant) {
        if self.window.len() == WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(at);
    }

    /// Set the terminal state. Later calls keep the first terminal state.
    pub fn finish(&mut self, state: RunState) {
        self.finish_at(state, Instant::now());
    }

    pub fn finish_at(&mut self, state: RunState, at: Instant) {
        if self.snap.state.is_terminal() {
            return;
        }
        self.snap.state = state;
        self.finished_at = Some(at);
    }

    /// Terminal state implied by the counters when the pipeline drains.
    pub fn outcome(&self, cancelled: bool) -> RunState {
        if cancelled {
            RunState::Cancelled
        } else if self.snap.failed > 0 {
            RunState::CompletedWithFailures
        } else {
            RunState::Completed
        }
    }

    pub fn state(&self) -> RunState {
        self.snap.state
    }

    /// Tiles per second over the window, if two completions span a non-zero interval.
    pub fn tiles_per_sec(&self) -> Option<f64> {
        let (first, last) = (self.window.front()?, self.window.back()?);
        let span = last.saturating_duration_since(*first).as_secs_f64();
        if self.window.len() < 2 || span <= 0.0 {
            return None;
        }
        Some((self.window.len() - 1) as f64 / span)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> ProgressSnapshot {
        let mut snap = self.snap.clone();
        let end = self.finished_at.unwrap_or(now);
        snap.elapsed = end.saturating_duration_since(self.started);
        let remaining = snap.total.saturating_sub(snap.finished());
        snap.eta = if remaining == 0 || snap.state.is_terminal() {
            Some(Duration::ZERO)
        } else {
            self.tiles_per_sec().and_then(|rate| eta_for(remaining, rate))
        };
        snap
    }
}

/// `None` when the estimate does not fit in a `Duration`.
fn eta_for(remaining: u64, rate: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(remaining as f64 / rate).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::TileCoordinate;
    use crate::error::FailureReason;

    fn c(x: u32) -> TileCoordinate {
        TileCoordinate::new(5, x, 0).unwrap()
    }

    #[test]
    fn eta_unknown_before_two_completions() {
        let t0 = Instant::now();
        let mut r = ProgressReporter::starting_at(10, t0);
        assert_eq!(r.snapshot_at(t0).eta, None);
        r.record_at(&TileEvent::Completed { coord: c(0) }, t0 + Duration::from_secs(1));
        assert_eq!(r.snapshot_at(t0 + Duration::from_secs(1)).eta, None);
        // Two completions at the same instant: zero span, still unknown.
        r.record_at(&TileEvent::Completed { coord: c(1) }, t0 + Duration::from_secs(1));
        assert_eq!(r.snapshot_at(t0 + Duration::from_secs(1)).eta, None);
    }

    #[test]
    fn eta_that_overflows_is_unknown() {
        assert_eq!(eta_for(10, 2.0), Some(Duration::from_secs(5)));
        assert_eq!(eta_for(u64::MAX, 1e-12), None);
        assert_eq!(eta_for(1, f64::MIN_POSITIVE), None);
    }

    #[test]
    fn eta_from_sliding_window() {
        let t0 = Instant::now();
        let mut r = ProgressReporter::starting_at(12, t0);
        for i in 0..3 {
            r.record_at(
                &TileEvent::Completed { coord: c(i) },
                t0 + Duration::from_secs(i as u64 + 1),
            );
        }
        // 2 intervals over 2s = 1 tile/s, 9 remaining
        let snap = r.snapshot_at(t0 + Duration::from_secs(3));
        assert_eq!(snap.eta, Some(Duration::from_secs(9)));
        assert_eq!(snap.elapsed, Duration::from_secs(3));
    }

    #[test]
    fn window_keeps_last_32_completions() {
        let t0 = Instant::now();
        let mut r = ProgressReporter::starting_at(1000, t0);
        // first 10 slow, then 40 at 10/s
        for i in 0..10u32 {
            r.record_at(&TileEvent::Completed { coord: c(i) }, t0 + Duration::from_secs(i as u64 * 10));
        }
        let base = t0 + Duration::from_secs(100);
        for i in 0..40u32 {
            r.record_at(
                &TileEvent::Completed { coord: c(i % 32) },
                base + Duration::from_millis(i as u64 * 100),
            );
        }
        let rate = r.tiles_per_sec().unwrap();
        assert!((rate - 10.0).abs() < 1e-6, "rate {rate}");
    }

    #[test]
    fn counters_and_failure_reasons() {
        let mut r = ProgressReporter::new(3);
        r.on_event(&TileEvent::CacheHit { coord: c(0) });
        r.on_event(&TileEvent::Completed { coord: c(0) });
        r.on_event(&TileEvent::Downloaded {
            coord: c(1),
            bytes: 100,
            attempts: 2,
        });
        r.on_event(&TileEvent::Converted { coord: c(1) });
        r.on_event(&TileEvent::Completed { coord: c(1) });
        r.on_event(&TileEvent::Failed {
            coord: c(2),
            reason: FailureReason::PermanentFetch,
            message: "HTTP 404".into(),
        });
        let s = r.snapshot();
        assert_eq!((s.completed, s.failed, s.cache_hits, s.downloaded), (2, 1, 1, 1));
        assert_eq!(s.converted, 1);
        assert_eq!(s.bytes_transferred, 100);
        assert_eq!(s.failures_by_reason.get(&FailureReason::PermanentFetch), Some(&1));
        assert_eq!(r.outcome(false), RunState::CompletedWithFailures);
        assert_eq!(r.outcome(true), RunState::Cancelled);
    }

    #[test]
    fn terminal_state_is_sticky_and_freezes_counts() {
        let mut r = ProgressReporter::new(2);
        r.finish(RunState::Cancelled);
        r.finish(RunState::Completed);
        r.on_event(&TileEvent::Completed { coord: c(0) });
        let s = r.snapshot();
        assert_eq!(s.state, RunState::Cancelled);
        assert_eq!(s.completed, 0);
    }
}
