//! Retry loop: run a fetch until success, a permanent error, the attempt
//! ceiling, or cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::classify;
use super::policy::{RetryDecision, RetryPolicy};
use crate::error::TileError;
use crate::fetch::FetchError;

const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Sleep for `d`, waking early if `cancel` is set. Returns false if cancelled.
pub fn sleep_cancellable(d: Duration, cancel: &AtomicBool) -> bool {
    let deadline = Instant::now() + d;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}

/// Runs `f` until it succeeds or the retry policy says to stop.
///
/// On success returns the value and the number of attempts used. Transient
/// failures that exhaust the policy become `TileError::FetchFailed`; permanent
/// ones become `TileError::PermanentFetch` after a single attempt.
pub fn run_with_retry<T, F>(
    policy: &RetryPolicy,
    cancel: &AtomicBool,
    mut f: F,
) -> Result<(T, u32), TileError>
where
    F: FnMut() -> Result<T, FetchError>,
{
    let mut attempt = 1u32;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(TileError::Cancelled);
        }
        let err = match f() {
            Ok(v) => return Ok((v, attempt)),
            Err(FetchError::Aborted) => return Err(TileError::Cancelled),
            Err(e) => e,
        };
        let kind = classify::classify(&err);
        if !kind.is_transient() {
            return Err(TileError::PermanentFetch(err));
        }
        match policy.decide(attempt, kind) {
            RetryDecision::NoRetry => {
                return Err(TileError::FetchFailed {
                    attempts: attempt,
                    source: err,
                })
            }
            RetryDecision::RetryAfter(d) => {
                tracing::debug!(attempt, ?kind, delay_ms = d.as_millis() as u64, "retrying tile fetch: {}", err);
                if !sleep_cancellable(d, cancel) {
                    return Err(TileError::Cancelled);
                }
                attempt += 1;
            }
        }
    }
}
