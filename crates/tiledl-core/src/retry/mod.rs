//! Retry and backoff policy.
//!
//! Fetch failures are classified into error kinds (timeouts, throttling,
//! connection failures, 5xx, everything else) and an exponential backoff
//! policy decides whether and when to try again. Backoff sleeps observe the
//! run's cancellation token.

mod classify;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, sleep_cancellable};
