//! Run control: shared cancellation tokens for active runs.
//!
//! Each running run is registered with a cancel token. Workers poll the token
//! between jobs, during backoff sleeps and from the curl progress callback, so
//! a cancel request is observed with bounded latency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Identifier handed out by the engine for each started run.
pub type RunId = u64;

/// Shared registry of run id -> cancel token.
#[derive(Debug, Default)]
pub struct RunControl {
    next_id: AtomicU64,
    runs: RwLock<HashMap<RunId, Arc<AtomicBool>>>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id for a new run and register its token.
    pub fn register(&self) -> (RunId, Arc<AtomicBool>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let token = Arc::new(AtomicBool::new(false));
        self.runs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, Arc::clone(&token));
        (id, token)
    }

    /// Drop a finished run's token.
    pub fn unregister(&self, id: RunId) {
        self.runs.write().unwrap_or_else(|e| e.into_inner()).remove(&id);
    }

    /// Request cancellation. Returns false if no such run is active.
    pub fn cancel(&self, id: RunId) -> bool {
        match self.runs.read().unwrap_or_else(|e| e.into_inner()).get(&id) {
            Some(token) => {
                token.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, id: RunId) -> bool {
        self.runs.read().unwrap_or_else(|e| e.into_inner()).contains_key(&id)
    }

    /// Cancel every active run (e.g. on Ctrl-C).
    pub fn cancel_all(&self) {
        for token in self.runs.read().unwrap_or_else(|e| e.into_inner()).values() {
            token.store(true, Ordering::Relaxed);
        }
    }
}
