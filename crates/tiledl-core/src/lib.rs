pub mod config;
pub mod logging;

pub mod cache;
pub mod checksum;
pub mod control;
pub mod convert;
pub mod coverage;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod output;
pub mod progress;
pub mod provider;
pub mod retry;
pub mod scheduler;
pub mod storage;

pub use engine::{Engine, EngineOptions, RunHandle, RunRequest};
