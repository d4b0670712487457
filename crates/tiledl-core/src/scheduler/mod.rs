//! Download scheduler.
//!
//! Turns a run's tile list into work for two bounded pools:
//! cache check → fetch with retry → cache put → convert → output write.
//! Every step reports a `TileEvent` to the run's progress aggregator.

mod job;
mod pipeline;
mod run;

pub use job::{build_jobs, TileJob};
pub use pipeline::{run_pipeline, PipelineContext};
pub use run::drive_run;
