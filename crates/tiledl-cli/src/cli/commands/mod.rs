//! CLI command handlers, one file per command.

mod cache;
mod completions;
mod providers;
mod run;

pub use cache::run_cache;
pub use completions::run_completions;
pub use providers::run_providers;
pub use run::{run_tiles, RunArgs};
