//! `tiledl cache` – usage, listing and clearing.

use anyhow::Result;
use tiledl_core::cache::CacheScope;
use tiledl_core::Engine;

use crate::cli::CacheCommand;

pub fn run_cache(engine: &Engine, command: CacheCommand) -> Result<()> {
    match command {
        CacheCommand::Usage { json } => {
            let usage = engine.cache_usage()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&usage)?);
            } else if usage.is_empty() {
                println!("Cache is empty ({}).", engine.cache().root().display());
            } else {
                println!("{:<32} {:>10} {:>14}", "PROVIDER", "TILES", "BYTES");
                for u in &usage {
                    println!("{:<32} {:>10} {:>14}", u.provider, u.tiles, u.bytes);
                }
            }
        }
        CacheCommand::List { provider } => {
            for coord in engine.list_cached_tiles(&provider)? {
                println!("{}", coord);
            }
        }
        CacheCommand::Clear { provider, all } => {
            let scope = match provider {
                Some(p) if !all => CacheScope::Provider(p),
                _ => CacheScope::All,
            };
            let freed = engine.clear_cache(&scope)?;
            tracing::info!(?scope, freed, "cache cleared");
            println!("Freed {} bytes.", freed);
        }
    }
    Ok(())
}
