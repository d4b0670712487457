//! `tiledl providers` – list configured tile sources.

use anyhow::Result;
use tiledl_core::Engine;

pub fn run_providers(engine: &Engine, json: bool) -> Result<()> {
    let providers = engine.providers();
    if json {
        let list: Vec<_> = providers
            .iter()
            .map(|p| serde_json::json!({ "id": p.id(), "dir": p.dir_name() }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }
    if providers.is_empty() {
        println!("No providers configured.");
        return Ok(());
    }
    for p in providers {
        println!("{}\t{}", p.id(), p.dir_name());
    }
    Ok(())
}
