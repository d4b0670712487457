#![allow(dead_code)]

pub mod tile_server;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tiledl_core::coverage::ZoomLimits;
use tiledl_core::fetch::{CurlFetcher, FetchOptions};
use tiledl_core::provider::{Provider, ProviderRegistry};
use tiledl_core::retry::RetryPolicy;
use tiledl_core::{Engine, EngineOptions};

pub const PROVIDER: &str = "Local Test";

/// Engine against a local tile server, with short retry delays.
pub fn engine(base_url: &str, cache: &Path, output: &Path, fetch_workers: usize) -> Engine {
    let mut providers = ProviderRegistry::default();
    let template = format!("{base_url}{{z}}/{{x}}/{{y}}.png");
    providers.insert(Provider::new(PROVIDER, &template, &[], &BTreeMap::new()).unwrap());
    let opts = EngineOptions {
        cache_root: cache.to_path_buf(),
        output_root: output.to_path_buf(),
        fetch_workers,
        convert_workers: 2,
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
        },
        limits: ZoomLimits::default(),
        fetch: FetchOptions::default(),
    };
    let fetcher = Arc::new(CurlFetcher::new(opts.fetch.clone()));
    Engine::with_fetcher(opts, providers, fetcher).unwrap()
}

/// Every regular file under `root`, sorted.
pub fn files_under(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(rd) = std::fs::read_dir(&dir) else { continue };
        for entry in rd.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}
