use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::coverage::{MAX_TILE_ZOOM, MAX_WORLD_ZOOM};
use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per tile (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 1.0 = 1s, 2s, 4s...).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 1.0,
            max_delay_secs: 8,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: std::time::Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            max_delay: std::time::Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Global configuration loaded from `~/.config/tiledl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileDlConfig {
    /// Concurrent tile fetches per run. Kept small to stay polite to providers.
    pub fetch_workers: usize,
    /// Concurrent conversion/write workers per run (CPU-bound stage).
    pub convert_workers: usize,
    /// Connect timeout per tile request, in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout per tile, in seconds.
    pub request_timeout_secs: u64,
    /// User-Agent header sent to providers.
    pub user_agent: String,
    /// Deepest zoom accepted for polygon runs.
    pub max_zoom: u8,
    /// Deepest zoom a world run may reach; deeper requests are clamped.
    pub world_max_zoom: u8,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Tile cache root (None = `$XDG_CACHE_HOME/tiledl/tiles`).
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Default output root (None = `$XDG_DATA_HOME/tiledl/output`).
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Provider descriptor (None = `$XDG_CONFIG_HOME/tiledl/providers.json`).
    #[serde(default)]
    pub providers_file: Option<PathBuf>,
}

impl Default for TileDlConfig {
    fn default() -> Self {
        Self {
            fetch_workers: 5,
            convert_workers: 2,
            connect_timeout_secs: 5,
            request_timeout_secs: 10,
            user_agent: format!("TileDL/{}", env!("CARGO_PKG_VERSION")),
            max_zoom: 19,
            world_max_zoom: 7,
            retry: None,
            cache_dir: None,
            output_dir: None,
            providers_file: None,
        }
    }
}

impl TileDlConfig {
    /// Reject zoom limits the coverage calculator cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_zoom > MAX_TILE_ZOOM {
            bail!("max_zoom = {} exceeds the tile scheme maximum of {}", self.max_zoom, MAX_TILE_ZOOM);
        }
        if self.world_max_zoom > MAX_WORLD_ZOOM {
            bail!(
                "world_max_zoom = {} is too deep for a whole-world run (at most {})",
                self.world_max_zoom,
                MAX_WORLD_ZOOM
            );
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(RetryConfig::to_policy)
            .unwrap_or_default()
    }

    /// Resolved cache root, creating the XDG default if none is configured.
    pub fn cache_root(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("tiledl")?;
        Ok(xdg_dirs.create_cache_directory("tiles")?)
    }

    /// Resolved default output root.
    pub fn output_root(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.output_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("tiledl")?;
        Ok(xdg_dirs.create_data_directory("output")?)
    }

    /// Resolved provider descriptor path.
    pub fn providers_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.providers_file {
            return Ok(path.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("tiledl")?;
        Ok(xdg_dirs.place_config_file("providers.json")?)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tiledl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TileDlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = TileDlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: TileDlConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_config_values() {
        let cfg = TileDlConfig::default();
        assert_eq!(cfg.fetch_workers, 5);
        assert_eq!(cfg.convert_workers, 2);
        assert_eq!(cfg.max_zoom, 19);
        assert_eq!(cfg.world_max_zoom, 7);
        assert!(cfg.user_agent.starts_with("TileDL/"));
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = TileDlConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: TileDlConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.fetch_workers, cfg.fetch_workers);
        assert_eq!(parsed.request_timeout_secs, cfg.request_timeout_secs);
        assert_eq!(parsed.world_max_zoom, cfg.world_max_zoom);
        assert_eq!(parsed.user_agent, cfg.user_agent);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            fetch_workers = 8
            convert_workers = 4
            connect_timeout_secs = 3
            request_timeout_secs = 20
            user_agent = "test-agent"
            max_zoom = 17
            world_max_zoom = 5
            cache_dir = "/tmp/tiles"
        "#;
        let cfg: TileDlConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.fetch_workers, 8);
        assert_eq!(cfg.convert_workers, 4);
        assert_eq!(cfg.max_zoom, 17);
        assert_eq!(cfg.world_max_zoom, 5);
        assert_eq!(cfg.cache_dir.as_deref(), Some(std::path::Path::new("/tmp/tiles")));
        assert_eq!(cfg.cache_root().unwrap(), PathBuf::from("/tmp/tiles"));
        assert!(cfg.retry.is_none());
        assert!(cfg.output_dir.is_none());
    }

    #[test]
    fn config_toml_retry_section() {
        let toml = r#"
            fetch_workers = 2
            convert_workers = 1
            connect_timeout_secs = 5
            request_timeout_secs = 10
            user_agent = "x"
            max_zoom = 19
            world_max_zoom = 7

            [retry]
            max_attempts = 4
            base_delay_secs = 0.5
            max_delay_secs = 15
        "#;
        let cfg: TileDlConfig = toml::from_str(toml).unwrap();
        let retry = cfg.retry.as_ref().unwrap();
        assert_eq!(retry.max_attempts, 4);
        assert!((retry.base_delay_secs - 0.5).abs() < 1e-9);
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(15));
    }

    #[test]
    fn validate_rejects_out_of_range_zooms() {
        assert!(TileDlConfig::default().validate().is_ok());
        let deep_world = TileDlConfig {
            world_max_zoom: 40,
            ..TileDlConfig::default()
        };
        assert!(deep_world.validate().is_err());
        let deep_polygon = TileDlConfig {
            max_zoom: 31,
            ..TileDlConfig::default()
        };
        assert!(deep_polygon.validate().is_err());
    }

    #[test]
    fn missing_retry_section_uses_policy_default() {
        let cfg = TileDlConfig::default();
        assert_eq!(cfg.retry_policy().max_attempts, RetryPolicy::default().max_attempts);
    }
}
