//! Provider descriptor: provider id → URL template and static parameters.
//!
//! Loaded once per process from a JSON file and immutable afterwards. Each
//! entry is either a bare template string or an object with `url`, optional
//! `subdomains` and optional `params`:
//!
//! ```json
//! {
//!   "OpenStreetMap": "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
//!   "Thunderforest": {
//!     "url": "https://tile.thunderforest.com/cycle/{z}/{x}/{y}.png?apikey={apikey}",
//!     "params": { "apikey": "..." }
//!   }
//! }
//! ```

mod sanitize;
mod template;

pub use sanitize::sanitize_provider_dir;
pub use template::UrlTemplate;

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::coverage::TileCoordinate;
use crate::error::ProviderError;

/// Written on first use when no descriptor exists.
pub const DEFAULT_DESCRIPTOR: &str = r#"{
  "OpenStreetMap": "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png"
}
"#;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Template(String),
    Full {
        url: String,
        #[serde(default)]
        subdomains: Vec<String>,
        #[serde(default)]
        params: BTreeMap<String, String>,
    },
}

/// One configured tile source.
#[derive(Debug, Clone)]
pub struct Provider {
    id: String,
    dir_name: String,
    template: UrlTemplate,
}

impl Provider {
    pub fn new(
        id: &str,
        url: &str,
        subdomains: &[String],
        params: &BTreeMap<String, String>,
    ) -> Result<Self, ProviderError> {
        let template =
            UrlTemplate::parse(url, params, subdomains).map_err(|reason| ProviderError::InvalidTemplate {
                provider: id.to_string(),
                reason,
            })?;
        Ok(Self {
            id: id.to_string(),
            dir_name: sanitize_provider_dir(id),
            template,
        })
    }

    /// Display id as written in the descriptor.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Directory name used under the cache and output roots.
    pub fn dir_name(&self) -> &str {
        &self.dir_name
    }

    pub fn tile_url(&self, coord: &TileCoordinate) -> String {
        self.template.render(coord)
    }
}

/// All providers known to this process.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Provider>,
}

impl ProviderRegistry {
    pub fn from_json_str(json: &str) -> Result<Self, ProviderError> {
        let raw: BTreeMap<String, RawEntry> = serde_json::from_str(json)?;
        let mut providers = BTreeMap::new();
        for (id, entry) in raw {
            let provider = match entry {
                RawEntry::Template(url) => Provider::new(&id, &url, &[], &BTreeMap::new())?,
                RawEntry::Full {
                    url,
                    subdomains,
                    params,
                } => Provider::new(&id, &url, &subdomains, &params)?,
            };
            providers.insert(id, provider);
        }
        tracing::debug!(count = providers.len(), "loaded provider descriptor");
        Ok(Self { providers })
    }

    pub fn load(path: &Path) -> Result<Self, ProviderError> {
        let data = std::fs::read_to_string(path).map_err(|source| ProviderError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&data)
    }

    /// Load the descriptor at `path`, writing `DEFAULT_DESCRIPTOR` there first
    /// if the file does not exist yet.
    pub fn load_or_init(path: &Path) -> Result<Self, ProviderError> {
        if !path.exists() {
            let write = || -> std::io::Result<()> {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, DEFAULT_DESCRIPTOR)
            };
            write().map_err(|source| ProviderError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::info!("created default provider descriptor at {}", path.display());
        }
        Self::load(path)
    }

    pub fn insert(&mut self, provider: Provider) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    pub fn get(&self, id: &str) -> Result<&Provider, ProviderError> {
        self.providers
            .get(id)
            .ok_or_else(|| ProviderError::Unknown(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Provider> {
        self.providers.values()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
