//! Output directory writer.
//!
//! Layout: `{root}/{provider}/{raw|png|rgb565}/{z}/{x}/{y}.{ext}`. Files appear
//! as the run progresses; each one is written through `storage::write_atomic`
//! so a reader of the output directory never sees a truncated file.

use std::path::{Path, PathBuf};

use crate::convert::{sniff_extension, OutputFormat};
use crate::coverage::TileCoordinate;
use crate::error::TileError;
use crate::provider::sanitize_provider_dir;
use crate::storage;

#[derive(Debug, Clone)]
pub struct OutputWriter {
    root: PathBuf,
}

impl OutputWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn provider_root(&self, provider: &str) -> PathBuf {
        self.root.join(sanitize_provider_dir(provider))
    }

    /// Destination for one artifact. `ext` is only consulted for `raw`.
    pub fn path_for(&self, provider: &str, coord: &TileCoordinate, format: OutputFormat, ext: &str) -> PathBuf {
        let ext = match format {
            OutputFormat::Raw => ext,
            OutputFormat::Png8 => "png",
            OutputFormat::Rgb565 => "bin",
        };
        self.provider_root(provider)
            .join(format.dir_name())
            .join(coord.zoom().to_string())
            .join(coord.x().to_string())
            .join(format!("{}.{ext}", coord.y()))
    }

    /// Write one artifact atomically and return its final path.
    pub fn write(
        &self,
        provider: &str,
        coord: &TileCoordinate,
        format: OutputFormat,
        bytes: &[u8],
    ) -> Result<PathBuf, TileError> {
        let path = self.path_for(provider, coord, format, sniff_extension(bytes));
        storage::write_atomic(&path, bytes).map_err(|source| TileError::Output {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Remove temp files left in this provider's output tree by an earlier,
    /// interrupted run.
    pub fn sweep_stale(&self, provider: &str) -> std::io::Result<usize> {
        storage::sweep_stale_parts(&self.provider_root(provider))
    }
}
