//! Temp-file writer that becomes visible only on finalize.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::TEMP_SUFFIX;

/// Writer for one destination file. Bytes go to a uniquely named `.part` file
/// next to the destination; `finalize` renames it into place, so readers see
/// either the previous complete file or the new complete file. Dropping the
/// writer without finalizing deletes the temp file.
pub struct StorageWriter {
    temp: NamedTempFile,
    final_path: PathBuf,
}

impl StorageWriter {
    /// Create a temp file beside `final_path`. The parent directory must exist.
    pub fn create(final_path: &Path) -> io::Result<Self> {
        let dir = final_path.parent().unwrap_or_else(|| Path::new("."));
        let stem = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = tempfile::Builder::new()
            .prefix(&format!(".{stem}."))
            .suffix(TEMP_SUFFIX)
            .tempfile_in(dir)?;
        Ok(Self {
            temp,
            final_path: final_path.to_path_buf(),
        })
    }

    pub fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.temp.as_file_mut().write_all(data)
    }

    /// Sync file data to disk. Call before `finalize` for durability.
    pub fn sync(&self) -> io::Result<()> {
        self.temp.as_file().sync_all()
    }

    /// Path to the current temp file.
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Atomically rename the temp file to the final path, replacing any
    /// existing file there.
    pub fn finalize(self) -> io::Result<File> {
        let final_path = self.final_path;
        self.temp.persist(&final_path).map_err(|e| e.error)
    }
}
