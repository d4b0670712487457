//! Disk I/O and file lifecycle.
//!
//! Every tile file (cache entry or output artifact) is written to a temp file
//! in its destination directory, fsynced, then atomically renamed over the
//! final name. Temp files carry the `.part` suffix and a leading dot so
//! directory scans can skip them.

mod writer;

pub use writer::StorageWriter;

use std::fs;
use std::io;
use std::path::Path;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Write `data` to `final_path` atomically, creating parent directories.
pub fn write_atomic(final_path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = final_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = StorageWriter::create(final_path)?;
    writer.write_all(data)?;
    writer.sync()?;
    writer.finalize()?;
    Ok(())
}

/// True for names produced by `StorageWriter` while a write is in flight.
pub fn is_temp_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}

/// Remove leftover temp files under `root` (e.g. from a killed process).
/// Returns how many were removed. A missing root is not an error.
pub fn sweep_stale_parts(root: &Path) -> io::Result<usize> {
    let mut removed = 0;
    let entries = match fs::read_dir(root) {
        Ok(e) => e,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();
        if file_type.is_dir() {
            removed += sweep_stale_parts(&path)?;
        } else if is_temp_name(&entry.file_name().to_string_lossy()) {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
    }
    if removed > 0 {
        tracing::debug!(root = %root.display(), removed, "swept stale temp files");
    }
    Ok(removed)
}
