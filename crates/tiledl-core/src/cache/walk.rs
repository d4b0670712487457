//! Directory walks over the `{z}/{x}/{y}.{ext}` layout.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::coverage::TileCoordinate;
use crate::storage::is_temp_name;

fn read_dir_or_empty(dir: &Path) -> io::Result<Vec<fs::DirEntry>> {
    match fs::read_dir(dir) {
        Ok(rd) => rd.collect(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Immediate subdirectories of `dir`.
pub(super) fn subdirs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in read_dir_or_empty(dir)? {
        if entry.file_type()?.is_dir() {
            out.push(entry.path());
        }
    }
    Ok(out)
}

/// Total bytes and file count under `dir`, skipping temp files.
pub(super) fn tally(dir: &Path) -> io::Result<(u64, u64)> {
    let mut bytes = 0;
    let mut files = 0;
    for entry in read_dir_or_empty(dir)? {
        let ft = entry.file_type()?;
        if ft.is_dir() {
            let (b, f) = tally(&entry.path())?;
            bytes += b;
            files += f;
        } else if ft.is_file() && !is_temp_name(&entry.file_name().to_string_lossy()) {
            bytes += entry.metadata()?.len();
            files += 1;
        }
    }
    Ok((bytes, files))
}

/// Coordinates of `{z}/{x}/{y}.{ext}` files under `dir`; other names are ignored.
pub(super) fn coordinates(dir: &Path, ext: &str) -> io::Result<Vec<TileCoordinate>> {
    let mut out = Vec::new();
    for z_dir in subdirs(dir)? {
        let Some(z) = parse_name::<u8>(&z_dir) else { continue };
        for x_dir in subdirs(&z_dir)? {
            let Some(x) = parse_name::<u32>(&x_dir) else { continue };
            for entry in read_dir_or_empty(&x_dir)? {
                let path = entry.path();
                if !entry.file_type()?.is_file() || path.extension().and_then(|e| e.to_str()) != Some(ext) {
                    continue;
                }
                let y = path.file_stem().and_then(|s| s.to_str()).and_then(|s| s.parse::<u32>().ok());
                if let Some(coord) = y.and_then(|y| TileCoordinate::new(z, x, y)) {
                    out.push(coord);
                }
            }
        }
    }
    Ok(out)
}

fn parse_name<T: std::str::FromStr>(path: &Path) -> Option<T> {
    path.file_name()?.to_str()?.parse().ok()
}
