//! On-disk tile cache keyed by (provider, z, x, y).
//!
//! Layout: `{root}/{provider}/{z}/{x}/{y}.bin`, provider id sanitised for the
//! filesystem. Entries are written through `storage::write_atomic`, so a reader
//! in this or any other process sees either no file or the complete bytes.
//!
//! Within the process, puts for the same key are serialised by a sharded lock
//! and `clear`/`evict` hold an exclusive lock that waits out in-flight puts.

mod walk;

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use std::time::SystemTime;

use crate::checksum::TileDigest;
use crate::coverage::TileCoordinate;
use crate::error::CacheError;
use crate::provider::sanitize_provider_dir;
use crate::storage;

const SHARDS: usize = 64;
const TILE_EXT: &str = "bin";

/// Which part of the cache an operation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheScope {
    All,
    Provider(String),
}

/// One cached tile.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub provider: String,
    pub coord: TileCoordinate,
    pub bytes: Vec<u8>,
    /// Digest of `bytes`.
    pub hash: TileDigest,
    pub stored_at: SystemTime,
}

/// Bytes and tile count held for one provider.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ProviderUsage {
    pub provider: String,
    pub bytes: u64,
    pub tiles: u64,
}

pub struct TileCache {
    root: PathBuf,
    shards: Vec<Mutex<()>>,
    clear_lock: RwLock<()>,
}

impl std::fmt::Debug for TileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCache").field("root", &self.root).finish()
    }
}

impl TileCache {
    /// Open (creating if needed) a cache rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| CacheError::io(&root, e))?;
        Ok(Self {
            root,
            shards: (0..SHARDS).map(|_| Mutex::new(())).collect(),
            clear_lock: RwLock::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn provider_root(&self, provider: &str) -> PathBuf {
        self.root.join(sanitize_provider_dir(provider))
    }

    pub fn tile_path(&self, provider: &str, coord: &TileCoordinate) -> PathBuf {
        self.provider_root(provider)
            .join(coord.zoom().to_string())
            .join(coord.x().to_string())
            .join(format!("{}.{TILE_EXT}", coord.y()))
    }

    fn shard(&self, provider: &str, coord: &TileCoordinate) -> &Mutex<()> {
        let mut h = DefaultHasher::new();
        sanitize_provider_dir(provider).hash(&mut h);
        coord.hash(&mut h);
        &self.shards[(h.finish() as usize) % self.shards.len()]
    }

    /// Look up a tile. A zero-length file is a miss and is removed.
    pub fn get(&self, provider: &str, coord: &TileCoordinate) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.tile_path(provider, coord);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(&path, e)),
        };
        if bytes.is_empty() {
            if self.discard_if_empty(provider, coord)? {
                return Ok(None);
            }
            // A put landed a full tile after our read.
            return self.get(provider, coord);
        }
        let stored_at = fs::metadata(&path)
            .and_then(|m| m.modified())
            .unwrap_or_else(|_| SystemTime::now());
        Ok(Some(CacheEntry {
            provider: provider.to_string(),
            coord: *coord,
            hash: TileDigest::of(&bytes),
            bytes,
            stored_at,
        }))
    }

    /// Remove a zero-length entry. The length is re-checked under the shard
    /// lock so a tile renamed into place by a concurrent put survives.
    /// Returns false when the entry turned out to be non-empty.
    fn discard_if_empty(&self, provider: &str, coord: &TileCoordinate) -> Result<bool, CacheError> {
        let path = self.tile_path(provider, coord);
        let _guard = self.shard(provider, coord).lock().unwrap_or_else(|e| e.into_inner());
        match fs::metadata(&path) {
            Ok(m) if m.len() > 0 => return Ok(false),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(CacheError::io(&path, e)),
        }
        tracing::warn!(path = %path.display(), "removing zero-length cache entry");
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }

    pub fn contains(&self, provider: &str, coord: &TileCoordinate) -> bool {
        fs::metadata(self.tile_path(provider, coord))
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    /// Store a tile, replacing any existing entry. Idempotent for equal bytes.
    pub fn put(&self, provider: &str, coord: &TileCoordinate, bytes: &[u8]) -> Result<CacheEntry, CacheError> {
        if bytes.is_empty() {
            return Err(CacheError::EmptyTile);
        }
        let path = self.tile_path(provider, coord);
        {
            let _clear = self.clear_lock.read().unwrap_or_else(|e| e.into_inner());
            let _guard = self.shard(provider, coord).lock().unwrap_or_else(|e| e.into_inner());
            storage::write_atomic(&path, bytes).map_err(|e| CacheError::io(&path, e))?;
        }
        let hash = TileDigest::of(bytes);
        tracing::trace!(tile = %coord, digest = %hash.short(), bytes = bytes.len(), "cached tile");
        Ok(CacheEntry {
            provider: provider.to_string(),
            coord: *coord,
            bytes: bytes.to_vec(),
            hash,
            stored_at: SystemTime::now(),
        })
    }

    /// Remove everything (or one provider's subtree). Returns bytes freed.
    pub fn clear(&self, scope: &CacheScope) -> Result<u64, CacheError> {
        let _clear = self.clear_lock.write().unwrap_or_else(|e| e.into_inner());
        let freed = self.size_unlocked(scope)?;
        let targets: Vec<PathBuf> = match scope {
            CacheScope::All => walk::subdirs(&self.root).map_err(|e| CacheError::io(&self.root, e))?,
            CacheScope::Provider(p) => vec![self.provider_root(p)],
        };
        for dir in targets {
            match fs::remove_dir_all(&dir) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(CacheError::io(&dir, e)),
            }
        }
        tracing::info!(?scope, freed, "cache cleared");
        Ok(freed)
    }

    /// Remove specific tiles of one provider (per-extent eviction). Returns
    /// how many entries existed and were removed.
    pub fn evict(&self, provider: &str, coords: &[TileCoordinate]) -> Result<usize, CacheError> {
        let _clear = self.clear_lock.write().unwrap_or_else(|e| e.into_inner());
        let mut removed = 0;
        for coord in coords {
            let path = self.tile_path(provider, coord);
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(CacheError::io(&path, e)),
            }
        }
        tracing::debug!(provider, removed, "evicted cached tiles");
        Ok(removed)
    }

    /// Bytes on disk for `scope`, excluding in-flight temp files.
    pub fn size(&self, scope: &CacheScope) -> Result<u64, CacheError> {
        let _clear = self.clear_lock.read().unwrap_or_else(|e| e.into_inner());
        self.size_unlocked(scope)
    }

    fn size_unlocked(&self, scope: &CacheScope) -> Result<u64, CacheError> {
        let dir = match scope {
            CacheScope::All => self.root.clone(),
            CacheScope::Provider(p) => self.provider_root(p),
        };
        walk::tally(&dir)
            .map(|(bytes, _)| bytes)
            .map_err(|e| CacheError::io(&dir, e))
    }

    /// Per-provider usage, sorted by provider directory name.
    pub fn usage(&self) -> Result<Vec<ProviderUsage>, CacheError> {
        let _clear = self.clear_lock.read().unwrap_or_else(|e| e.into_inner());
        let mut out = Vec::new();
        for dir in walk::subdirs(&self.root).map_err(|e| CacheError::io(&self.root, e))? {
            let (bytes, tiles) = walk::tally(&dir).map_err(|e| CacheError::io(&dir, e))?;
            let provider = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            out.push(ProviderUsage { provider, bytes, tiles });
        }
        out.sort_by(|a, b| a.provider.cmp(&b.provider));
        Ok(out)
    }

    /// Every cached coordinate for `provider`, ordered by `(z, x, y)`.
    pub fn list_tiles(&self, provider: &str) -> Result<Vec<TileCoordinate>, CacheError> {
        let dir = self.provider_root(provider);
        let mut tiles = walk::coordinates(&dir, TILE_EXT).map_err(|e| CacheError::io(&dir, e))?;
        tiles.sort();
        Ok(tiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn coord(z: u8, x: u32, y: u32) -> TileCoordinate {
        TileCoordinate::new(z, x, y).unwrap()
    }

    #[test]
    fn put_then_get_and_idempotent_put() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::open(dir.path()).unwrap();
        let c = coord(3, 2, 1);
        assert!(cache.get("osm", &c).unwrap().is_none());

        let first = cache.put("osm", &c, b"tile-bytes").unwrap();
        let second = cache.put("osm", &c, b"tile-bytes").unwrap();
        assert_eq!(first.hash, second.hash);

        let got = cache.get("osm", &c).unwrap().unwrap();
        assert_eq!(got.bytes, b"tile-bytes");
        assert_eq!(got.hash, first.hash);
        assert!(cache.contains("osm", &c));
        assert_eq!(cache.tile_path("osm", &c), dir.path().join("osm/3/2/1.bin"));
    }

    #[test]
    fn empty_put_rejected_and_empty_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::open(dir.path()).unwrap();
        let c = coord(1, 0, 1);
        assert!(matches!(cache.put("osm", &c, b""), Err(CacheError::EmptyTile)));

        let path = cache.tile_path("osm", &c);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"").unwrap();
        assert!(!cache.contains("osm", &c));
        assert!(cache.get("osm", &c).unwrap().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn clear_all_and_per_provider() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::open(dir.path()).unwrap();
        let c = coord(2, 1, 1);
        cache.put("Provider A", &c, b"aaaa").unwrap();
        cache.put("b", &c, b"bb").unwrap();
        assert_eq!(cache.size(&CacheScope::All).unwrap(), 6);

        let freed = cache.clear(&CacheScope::Provider("Provider A".into())).unwrap();
        assert_eq!(freed, 4);
        assert!(cache.get("Provider A", &c).unwrap().is_none());
        assert!(cache.get("b", &c).unwrap().is_some());

        cache.clear(&CacheScope::All).unwrap();
        assert!(cache.get("b", &c).unwrap().is_none());
        assert_eq!(cache.size(&CacheScope::All).unwrap(), 0);
        assert!(dir.path().exists());
    }

    #[test]
    fn evict_removes_only_listed_tiles() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::open(dir.path()).unwrap();
        for x in 0..4 {
            cache.put("osm", &coord(2, x, 0), b"x").unwrap();
        }
        let removed = cache.evict("osm", &[coord(2, 0, 0), coord(2, 1, 0), coord(2, 3, 3)]).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(cache.list_tiles("osm").unwrap(), vec![coord(2, 2, 0), coord(2, 3, 0)]);
    }

    #[test]
    fn usage_and_listing_skip_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::open(dir.path()).unwrap();
        cache.put("osm", &coord(1, 1, 0), b"12345").unwrap();
        cache.put("osm", &coord(0, 0, 0), b"123").unwrap();
        cache.put("carto", &coord(0, 0, 0), b"1").unwrap();
        fs::write(dir.path().join("osm/1/1/.0.bin.xyz.part"), b"partial").unwrap();

        let usage = cache.usage().unwrap();
        assert_eq!(
            usage,
            vec![
                ProviderUsage { provider: "carto".into(), bytes: 1, tiles: 1 },
                ProviderUsage { provider: "osm".into(), bytes: 8, tiles: 2 },
            ]
        );
        assert_eq!(cache.list_tiles("osm").unwrap(), vec![coord(0, 0, 0), coord(1, 1, 0)]);
        assert!(cache.list_tiles("missing").unwrap().is_empty());
    }

    #[test]
    fn concurrent_puts_and_clear_never_leave_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(TileCache::open(dir.path()).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..50u32 {
                        let c = coord(6, i % 8, t);
                        cache.put("osm", &c, b"payload").unwrap();
                        if i % 10 == 0 {
                            cache.clear(&CacheScope::Provider("osm".into())).unwrap();
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        for c in cache.list_tiles("osm").unwrap() {
            assert_eq!(cache.get("osm", &c).unwrap().unwrap().bytes, b"payload");
        }
    }

    #[test]
    fn empty_entry_discard_spares_a_tile_that_just_landed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::open(dir.path()).unwrap();
        let c = coord(4, 2, 2);
        // Reader saw an empty file, then a put replaced it before the lock.
        cache.put("osm", &c, b"full tile").unwrap();
        assert!(!cache.discard_if_empty("osm", &c).unwrap());
        assert_eq!(cache.get("osm", &c).unwrap().unwrap().bytes, b"full tile");

        fs::write(cache.tile_path("osm", &c), b"").unwrap();
        assert!(cache.discard_if_empty("osm", &c).unwrap());
        assert!(!cache.tile_path("osm", &c).exists());
        assert!(cache.discard_if_empty("osm", &c).unwrap());
    }

    #[test]
    fn readers_see_one_whole_payload_during_concurrent_puts() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(TileCache::open(dir.path()).unwrap());
        let c = coord(7, 3, 3);
        let payloads: Arc<Vec<Vec<u8>>> = Arc::new(
            (0..4u8)
                .map(|w| (0..64 * 1024).map(|i| w.wrapping_add(i as u8)).collect())
                .collect(),
        );
        cache.put("osm", &c, &payloads[0]).unwrap();

        let writers: Vec<_> = (0..payloads.len())
            .map(|w| {
                let cache = Arc::clone(&cache);
                let payloads = Arc::clone(&payloads);
                std::thread::spawn(move || {
                    for _ in 0..40 {
                        cache.put("osm", &c, &payloads[w]).unwrap();
                    }
                })
            })
            .collect();
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let payloads = Arc::clone(&payloads);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let entry = cache.get("osm", &c).unwrap().expect("tile present");
                        assert!(
                            payloads.iter().any(|p| *p == entry.bytes),
                            "read {} bytes matching no payload",
                            entry.bytes.len()
                        );
                    }
                })
            })
            .collect();
        for h in writers.into_iter().chain(readers) {
            h.join().unwrap();
        }
    }
}
