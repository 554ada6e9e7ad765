//! Persistent byte cache for filter-chain intermediates.
//!
//! Each bucket is one file under the cache directory, named by the bucket
//! id (an entry's content hash). The file is a zlib-compressed bincode map
//! from cumulative chain key to bytes:
//!
//! ```text
//! {root}/
//! +-- 3f2a...c1    # bucket for one entry: { key -> bytes, key -> bytes }
//! +-- 9b07...e4
//! ```
//!
//! Validity is time-based: a bucket whose file is older than the caller's
//! `min_mtime` is stale, and a stale bucket is dropped as a whole so later
//! keys of the same entry miss too. Loaded buckets are memoized in memory for
//! the lifetime of the cache handle.
//!
//! Nothing here is fatal. Unreadable or corrupt buckets are misses, and
//! failed writes are logged and forgotten; the work is simply redone on the
//! next build.

use dashmap::DashMap;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Bump when the on-disk bucket layout changes.
const FORMAT_VERSION: u32 = 2;

const TEMP_PREFIX: &str = ".tmp-";

#[derive(Serialize)]
struct BucketFileRef<'a> {
    version: u32,
    entries: &'a BTreeMap<String, Vec<u8>>,
}

#[derive(Deserialize)]
struct BucketFile {
    version: u32,
    entries: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug)]
struct Bucket {
    mtime: SystemTime,
    entries: BTreeMap<String, Vec<u8>>,
}

impl Bucket {
    fn empty() -> Self {
        Self {
            mtime: SystemTime::UNIX_EPOCH,
            entries: BTreeMap::new(),
        }
    }
}

/// Statistics about cache usage
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    /// Buckets currently held in memory
    pub loaded_buckets: usize,
}

impl CacheStats {
    /// Get cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "hits: {} | misses: {} | hit rate: {:.1}% | writes: {}",
            self.hits,
            self.misses,
            self.hit_rate() * 100.0,
            self.writes
        )
    }
}

/// Errors that can occur while reading or writing bucket files
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode cache bucket: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("malformed cache bucket: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("unsupported cache bucket format version {found}")]
    Version { found: u32 },
}

/// On-disk cache rooted at a directory
#[derive(Debug)]
pub struct FileCache {
    root: PathBuf,
    buckets: DashMap<String, Bucket>,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl FileCache {
    /// Open the cache at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::debug!("opened cache at {:?}", root);

        Ok(Self {
            root,
            buckets: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Look up `key` in `bucket`.
    ///
    /// Misses when the bucket is missing or unreadable, when it lacks the key,
    /// or when the bucket was last written before `min_mtime`.
    pub fn get(&self, bucket: &str, key: &str, min_mtime: SystemTime) -> Option<Vec<u8>> {
        let value = self.lookup(bucket, key, min_mtime);

        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("cache hit {}/{}", short(bucket), short(key));
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("cache miss {}/{}", short(bucket), short(key));
        }

        value
    }

    fn lookup(&self, bucket: &str, key: &str, min_mtime: SystemTime) -> Option<Vec<u8>> {
        if !self.buckets.contains_key(bucket) {
            let loaded = self.load(bucket)?;
            self.buckets.entry(bucket.to_string()).or_insert(loaded);
        }

        {
            let loaded = self.buckets.get(bucket)?;
            if loaded.mtime >= min_mtime {
                return loaded.entries.get(key).cloned();
            }
        }

        tracing::debug!("cache bucket {} is stale, dropping it", short(bucket));
        self.remove(bucket);
        None
    }

    /// Store `value` under `key` in `bucket` and hand it back.
    ///
    /// The bucket file is replaced atomically. Write failures are logged.
    pub fn set(&self, bucket: &str, key: &str, value: Vec<u8>) -> Vec<u8> {
        let mut slot = self
            .buckets
            .entry(bucket.to_string())
            .or_insert_with(|| self.load(bucket).unwrap_or_else(Bucket::empty));

        slot.entries.insert(key.to_string(), value.clone());

        match self.write_bucket(bucket, &slot.entries) {
            Ok(mtime) => {
                slot.mtime = mtime;
                self.writes.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                tracing::warn!("failed to write cache bucket {}: {}", short(bucket), err);
                // Keep serving this build from memory.
                slot.mtime = SystemTime::now();
            }
        }

        value
    }

    /// Last write time of `bucket`, if it exists
    pub fn mtime(&self, bucket: &str) -> Option<SystemTime> {
        if let Some(loaded) = self.buckets.get(bucket) {
            return Some(loaded.mtime);
        }
        fs::metadata(self.bucket_path(bucket))
            .and_then(|m| m.modified())
            .ok()
    }

    /// Delete one bucket
    pub fn remove(&self, bucket: &str) {
        self.buckets.remove(bucket);
        match fs::remove_file(self.bucket_path(bucket)) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => tracing::warn!("failed to remove cache bucket {}: {}", short(bucket), err),
        }
    }

    /// Delete every bucket and reset statistics
    pub fn clear(&self) -> Result<(), CacheError> {
        self.buckets.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);

        match fs::remove_dir_all(&self.root) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        fs::create_dir_all(&self.root)?;
        tracing::info!("cleared cache at {:?}", self.root);
        Ok(())
    }

    /// Names of all buckets on disk
    pub fn buckets(&self) -> Vec<String> {
        let Ok(dir) = fs::read_dir(&self.root) else {
            return Vec::new();
        };

        let mut names: Vec<String> = dir
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();
        names
    }

    /// Remove every bucket not in `live`; returns how many were removed
    pub fn sweep(&self, live: &HashSet<String>) -> usize {
        let mut removed = 0;
        for name in self.buckets() {
            if !live.contains(&name) {
                tracing::debug!("removing orphaned cache bucket {}", short(&name));
                self.remove(&name);
                removed += 1;
            }
        }
        removed
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            loaded_buckets: self.buckets.len(),
        }
    }

    fn bucket_path(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    fn load(&self, bucket: &str) -> Option<Bucket> {
        let path = self.bucket_path(bucket);
        let mtime = fs::metadata(&path).and_then(|m| m.modified()).ok()?;

        match read_bucket(&path) {
            Ok(entries) => Some(Bucket { mtime, entries }),
            Err(err) => {
                tracing::debug!("ignoring unreadable cache bucket {}: {}", short(bucket), err);
                None
            }
        }
    }

    fn write_bucket(
        &self,
        bucket: &str,
        entries: &BTreeMap<String, Vec<u8>>,
    ) -> Result<SystemTime, CacheError> {
        let payload = bincode::serde::encode_to_vec(
            &BucketFileRef {
                version: FORMAT_VERSION,
                entries,
            },
            bincode::config::standard(),
        )?;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload)?;
        let compressed = encoder.finish()?;

        fs::create_dir_all(&self.root)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.root)?;
        tmp.write_all(&compressed)?;

        let file = tmp
            .persist(self.bucket_path(bucket))
            .map_err(|e| CacheError::Io(e.error))?;
        Ok(file.metadata()?.modified()?)
    }
}

fn read_bucket(path: &Path) -> Result<BTreeMap<String, Vec<u8>>, CacheError> {
    let file = fs::File::open(path)?;
    let mut payload = Vec::new();
    ZlibDecoder::new(file).read_to_end(&mut payload)?;

    let (parsed, _): (BucketFile, usize) =
        bincode::serde::decode_from_slice(&payload, bincode::config::standard())?;
    if parsed.version != FORMAT_VERSION {
        return Err(CacheError::Version {
            found: parsed.version,
        });
    }
    Ok(parsed.entries)
}

fn short(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn open(tmp: &TempDir) -> FileCache {
        FileCache::open(tmp.path().join("cache")).unwrap()
    }

    #[test]
    fn test_round_trip_across_reopen() {
        let tmp = TempDir::new().unwrap();

        let cache = open(&tmp);
        let stored = cache.set("bucket", "key", b"<p>hello</p>".to_vec());
        assert_eq!(stored, b"<p>hello</p>");
        drop(cache);

        let cache = open(&tmp);
        assert_eq!(
            cache.get("bucket", "key", SystemTime::UNIX_EPOCH),
            Some(b"<p>hello</p>".to_vec())
        );
    }

    #[test]
    fn test_newer_source_invalidates() {
        let tmp = TempDir::new().unwrap();
        let cache = open(&tmp);
        cache.set("bucket", "key", b"value".to_vec());

        let future = SystemTime::now() + Duration::from_secs(3600);
        assert_eq!(cache.get("bucket", "key", future), None);
    }

    #[test]
    fn test_stale_bucket_is_dropped_whole() {
        let tmp = TempDir::new().unwrap();
        let cache = open(&tmp);
        cache.set("bucket", "first", b"1".to_vec());
        cache.set("bucket", "second", b"2".to_vec());

        let future = SystemTime::now() + Duration::from_secs(3600);
        assert_eq!(cache.get("bucket", "first", future), None);

        // Even an old min_mtime cannot revive the dropped bucket
        assert_eq!(cache.get("bucket", "second", SystemTime::UNIX_EPOCH), None);
        assert!(cache.buckets().is_empty());
    }

    #[test]
    fn test_multiple_keys_share_a_bucket() {
        let tmp = TempDir::new().unwrap();
        let cache = open(&tmp);
        cache.set("bucket", "a", b"alpha".to_vec());
        cache.set("bucket", "b", b"beta".to_vec());

        let cache = open(&tmp);
        assert_eq!(cache.get("bucket", "a", SystemTime::UNIX_EPOCH), Some(b"alpha".to_vec()));
        assert_eq!(cache.get("bucket", "b", SystemTime::UNIX_EPOCH), Some(b"beta".to_vec()));
        assert_eq!(cache.buckets(), vec!["bucket".to_string()]);
    }

    #[test]
    fn test_missing_bucket_and_key() {
        let tmp = TempDir::new().unwrap();
        let cache = open(&tmp);
        assert_eq!(cache.get("nope", "key", SystemTime::UNIX_EPOCH), None);

        cache.set("bucket", "key", b"v".to_vec());
        assert_eq!(cache.get("bucket", "other", SystemTime::UNIX_EPOCH), None);
    }

    #[test]
    fn test_corrupt_bucket_is_a_miss() {
        let tmp = TempDir::new().unwrap();
        let cache = open(&tmp);
        fs::write(cache.root().join("bucket"), b"not zlib at all").unwrap();

        assert_eq!(cache.get("bucket", "key", SystemTime::UNIX_EPOCH), None);

        // A later write replaces the corrupt file
        cache.set("bucket", "key", b"fresh".to_vec());
        let cache = open(&tmp);
        assert_eq!(cache.get("bucket", "key", SystemTime::UNIX_EPOCH), Some(b"fresh".to_vec()));
    }

    #[test]
    fn test_binary_values() {
        let tmp = TempDir::new().unwrap();
        let cache = open(&tmp);
        let data = vec![0x00, 0x01, 0x0A, 0x0D, 0xFF, 0xFE, 0x80, 0x7F];
        cache.set("bucket", "bin", data.clone());

        let cache = open(&tmp);
        assert_eq!(cache.get("bucket", "bin", SystemTime::UNIX_EPOCH), Some(data));
    }

    #[test]
    fn test_mtime_tracks_writes() {
        let tmp = TempDir::new().unwrap();
        let cache = open(&tmp);
        assert_eq!(cache.mtime("bucket"), None);

        let before = SystemTime::now() - Duration::from_secs(5);
        cache.set("bucket", "key", b"v".to_vec());
        let mtime = cache.mtime("bucket").unwrap();
        assert!(mtime >= before);

        let reopened = open(&tmp);
        assert_eq!(reopened.mtime("bucket"), Some(mtime));
    }

    #[test]
    fn test_remove_and_clear() {
        let tmp = TempDir::new().unwrap();
        let cache = open(&tmp);
        cache.set("one", "k", b"1".to_vec());
        cache.set("two", "k", b"2".to_vec());

        cache.remove("one");
        assert_eq!(cache.get("one", "k", SystemTime::UNIX_EPOCH), None);
        assert_eq!(cache.buckets(), vec!["two".to_string()]);

        cache.clear().unwrap();
        assert!(cache.buckets().is_empty());
        assert!(cache.root().exists());
        assert_eq!(cache.get("two", "k", SystemTime::UNIX_EPOCH), None);
    }

    #[test]
    fn test_sweep_removes_orphans() {
        let tmp = TempDir::new().unwrap();
        let cache = open(&tmp);
        cache.set("live", "k", b"1".to_vec());
        cache.set("orphan", "k", b"2".to_vec());

        let live: HashSet<String> = ["live".to_string()].into_iter().collect();
        assert_eq!(cache.sweep(&live), 1);
        assert_eq!(cache.buckets(), vec!["live".to_string()]);
        assert_eq!(cache.sweep(&live), 0);
    }

    #[test]
    fn test_stats() {
        let tmp = TempDir::new().unwrap();
        let cache = open(&tmp);
        cache.set("bucket", "key", b"v".to_vec());
        let _ = cache.get("bucket", "key", SystemTime::UNIX_EPOCH);
        let _ = cache.get("bucket", "missing", SystemTime::UNIX_EPOCH);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bucket_payload_stays_close_to_value_size() {
        let tmp = TempDir::new().unwrap();
        let cache = open(&tmp);
        let value: Vec<u8> = (0..4096u32).map(|i| (i * 7 % 251) as u8).collect();
        cache.set("bucket", "key", value.clone());

        let file = fs::File::open(cache.root().join("bucket")).unwrap();
        let mut payload = Vec::new();
        ZlibDecoder::new(file).read_to_end(&mut payload).unwrap();
        assert!(payload.len() < value.len() + 128, "payload is {} bytes", payload.len());
    }

    #[test]
    fn test_buckets_skips_temp_files() {
        let tmp = TempDir::new().unwrap();
        let cache = open(&tmp);
        fs::write(cache.root().join(".tmp-leftover"), b"partial").unwrap();
        cache.set("bucket", "k", b"v".to_vec());

        assert_eq!(cache.buckets(), vec!["bucket".to_string()]);
    }
}
