//! Disk-based image tier for persistence across sessions.
//!
//! One file per image, named by its [`CacheKey`], no extension and no index.
//! Writes go through a dot-prefixed temp file that is renamed into place, so
//! readers only ever see complete entries. Every write is followed by an
//! eviction sweep that removes the least recently modified entries once the
//! directory grows past its byte limit.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, trace, warn};

use crate::domain::entities::CacheKey;
use crate::domain::ports::{CacheError, CacheResult};

/// Maximum disk cache size in bytes (100 MiB default).
pub const DEFAULT_MAX_CACHE_SIZE: u64 = 100 * 1024 * 1024;

/// Name of the cache directory inside the platform cache dir.
pub const CACHE_DIR_NAME: &str = "ImageCache";

const TEMP_PREFIX: &str = ".tmp";

/// A file in the disk tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskEntry {
    /// Key the file is named after.
    pub key: CacheKey,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
}

/// Outcome of an eviction sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Bytes removed.
    pub freed_bytes: u64,
    /// Files removed.
    pub freed_count: usize,
}

/// Disk-based image cache that persists encoded image bytes.
#[derive(Debug)]
pub struct DiskImageCache {
    cache_dir: PathBuf,
    max_size: u64,
    target_size: u64,
}

impl DiskImageCache {
    /// Creates a disk cache in `cache_dir` bounded by `max_size` bytes.
    ///
    /// Sweeps evict down to half of `max_size`. The directory is created if
    /// missing; failure to do so is logged and every later read misses.
    #[must_use]
    pub fn new(cache_dir: PathBuf, max_size: u64) -> Self {
        Self::with_target(cache_dir, max_size, max_size / 2)
    }

    /// Creates a disk cache whose sweeps evict down to `target_size` bytes.
    ///
    /// `target_size` is clamped to `max_size`.
    #[must_use]
    pub fn with_target(cache_dir: PathBuf, max_size: u64, target_size: u64) -> Self {
        if let Err(e) = fs::create_dir_all(&cache_dir) {
            warn!(path = %cache_dir.display(), error = %e, "Failed to create cache dir");
        }
        Self {
            cache_dir,
            max_size,
            target_size: target_size.min(max_size),
        }
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the byte limit that triggers a sweep.
    #[must_use]
    pub const fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Returns the size a sweep evicts down to.
    #[must_use]
    pub const fn target_size(&self) -> u64 {
        self.target_size
    }

    /// Returns the path for a cached image.
    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(key.as_str())
    }

    /// Gets raw image bytes from disk.
    pub fn get_bytes(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let path = self.entry_path(key);
        match fs::read(&path) {
            Ok(bytes) => {
                trace!(key = %key, path = %path.display(), "Disk cache hit");
                Some(bytes)
            }
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    warn!(key = %key, error = %e, "Failed to read disk cache entry");
                }
                trace!(key = %key, "Disk cache miss");
                None
            }
        }
    }

    /// Loads and decodes an image from disk.
    ///
    /// Entries that fail to decode are treated as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<image::DynamicImage> {
        let bytes = self.get_bytes(key)?;
        match image::load_from_memory(&bytes) {
            Ok(img) => {
                debug!(key = %key, "Decoded image from disk cache");
                Some(img)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to decode cached image");
                None
            }
        }
    }

    /// Stores raw bytes and runs an eviction sweep.
    ///
    /// # Errors
    /// Returns error if the temp file cannot be written or renamed into place.
    pub fn put_bytes(&self, key: &CacheKey, bytes: &[u8]) -> CacheResult<()> {
        // A concurrent clear may have removed the directory.
        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| CacheError::IoError(format!("Failed to create cache dir: {e}")))?;

        let mut temp_file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.cache_dir)
            .map_err(|e| CacheError::IoError(format!("Failed to create temp file: {e}")))?;

        temp_file
            .write_all(bytes)
            .map_err(|e| CacheError::IoError(format!("Failed to write cache file: {e}")))?;

        let path = self.entry_path(key);
        temp_file
            .persist(&path)
            .map_err(|e| CacheError::IoError(format!("Failed to persist cache file: {}", e.error)))?;

        debug!(key = %key, path = %path.display(), size = bytes.len(), "Stored image in disk cache");

        self.sweep_if_needed();

        Ok(())
    }

    /// Checks if an image is cached.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entry_path(key).is_file()
    }

    /// Lists every cache entry, oldest first.
    ///
    /// Temp files and names that are not cache keys are skipped. Entries
    /// modified at the same instant are ordered by key.
    #[must_use]
    pub fn entries(&self) -> Vec<DiskEntry> {
        let Ok(dir) = fs::read_dir(&self.cache_dir) else {
            return Vec::new();
        };

        let mut entries: Vec<DiskEntry> = dir
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let key = CacheKey::from_file_name(entry.file_name().to_str()?)?;
                let meta = entry.metadata().ok()?;
                if !meta.is_file() {
                    return None;
                }
                Some(DiskEntry {
                    key,
                    size: meta.len(),
                    modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                })
            })
            .collect();

        entries.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.key.cmp(&b.key)));
        entries
    }

    /// Returns the total size of all entries in bytes.
    #[must_use]
    pub fn current_usage_bytes(&self) -> u64 {
        self.entries().iter().map(|e| e.size).sum()
    }

    /// Removes the oldest entries once usage exceeds the byte limit.
    ///
    /// Deletes oldest first until the bytes removed reach the overshoot
    /// above the target size. Removal failures are logged and skipped.
    pub fn sweep_if_needed(&self) -> SweepReport {
        self.evict_oldest(self.entries())
    }

    /// Evicts from a listing taken by [`DiskImageCache::entries`].
    ///
    /// The listing may be stale when sweeps overlap. An entry that is already
    /// gone still counts toward the overshoot, so overlapping sweeps do not
    /// evict past the target.
    fn evict_oldest(&self, entries: Vec<DiskEntry>) -> SweepReport {
        let current_size: u64 = entries.iter().map(|e| e.size).sum();
        if current_size <= self.max_size {
            return SweepReport::default();
        }

        debug!(
            current_size = current_size,
            max_size = self.max_size,
            target_size = self.target_size,
            "Disk cache over limit, cleaning up"
        );

        let overshoot = current_size - self.target_size;
        let mut accounted = 0u64;
        let mut report = SweepReport::default();

        for entry in entries {
            if accounted >= overshoot {
                break;
            }

            let path = self.entry_path(&entry.key);
            match fs::remove_file(&path) {
                Ok(()) => {
                    trace!(path = %path.display(), "Removed old cache file");
                    accounted += entry.size;
                    report.freed_bytes += entry.size;
                    report.freed_count += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    trace!(path = %path.display(), "Cache file already removed");
                    accounted += entry.size;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove old cache file");
                }
            }
        }

        debug!(
            freed_size = report.freed_bytes,
            freed_count = report.freed_count,
            "Disk cache cleanup complete"
        );

        report
    }

    /// Deletes the cache directory and recreates it empty.
    ///
    /// # Errors
    /// Returns error if the directory cannot be recreated.
    pub fn clear(&self) -> CacheResult<()> {
        match fs::remove_dir_all(&self.cache_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.cache_dir.display(), error = %e, "Failed to remove cache dir");
            }
        }

        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| CacheError::IoError(format!("Failed to recreate cache dir: {e}")))?;

        debug!("Cleared disk cache");
        Ok(())
    }
}

/// Returns the default cache directory path.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "philfomation", "philcache").map_or_else(
        || std::env::temp_dir().join("philcache").join(CACHE_DIR_NAME),
        |dirs| dirs.cache_dir().join(CACHE_DIR_NAME),
    )
}
