//! Tiered image cache: Memory -> Disk -> Network.
//!
//! Memory hits are served without I/O, disk hits are read synchronously and
//! promoted into memory, and misses are downloaded, stored in both tiers and
//! returned. Disk writes and clears run on the blocking pool and are never
//! awaited by the caller. Concurrent fetches of the same locator share a
//! single download, which runs as its own task and completes even when every
//! caller stops waiting for it.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

use crate::domain::entities::{CacheKey, ImageSource, LoadedImage, SharedImage};
use crate::domain::ports::{
    BackgroundTask, CacheError, CacheResult, ImageCachePort, ImageFetchPort,
};

use super::disk_cache::{DEFAULT_MAX_CACHE_SIZE, DiskEntry, DiskImageCache, default_cache_dir};
use super::http_fetcher::{DEFAULT_TIMEOUT_SECS, HttpImageFetcher};
use super::memory_cache::{CacheStats, DEFAULT_CACHE_SIZE, MemoryImageCache};

type InFlight = Shared<BoxFuture<'static, Option<SharedImage>>>;
type InFlightMap = Arc<Mutex<HashMap<CacheKey, InFlight>>>;

/// Configuration for the tiered cache.
#[derive(Debug, Clone)]
pub struct ImageCacheConfig {
    /// Maximum images in the memory tier.
    pub memory_capacity: usize,
    /// Disk usage that triggers an eviction sweep, in bytes.
    pub disk_limit_bytes: u64,
    /// Disk usage a sweep evicts down to. Half the limit when unset.
    pub eviction_target_bytes: Option<u64>,
    /// Directory holding the disk tier.
    pub cache_dir: PathBuf,
    /// Maximum concurrent downloads during a prefetch.
    pub max_concurrent_downloads: usize,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// User agent sent with downloads.
    pub user_agent: String,
}

impl ImageCacheConfig {
    /// Returns the effective eviction target in bytes.
    #[must_use]
    pub fn eviction_target(&self) -> u64 {
        self.eviction_target_bytes
            .unwrap_or(self.disk_limit_bytes / 2)
    }
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            memory_capacity: DEFAULT_CACHE_SIZE,
            disk_limit_bytes: DEFAULT_MAX_CACHE_SIZE,
            eviction_target_bytes: None,
            cache_dir: default_cache_dir(),
            max_concurrent_downloads: 4,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: format!("{}/{}", crate::NAME, crate::VERSION),
        }
    }
}

/// Snapshot of both tiers.
#[derive(Debug, Clone)]
pub struct UsageReport {
    /// Disk tier directory.
    pub directory: PathBuf,
    /// Number of disk entries.
    pub disk_entries: usize,
    /// Total size of the disk entries in bytes.
    pub disk_bytes: u64,
    /// Disk usage that triggers an eviction sweep.
    pub disk_limit_bytes: u64,
    /// Memory tier statistics.
    pub memory: CacheStats,
}

impl std::fmt::Display for UsageReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "directory\t{}", self.directory.display())?;
        writeln!(f, "entries\t{}", self.disk_entries)?;
        writeln!(f, "bytes\t{}/{}", self.disk_bytes, self.disk_limit_bytes)?;
        write!(f, "memory\t{}", self.memory)
    }
}

/// Process-wide image cache backed by a memory tier and a disk tier.
///
/// Cheap to clone; clones share both tiers.
#[derive(Clone)]
pub struct ImageCache {
    inner: Arc<Inner>,
}

struct Inner {
    memory: Arc<MemoryImageCache>,
    disk: Arc<DiskImageCache>,
    fetcher: Arc<dyn ImageFetchPort>,
    in_flight: InFlightMap,
    runtime: Handle,
    max_concurrent_downloads: usize,
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("memory_capacity", &self.inner.memory.capacity())
            .field("disk", &self.inner.disk)
            .finish_non_exhaustive()
    }
}

impl ImageCache {
    /// Creates a cache that downloads through `fetcher`.
    ///
    /// Must be called from within a Tokio runtime; background work is
    /// scheduled on that runtime.
    ///
    /// # Errors
    /// Returns error if no Tokio runtime is running.
    pub fn new(config: &ImageCacheConfig, fetcher: Arc<dyn ImageFetchPort>) -> CacheResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| CacheError::RuntimeError(format!("No Tokio runtime: {e}")))?;

        let disk = DiskImageCache::with_target(
            config.cache_dir.clone(),
            config.disk_limit_bytes,
            config.eviction_target(),
        );

        debug!(
            cache_dir = %config.cache_dir.display(),
            memory_capacity = config.memory_capacity,
            disk_limit = config.disk_limit_bytes,
            "Image cache initialized"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                memory: Arc::new(MemoryImageCache::new(config.memory_capacity)),
                disk: Arc::new(disk),
                fetcher,
                in_flight: Arc::new(Mutex::new(HashMap::new())),
                runtime,
                max_concurrent_downloads: config.max_concurrent_downloads.max(1),
            }),
        })
    }

    /// Creates a cache that downloads over HTTP.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built or no Tokio runtime
    /// is running.
    pub fn with_http(config: &ImageCacheConfig) -> CacheResult<Self> {
        let fetcher = HttpImageFetcher::new(
            Duration::from_secs(config.timeout_secs),
            &config.user_agent,
        )?;
        Self::new(config, Arc::new(fetcher))
    }

    /// Looks an image up in memory, then on disk.
    ///
    /// A disk hit is promoted into memory. Unreadable or undecodable disk
    /// entries are a miss.
    pub fn lookup(&self, locator: &str) -> Option<LoadedImage> {
        self.lookup_key(&CacheKey::from_locator(locator))
    }

    fn lookup_key(&self, key: &CacheKey) -> Option<LoadedImage> {
        if let Some(image) = self.inner.memory.get(key) {
            return Some(LoadedImage {
                key: key.clone(),
                image,
                source: ImageSource::MemoryCache,
            });
        }

        let image = Arc::new(self.inner.disk.get(key)?);
        self.inner.memory.put(key.clone(), image.clone());
        Some(LoadedImage {
            key: key.clone(),
            image,
            source: ImageSource::DiskCache,
        })
    }

    /// Probes the memory tier only, without promoting the entry.
    pub fn peek_memory(&self, locator: &str) -> Option<SharedImage> {
        self.inner.memory.peek(&CacheKey::from_locator(locator))
    }

    /// Stores an image in memory and schedules a PNG-encoded disk write.
    ///
    /// Disk failures are logged and otherwise ignored.
    pub fn store(&self, locator: &str, image: SharedImage) -> BackgroundTask {
        let key = CacheKey::from_locator(locator);
        self.inner.memory.put(key.clone(), image.clone());

        let disk = self.inner.disk.clone();
        self.inner.runtime.spawn_blocking(move || {
            let bytes = match encode_png(&image) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to encode image for disk cache");
                    return;
                }
            };
            if let Err(e) = disk.put_bytes(&key, &bytes) {
                warn!(key = %key, error = %e, "Failed to cache to disk");
            }
        })
    }

    /// Returns the cached image, or downloads, stores and returns it.
    ///
    /// Network, status and decode failures are logged and yield `None`.
    pub async fn fetch(&self, locator: &str) -> Option<LoadedImage> {
        let key = CacheKey::from_locator(locator);
        if let Some(hit) = self.lookup_key(&key) {
            return Some(hit);
        }

        let download = {
            let mut in_flight = self.inner.in_flight.lock();
            // A download may have finished between the lookup and the lock.
            if let Some(image) = self.inner.memory.peek(&key) {
                return Some(LoadedImage {
                    key,
                    image,
                    source: ImageSource::MemoryCache,
                });
            }
            in_flight
                .entry(key.clone())
                .or_insert_with(|| self.spawn_download(key.clone(), locator))
                .clone()
        };

        let image = download.await?;
        Some(LoadedImage {
            key,
            image,
            source: ImageSource::Network,
        })
    }

    /// Starts a download task and returns a handle any number of callers can await.
    ///
    /// Must be called with the in-flight map locked, so the task cannot
    /// release its slot before the slot is filled.
    fn spawn_download(&self, key: CacheKey, locator: &str) -> InFlight {
        let download = Download {
            slot: InFlightSlot {
                key,
                in_flight: self.inner.in_flight.clone(),
            },
            locator: locator.to_string(),
            memory: self.inner.memory.clone(),
            disk: self.inner.disk.clone(),
            fetcher: self.inner.fetcher.clone(),
            runtime: self.inner.runtime.clone(),
        };
        let task = self.inner.runtime.spawn(download.run());

        async move {
            task.await.unwrap_or_else(|e| {
                warn!(error = %e, "Download task failed");
                None
            })
        }
        .boxed()
        .shared()
    }

    /// Empties the memory tier and schedules a disk tier wipe.
    ///
    /// Fetches and stores already in flight may repopulate the disk tier
    /// after the wipe.
    pub fn clear(&self) -> BackgroundTask {
        self.inner.memory.clear();

        let disk = self.inner.disk.clone();
        self.inner.runtime.spawn_blocking(move || {
            if let Err(e) = disk.clear() {
                warn!(error = %e, "Failed to clear disk cache");
            }
        })
    }

    /// Walks the disk tier and returns its total size in bytes.
    #[must_use]
    pub fn current_disk_usage_bytes(&self) -> u64 {
        self.inner.disk.current_usage_bytes()
    }

    /// Fetches every locator not already in memory, in the background.
    ///
    /// Results are discarded and failures only logged. Order is unspecified.
    pub fn prefetch<I, S>(&self, locators: I) -> BackgroundTask
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let locators: Vec<String> = locators.into_iter().map(Into::into).collect();
        let limit = self.inner.max_concurrent_downloads;
        let cache = self.clone();

        self.inner.runtime.spawn(async move {
            let requested = locators.len();
            let warmed = Arc::new(AtomicUsize::new(0));

            stream::iter(locators)
                .for_each_concurrent(limit, |locator| {
                    let cache = cache.clone();
                    let warmed = warmed.clone();
                    async move {
                        if cache.peek_memory(&locator).is_some() {
                            trace!(url = %locator, "Prefetch skipped, already in memory");
                            return;
                        }
                        if cache.fetch(&locator).await.is_some() {
                            warmed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
                .await;

            debug!(
                requested = requested,
                warmed = warmed.load(Ordering::Relaxed),
                "Prefetch complete"
            );
        })
    }

    /// Returns memory tier statistics.
    #[must_use]
    pub fn memory_stats(&self) -> CacheStats {
        self.inner.memory.stats()
    }

    /// Walks the disk tier and reports it alongside the memory statistics.
    #[must_use]
    pub fn usage_report(&self) -> UsageReport {
        let entries = self.inner.disk.entries();
        UsageReport {
            directory: self.inner.disk.cache_dir().to_path_buf(),
            disk_entries: entries.len(),
            disk_bytes: entries.iter().map(|e| e.size).sum(),
            disk_limit_bytes: self.inner.disk.max_size(),
            memory: self.inner.memory.stats(),
        }
    }

    /// Lists disk tier entries, oldest first.
    #[must_use]
    pub fn disk_entries(&self) -> Vec<DiskEntry> {
        self.inner.disk.entries()
    }

    /// Returns the disk tier directory.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        self.inner.disk.cache_dir()
    }
}

#[async_trait]
impl ImageCachePort for ImageCache {
    fn lookup(&self, locator: &str) -> Option<LoadedImage> {
        Self::lookup(self, locator)
    }

    fn store(&self, locator: &str, image: SharedImage) -> BackgroundTask {
        Self::store(self, locator, image)
    }

    async fn fetch(&self, locator: &str) -> Option<LoadedImage> {
        Self::fetch(self, locator).await
    }

    fn clear(&self) -> BackgroundTask {
        Self::clear(self)
    }

    fn current_disk_usage_bytes(&self) -> u64 {
        Self::current_disk_usage_bytes(self)
    }

    fn prefetch(&self, locators: Vec<String>) -> BackgroundTask {
        Self::prefetch(self, locators)
    }
}

/// A single network download, detached from any [`ImageCache`] handle.
struct Download {
    slot: InFlightSlot,
    locator: String,
    memory: Arc<MemoryImageCache>,
    disk: Arc<DiskImageCache>,
    fetcher: Arc<dyn ImageFetchPort>,
    runtime: Handle,
}

impl Download {
    async fn run(self) -> Option<SharedImage> {
        let key = &self.slot.key;
        debug!(key = %key, url = %self.locator, "Downloading image from network");

        match self.download_and_decode().await {
            Ok((image, bytes)) => {
                self.memory.put(key.clone(), image.clone());
                let disk = self.disk.clone();
                let key = key.clone();
                drop(self.runtime.spawn_blocking(move || {
                    if let Err(e) = disk.put_bytes(&key, &bytes) {
                        warn!(key = %key, error = %e, "Failed to cache to disk");
                    }
                }));
                Some(image)
            }
            Err(e) => {
                warn!(key = %key, url = %self.locator, error = %e, "Failed to fetch image");
                None
            }
        }
    }

    async fn download_and_decode(&self) -> CacheResult<(SharedImage, Bytes)> {
        let bytes = self.fetcher.fetch(&self.locator).await?;

        let payload = bytes.clone();
        let decoded = self
            .runtime
            .spawn_blocking(move || image::load_from_memory(&payload))
            .await
            .map_err(|e| CacheError::DecodeError(format!("Decode task panicked: {e}")))?
            .map_err(|e| CacheError::DecodeError(format!("Failed to decode image: {e}")))?;

        Ok((Arc::new(decoded), bytes))
    }
}

/// Frees a key's in-flight entry when the download owning it ends, however it ends.
struct InFlightSlot {
    key: CacheKey,
    in_flight: InFlightMap,
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        let finished = self.in_flight.lock().remove(&self.key);
        // Dropped outside the lock.
        drop(finished);
    }
}

fn encode_png(image: &image::DynamicImage) -> CacheResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| CacheError::EncodeError(format!("Failed to encode PNG: {e}")))?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::mocks::MockImageFetcher;
    use tempfile::TempDir;

    const URL: &str = "https://firebasestorage.googleapis.com/v0/b/philfo/o/posts%2F1.png";

    fn test_config(dir: &TempDir) -> ImageCacheConfig {
        ImageCacheConfig {
            cache_dir: dir.path().join("ImageCache"),
            ..ImageCacheConfig::default()
        }
    }

    fn setup(fetcher: MockImageFetcher) -> (ImageCache, Arc<MockImageFetcher>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = Arc::new(fetcher);
        let cache = ImageCache::new(&test_config(&temp_dir), fetcher.clone()).unwrap();
        (cache, fetcher, temp_dir)
    }

    fn solid(side: u32, shade: u8) -> image::DynamicImage {
        image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            side,
            side,
            image::Rgba([shade, shade / 2, 255 - shade, 255]),
        ))
    }

    fn png(side: u32, shade: u8) -> Vec<u8> {
        encode_png(&solid(side, shade)).unwrap()
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met within 2s");
    }

    #[tokio::test]
    async fn test_store_then_lookup_round_trips() {
        let (cache, _, temp_dir) = setup(MockImageFetcher::new());
        let original = Arc::new(solid(8, 40));

        let write = cache.store(URL, original.clone());
        let hit = cache.lookup(URL).unwrap();
        assert_eq!(hit.source, ImageSource::MemoryCache);
        assert_eq!(hit.image.as_bytes(), original.as_bytes());

        write.await.unwrap();

        // A fresh instance over the same directory only has the disk tier.
        let restarted =
            ImageCache::new(&test_config(&temp_dir), Arc::new(MockImageFetcher::new())).unwrap();
        let hit = restarted.lookup(URL).unwrap();
        assert_eq!(hit.source, ImageSource::DiskCache);
        assert_eq!(hit.image.to_rgba8(), original.to_rgba8());
    }

    #[tokio::test]
    async fn test_lookup_promotes_disk_hit() {
        let (cache, _, _temp) = setup(MockImageFetcher::new());
        cache.clear().await.unwrap();

        let key = CacheKey::from_locator(URL);
        cache.inner.disk.put_bytes(&key, &png(6, 90)).unwrap();
        assert!(cache.peek_memory(URL).is_none());

        let hit = cache.lookup(URL).unwrap();
        assert_eq!(hit.source, ImageSource::DiskCache);
        assert_eq!((hit.width(), hit.height()), (6, 6));

        assert!(cache.peek_memory(URL).is_some());
        assert_eq!(cache.lookup(URL).unwrap().source, ImageSource::MemoryCache);
    }

    #[tokio::test]
    async fn test_lookup_miss() {
        let (cache, fetcher, _temp) = setup(MockImageFetcher::new());
        assert!(cache.lookup(URL).is_none());
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_disk_entry_is_a_miss() {
        let (cache, _, _temp) = setup(MockImageFetcher::new());
        let key = CacheKey::from_locator(URL);
        cache.inner.disk.put_bytes(&key, b"truncated garbage").unwrap();

        assert!(cache.lookup(URL).is_none());
        assert!(cache.peek_memory(URL).is_none());
    }

    #[tokio::test]
    async fn test_fetch_downloads_and_populates_both_tiers() {
        let (cache, fetcher, _temp) = setup(MockImageFetcher::new());
        let payload = png(5, 200);
        fetcher.respond(URL, payload.clone());

        let loaded = cache.fetch(URL).await.unwrap();
        assert_eq!(loaded.source, ImageSource::Network);
        assert_eq!(loaded.width(), 5);
        assert!(cache.peek_memory(URL).is_some());

        let key = CacheKey::from_locator(URL);
        wait_for(|| cache.inner.disk.contains(&key)).await;
        assert_eq!(cache.inner.disk.get_bytes(&key).unwrap(), payload);

        let again = cache.fetch(URL).await.unwrap();
        assert_eq!(again.source, ImageSource::MemoryCache);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_returns_none_and_caches_nothing() {
        let (cache, fetcher, _temp) = setup(MockImageFetcher::new());

        assert!(cache.fetch(URL).await.is_none());
        assert_eq!(fetcher.calls(), 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.peek_memory(URL).is_none());
        assert!(!cache.inner.disk.contains(&CacheKey::from_locator(URL)));
        assert_eq!(cache.current_disk_usage_bytes(), 0);
    }

    #[tokio::test]
    async fn test_fetch_undecodable_payload_returns_none() {
        let (cache, fetcher, _temp) = setup(MockImageFetcher::new());
        fetcher.respond(URL, &b"<html>not found</html>"[..]);

        assert!(cache.fetch(URL).await.is_none());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.peek_memory(URL).is_none());
        assert_eq!(cache.current_disk_usage_bytes(), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_retried() {
        let (cache, fetcher, _temp) = setup(MockImageFetcher::new());

        assert!(cache.fetch(URL).await.is_none());
        fetcher.respond(URL, png(3, 10));
        assert!(cache.fetch(URL).await.is_some());
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_download() {
        let (cache, fetcher, _temp) =
            setup(MockImageFetcher::new().with_delay(Duration::from_millis(50)));
        fetcher.respond(URL, png(4, 120));

        let (first, second) = tokio::join!(cache.fetch(URL), cache.fetch(URL));

        assert!(first.is_some());
        assert!(second.is_some());
        assert_eq!(fetcher.calls(), 1);
        assert!(cache.inner.in_flight.lock().is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_fetch_still_completes() {
        let (cache, fetcher, _temp) =
            setup(MockImageFetcher::new().with_delay(Duration::from_millis(100)));
        fetcher.respond(URL, png(4, 60));

        let abandoned = tokio::time::timeout(Duration::from_millis(10), cache.fetch(URL)).await;
        assert!(abandoned.is_err());

        wait_for(|| cache.peek_memory(URL).is_some()).await;
        wait_for(|| cache.inner.in_flight.lock().is_empty()).await;
        let key = CacheKey::from_locator(URL);
        wait_for(|| cache.inner.disk.contains(&key)).await;
        assert_eq!(fetcher.calls(), 1);

        let inner = Arc::downgrade(&cache.inner);
        drop(cache);
        assert!(inner.upgrade().is_none(), "no task keeps the cache alive");
    }

    #[tokio::test]
    async fn test_abandoned_fetch_is_joined_by_later_fetch() {
        let (cache, fetcher, _temp) =
            setup(MockImageFetcher::new().with_delay(Duration::from_millis(100)));
        fetcher.respond(URL, png(4, 61));

        let abandoned = tokio::time::timeout(Duration::from_millis(10), cache.fetch(URL)).await;
        assert!(abandoned.is_err());

        let loaded = cache.fetch(URL).await.unwrap();
        assert_eq!(loaded.width(), 4);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_dropped_prefetch_handle_still_warms() {
        let (cache, fetcher, _temp) =
            setup(MockImageFetcher::new().with_delay(Duration::from_millis(20)));
        let locators: Vec<String> = (0..3)
            .map(|i| format!("https://example.com/detached/{i}.png"))
            .collect();
        for locator in &locators {
            fetcher.respond(locator, png(2, 9));
        }

        drop(cache.prefetch(locators.clone()));

        wait_for(|| locators.iter().all(|l| cache.peek_memory(l).is_some())).await;
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_usage_report_includes_memory_stats() {
        let (cache, _, _temp) = setup(MockImageFetcher::new());
        cache.store(URL, Arc::new(solid(4, 5))).await.unwrap();

        assert!(cache.lookup(URL).is_some());
        assert!(cache.lookup("https://example.com/missing.png").is_none());

        let report = cache.usage_report();
        assert_eq!(report.disk_entries, 1);
        assert_eq!(report.disk_bytes, cache.current_disk_usage_bytes());
        assert_eq!(report.disk_limit_bytes, 100 * 1024 * 1024);
        assert_eq!((report.memory.hits, report.memory.misses), (1, 1));

        let printed = report.to_string();
        assert!(printed.contains("entries\t1"));
        assert!(printed.contains("memory\tCache: 1 images, 50.0% hit rate"));
    }

    #[tokio::test]
    async fn test_clear_twice_leaves_empty_dir() {
        let (cache, _, _temp) = setup(MockImageFetcher::new());
        cache.store(URL, Arc::new(solid(4, 1))).await.unwrap();
        assert!(cache.current_disk_usage_bytes() > 0);

        cache.clear().await.unwrap();
        cache.clear().await.unwrap();

        assert!(cache.cache_dir().is_dir());
        assert_eq!(std::fs::read_dir(cache.cache_dir()).unwrap().count(), 0);
        assert_eq!(cache.current_disk_usage_bytes(), 0);
        assert!(cache.lookup(URL).is_none());
    }

    #[tokio::test]
    async fn test_clear_empties_memory_immediately() {
        let (cache, _, _temp) = setup(MockImageFetcher::new());
        drop(cache.store(URL, Arc::new(solid(4, 1))));

        let wipe = cache.clear();
        assert!(cache.peek_memory(URL).is_none());
        wipe.await.unwrap();
    }

    #[tokio::test]
    async fn test_prefetch_survives_partial_failure() {
        let (cache, fetcher, _temp) = setup(MockImageFetcher::new());
        let locators: Vec<String> = (0..5)
            .map(|i| format!("https://example.com/business/{i}.png"))
            .collect();
        for (i, locator) in locators.iter().enumerate().take(3) {
            fetcher.respond(locator, png(2, i as u8 * 50));
        }

        cache.prefetch(locators.clone()).await.unwrap();

        for locator in &locators[..3] {
            assert!(cache.peek_memory(locator).is_some(), "{locator} was warmed");
        }
        for locator in &locators[3..] {
            assert!(cache.peek_memory(locator).is_none());
        }
        assert_eq!(fetcher.calls(), 5);
    }

    #[tokio::test]
    async fn test_prefetch_skips_memory_hits() {
        let (cache, fetcher, _temp) = setup(MockImageFetcher::new());
        drop(cache.store(URL, Arc::new(solid(2, 2))));

        cache.prefetch([URL]).await.unwrap();

        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_disk_tier_is_bounded_through_stores() {
        let temp_dir = TempDir::new().unwrap();
        let one_entry = png(16, 7).len() as u64;
        let config = ImageCacheConfig {
            disk_limit_bytes: one_entry * 3,
            ..test_config(&temp_dir)
        };
        let cache = ImageCache::new(&config, Arc::new(MockImageFetcher::new())).unwrap();

        for i in 0..6 {
            let locator = format!("https://example.com/{i}.png");
            cache.store(&locator, Arc::new(solid(16, 7))).await.unwrap();
        }

        assert!(cache.current_disk_usage_bytes() <= config.disk_limit_bytes);
        assert!(!cache.disk_entries().is_empty());
    }

    #[tokio::test]
    async fn test_usable_through_port() {
        let (cache, fetcher, _temp) = setup(MockImageFetcher::new());
        fetcher.respond(URL, png(3, 3));
        let port: Arc<dyn ImageCachePort> = Arc::new(cache.clone());

        assert!(port.fetch(URL).await.is_some());
        assert!(port.lookup(URL).is_some());

        let key = CacheKey::from_locator(URL);
        wait_for(|| cache.inner.disk.contains(&key)).await;
        port.clear().await.unwrap();
        assert!(port.lookup(URL).is_none());
        assert_eq!(port.current_disk_usage_bytes(), 0);
    }

    #[test]
    fn test_new_requires_runtime() {
        let temp_dir = TempDir::new().unwrap();
        let result = ImageCache::new(&test_config(&temp_dir), Arc::new(MockImageFetcher::new()));
        assert!(matches!(result, Err(CacheError::RuntimeError(_))));
    }

    #[test]
    fn test_default_eviction_target_is_half_the_limit() {
        let config = ImageCacheConfig::default();
        assert_eq!(config.disk_limit_bytes, 100 * 1024 * 1024);
        assert_eq!(config.eviction_target(), 50 * 1024 * 1024);
        assert_eq!(config.memory_capacity, 50);
    }
}
