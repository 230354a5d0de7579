//! Port definition for image caching.

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::domain::entities::{LoadedImage, SharedImage};

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Handle to work the cache scheduled in the background.
///
/// Awaiting it is optional; dropping it does not cancel the work.
pub type BackgroundTask = JoinHandle<()>;

/// Errors that can occur during cache operations.
///
/// These never escape the [`ImageCachePort`] surface; they are reported by the
/// lower-level tiers and the fetcher and logged by the cache.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// Failed to decode image.
    #[error("Decode error: {0}")]
    DecodeError(String),
    /// Failed to encode image for the disk tier.
    #[error("Encode error: {0}")]
    EncodeError(String),
    /// I/O error during cache operation.
    #[error("IO error: {0}")]
    IoError(String),
    /// Network error during download.
    #[error("Network error: {0}")]
    NetworkError(String),
    /// No async runtime to schedule background work on.
    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

/// Port for tiered image caching.
///
/// Implementations must be thread-safe. None of the operations fail: disk
/// and network problems degrade to a miss or a no-op.
#[async_trait]
pub trait ImageCachePort: Send + Sync {
    /// Looks the image up in memory, then on disk. Disk hits are promoted
    /// into memory.
    fn lookup(&self, locator: &str) -> Option<LoadedImage>;

    /// Stores an image in memory now and on disk in the background.
    fn store(&self, locator: &str, image: SharedImage) -> BackgroundTask;

    /// Returns the cached image or downloads, stores and returns it.
    async fn fetch(&self, locator: &str) -> Option<LoadedImage>;

    /// Empties the memory tier now and the disk tier in the background.
    fn clear(&self) -> BackgroundTask;

    /// Returns the total size of the disk tier in bytes.
    fn current_disk_usage_bytes(&self) -> u64;

    /// Warms both tiers for every locator not already in memory.
    fn prefetch(&self, locators: Vec<String>) -> BackgroundTask;
}
