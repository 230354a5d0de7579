//! Infrastructure layer with the cache tiers and their adapters.

/// Application configuration.
pub mod config;
/// Image caching (memory tier, disk tier, HTTP downloads).
pub mod image;

pub use config::{AppConfig, CliArgs, Command, ConfigError, LogLevel, StorageManager};
pub use image::{
    CacheStats, DiskEntry, DiskImageCache, HttpImageFetcher, ImageCache, ImageCacheConfig,
    MemoryImageCache, UsageReport,
};
