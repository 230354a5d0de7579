//! Image caching infrastructure.
//!
//! This module provides:
//! - Memory caching with LRU eviction
//! - Disk caching with size-bounded, oldest-first eviction
//! - HTTP downloads behind the fetch port
//! - The tiered cache tying the three together

pub mod disk_cache;
pub mod http_fetcher;
pub mod memory_cache;
pub mod tiered_cache;

pub use disk_cache::{DiskEntry, DiskImageCache, SweepReport, default_cache_dir};
pub use http_fetcher::HttpImageFetcher;
pub use memory_cache::{CacheStats, MemoryImageCache};
pub use tiered_cache::{ImageCache, ImageCacheConfig, UsageReport};
