mod image_cache_port;
mod image_fetch_port;

pub use image_cache_port::{BackgroundTask, CacheError, CacheResult, ImageCachePort};
pub use image_fetch_port::ImageFetchPort;
