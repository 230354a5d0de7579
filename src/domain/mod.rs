//! Domain layer with cache entities and port definitions.

/// Entity definitions.
pub mod entities;
/// Port definitions.
pub mod ports;

pub use entities::{CacheKey, ImageSource, LoadedImage, SharedImage};
pub use ports::{CacheError, CacheResult, ImageCachePort, ImageFetchPort};
