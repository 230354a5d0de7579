//! Domain types for loaded images.

use std::sync::Arc;

use super::CacheKey;

/// A decoded image shared between the memory tier and its consumers.
pub type SharedImage = Arc<image::DynamicImage>;

/// Where an image was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Loaded from the in-memory LRU tier.
    MemoryCache,
    /// Loaded from the disk tier and promoted into memory.
    DiskCache,
    /// Downloaded from the network.
    Network,
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MemoryCache => write!(f, "memory"),
            Self::DiskCache => write!(f, "disk"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// A decoded image together with its key and the tier that served it.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// Cache key of the image.
    pub key: CacheKey,
    /// The decoded image.
    pub image: SharedImage,
    /// Tier that served the image.
    pub source: ImageSource,
}

impl LoadedImage {
    /// Width of the decoded image in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height of the decoded image in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
