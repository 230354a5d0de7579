//! Philcache - tiered image cache for the Philfomation community app.
//!
//! Images are addressed by URL and served from a bounded in-memory LRU tier,
//! a byte-bounded disk tier, or the network, in that order.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Domain layer containing entities and port definitions.
pub mod domain;
/// Infrastructure layer containing the cache tiers and adapters.
pub mod infrastructure;

pub use domain::{CacheKey, ImageCachePort, ImageSource, LoadedImage};
pub use infrastructure::{ImageCache, ImageCacheConfig};

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "philcache";
