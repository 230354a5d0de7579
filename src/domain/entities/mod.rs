//! Domain entity definitions.

mod cache_key;
mod loaded_image;

pub use cache_key::CacheKey;
pub use loaded_image::{ImageSource, LoadedImage, SharedImage};
