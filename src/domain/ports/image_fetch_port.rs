//! Port for downloading image payloads.

use async_trait::async_trait;
use bytes::Bytes;

use super::CacheResult;

/// Port for fetching raw image bytes by locator.
///
/// Implementations return `Err` for anything but a successful response; the
/// payload is not validated as an image here.
#[async_trait]
pub trait ImageFetchPort: Send + Sync {
    /// Downloads the payload behind `locator`.
    async fn fetch(&self, locator: &str) -> CacheResult<Bytes>;
}
