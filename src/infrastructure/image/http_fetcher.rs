//! HTTP adapter for the image fetch port.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use tracing::trace;

use crate::domain::ports::{CacheError, CacheResult, ImageFetchPort};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Downloads images with a shared `reqwest` client.
///
/// Only `200 OK` counts as success.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    /// Creates a fetcher with the given timeout and user agent.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(timeout: Duration, user_agent: &str) -> CacheResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| CacheError::NetworkError(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetchPort for HttpImageFetcher {
    async fn fetch(&self, locator: &str) -> CacheResult<Bytes> {
        let response = self
            .client
            .get(locator)
            .send()
            .await
            .map_err(|e| CacheError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(CacheError::NetworkError(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CacheError::NetworkError(format!("Failed to read body: {e}")))?;

        trace!(url = %locator, size = bytes.len(), "Downloaded image payload");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> HttpImageFetcher {
        HttpImageFetcher::new(Duration::from_secs(2), "philcache-test").unwrap()
    }

    #[tokio::test]
    async fn test_invalid_locator_is_network_error() {
        let result = fetcher().fetch("not a url").await;
        assert!(matches!(result, Err(CacheError::NetworkError(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Port 1 on loopback has no listener.
        let result = fetcher().fetch("http://127.0.0.1:1/image.png").await;
        assert!(matches!(result, Err(CacheError::NetworkError(_))));
    }
}
