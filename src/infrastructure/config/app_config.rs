//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::args::CliArgs;
use super::storage::ConfigError;
use crate::infrastructure::image::disk_cache::{DEFAULT_MAX_CACHE_SIZE, default_cache_dir};
use crate::infrastructure::image::memory_cache::DEFAULT_CACHE_SIZE;
use crate::infrastructure::image::{ImageCacheConfig, http_fetcher::DEFAULT_TIMEOUT_SECS};

pub(crate) const APP_NAME: &str = "philcache";
pub(crate) const APP_QUALIFIER: &str = "com";
pub(crate) const APP_ORGANIZATION: &str = "philfomation";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration, read from `config.toml` and overridden by CLI flags.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log file path. Logs go to stderr when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Cache tier configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Download configuration.
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Cache tier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of decoded images kept in memory.
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,

    /// Disk usage that triggers an eviction sweep, in bytes.
    #[serde(default = "default_disk_limit_bytes")]
    pub disk_limit_bytes: u64,

    /// Disk usage a sweep evicts down to. Defaults to half the limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eviction_target_bytes: Option<u64>,

    /// Disk tier directory. Defaults to `<platform cache dir>/ImageCache`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_capacity: default_memory_capacity(),
            disk_limit_bytes: default_disk_limit_bytes(),
            eviction_target_bytes: None,
            directory: None,
        }
    }
}

/// Download configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum concurrent downloads during a prefetch.
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,

    /// User agent sent with downloads.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_concurrent_downloads: default_max_concurrent_downloads(),
            user_agent: default_user_agent(),
        }
    }
}

const fn default_memory_capacity() -> usize {
    DEFAULT_CACHE_SIZE
}

const fn default_disk_limit_bytes() -> u64 {
    DEFAULT_MAX_CACHE_SIZE
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

const fn default_max_concurrent_downloads() -> usize {
    4
}

fn default_user_agent() -> String {
    format!("{}/{}", crate::NAME, crate::VERSION)
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(cache_dir) = &args.cache_dir {
            self.cache.directory = Some(cache_dir.clone());
        }
        if let Some(memory_capacity) = args.memory_capacity {
            self.cache.memory_capacity = memory_capacity;
        }
        if let Some(disk_limit) = args.disk_limit {
            self.cache.disk_limit_bytes = disk_limit;
        }
        if let Some(timeout) = args.timeout {
            self.network.timeout_secs = timeout;
        }
        if let Some(concurrency) = args.concurrency {
            self.network.max_concurrent_downloads = concurrency;
        }
    }

    /// Checks values that would make the cache unusable.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.memory_capacity == 0 {
            return Err(ConfigError::Invalid(
                "cache.memory_capacity must be at least 1".to_string(),
            ));
        }
        if self.cache.disk_limit_bytes == 0 {
            return Err(ConfigError::Invalid(
                "cache.disk_limit_bytes must be at least 1".to_string(),
            ));
        }
        if let Some(target) = self.cache.eviction_target_bytes
            && target > self.cache.disk_limit_bytes
        {
            return Err(ConfigError::Invalid(format!(
                "cache.eviction_target_bytes ({target}) exceeds cache.disk_limit_bytes ({})",
                self.cache.disk_limit_bytes
            )));
        }
        if self.network.max_concurrent_downloads == 0 {
            return Err(ConfigError::Invalid(
                "network.max_concurrent_downloads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the cache configuration, resolving the default directory.
    #[must_use]
    pub fn image_cache_config(&self) -> ImageCacheConfig {
        ImageCacheConfig {
            memory_capacity: self.cache.memory_capacity,
            disk_limit_bytes: self.cache.disk_limit_bytes,
            eviction_target_bytes: self.cache.eviction_target_bytes,
            cache_dir: self.cache.directory.clone().unwrap_or_else(default_cache_dir),
            max_concurrent_downloads: self.network.max_concurrent_downloads,
            timeout_secs: self.network.timeout_secs,
            user_agent: self.network.user_agent.clone(),
        }
    }
}
