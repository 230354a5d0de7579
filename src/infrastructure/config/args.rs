use super::app_config::LogLevel;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "philcache",
    version,
    about = "Tiered memory and disk image cache for Philfomation",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH", global = true)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Disk cache directory.
    #[arg(long, value_name = "PATH", env = "PHILCACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Maximum number of images held in memory.
    #[arg(long, value_name = "COUNT", global = true)]
    pub memory_capacity: Option<usize>,

    /// Disk usage that triggers eviction, in bytes.
    #[arg(long, value_name = "BYTES", global = true)]
    pub disk_limit: Option<u64>,

    /// Request timeout in seconds.
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Maximum concurrent downloads while prefetching.
    #[arg(long, value_name = "COUNT", global = true)]
    pub concurrency: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

/// Cache operations exposed on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Fetch images through the cache and report which tier served them.
    Fetch {
        /// Image URLs.
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Warm the cache for a batch of images.
    Prefetch {
        /// Image URLs.
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Look an image up without touching the network.
    Lookup {
        /// Image URL.
        url: String,
    },
    /// Print the cache key (and disk file name) for a URL.
    Key {
        /// Image URL.
        url: String,
    },
    /// Report disk usage.
    Usage,
    /// List disk entries, oldest first.
    List,
    /// Remove every cached image.
    Clear,
}
