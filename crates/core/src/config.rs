//! Configuration for the knowledge cache.
//!
//! All knobs have the deployment defaults baked in; `from_env` layers the
//! operational overrides the hosting environment sets.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Recognized configuration options for the cache tiers.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding the full-cache mirror and the shard directory
    pub data_dir: PathBuf,

    /// Remote source URL for the dataset blob, if any
    pub source_url: Option<String>,

    /// Maximum horses per shard file
    pub shard_size: usize,

    /// Maximum parsed shards held in memory (LRU)
    pub max_cached_shards: usize,

    /// Maximum entries in the computation cache (FIFO)
    pub calc_cache_max_entries: usize,

    /// Log a computation-cache summary every this many requests
    pub calc_log_interval: u64,

    /// Overall wall-clock deadline for the remote download
    pub download_timeout: Duration,

    /// TCP connect timeout for the remote download
    pub connect_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            data_dir: PathBuf::from("data"),
            source_url: None,
            shard_size: 750,
            max_cached_shards: 6,
            calc_cache_max_entries: 500,
            calc_log_interval: 20,
            download_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl CacheConfig {
    /// Defaults plus environment overrides:
    /// `PADDOCK_SHARD_SIZE`, `PADDOCK_SHARD_CACHE`,
    /// `PADDOCK_CALC_CACHE_SIZE`, `PADDOCK_DOWNLOAD_TIMEOUT` (seconds).
    /// Unparsable values fall back to the default rather than failing
    /// startup.
    pub fn from_env() -> Self {
        let mut config = CacheConfig::default();
        if let Some(v) = env_usize("PADDOCK_SHARD_SIZE") {
            config.shard_size = v;
        }
        if let Some(v) = env_usize("PADDOCK_SHARD_CACHE") {
            config.max_cached_shards = v;
        }
        if let Some(v) = env_usize("PADDOCK_CALC_CACHE_SIZE") {
            config.calc_cache_max_entries = v;
        }
        if let Some(v) = env_usize("PADDOCK_DOWNLOAD_TIMEOUT") {
            config.download_timeout = Duration::from_secs(v as u64);
        }
        config
    }

    /// Path of the full-cache JSON mirror.
    pub fn full_cache_path(&self) -> PathBuf {
        self.data_dir.join("knowledge.json")
    }

    /// Directory holding the shard files and `index.json`.
    pub fn shard_dir(&self) -> PathBuf {
        self.data_dir.join("shards")
    }

    /// Path of the shard index file.
    pub fn index_path(&self) -> PathBuf {
        self.shard_dir().join("index.json")
    }
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
