//! Main entry point for the paddock cache.
//!
//! This module provides the `Paddock` struct, the primary handle over the
//! tiered knowledge cache.

use once_cell::sync::OnceCell;
use paddock_core::{CacheConfig, Result};
use paddock_pedigree::{PedigreeIndex, RaceFilter, SireStats};
use paddock_store::{CalcStats, ComputationCache, KnowledgeStore, StoreDiagnostics};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// The paddock knowledge cache.
///
/// One explicitly constructed handle owning the whole stack: the lazy
/// [`KnowledgeStore`], a [`ComputationCache`] for callers' per-horse
/// derived results, and a pedigree index built on first use. Create one
/// with [`Paddock::open`] or [`Paddock::builder`] and share it by `Arc`
/// (or clone the inner store handle) — there is no global instance.
///
/// # Example
///
/// ```ignore
/// use paddock::prelude::*;
///
/// let paddock = Paddock::builder()
///     .data_dir("./cache")
///     .source_url("https://cdn.example.com/knowledge.json")
///     .open();
///
/// if let Some(history) = paddock.get_entity("エスポワール") {
///     println!("{} races on record", history.len());
/// }
/// ```
pub struct Paddock {
    store: Arc<KnowledgeStore>,
    calc: ComputationCache<serde_json::Value>,
    pedigree: OnceCell<PedigreeIndex>,
}

impl Paddock {
    /// Open a cache rooted at `data_dir` with default settings and no
    /// remote source (local artifacts only).
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        Self::builder().data_dir(data_dir).open()
    }

    /// Create a builder for cache configuration.
    pub fn builder() -> PaddockBuilder {
        PaddockBuilder::new()
    }

    /// Build a cache over an explicit configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        let calc = ComputationCache::new(config.calc_cache_max_entries, config.calc_log_interval);
        Paddock {
            store: Arc::new(KnowledgeStore::new(config)),
            calc,
            pedigree: OnceCell::new(),
        }
    }

    /// Handle to the underlying knowledge store, for collaborators that
    /// only need raw lookups.
    pub fn store(&self) -> &Arc<KnowledgeStore> {
        &self.store
    }

    /// Idempotently load the dataset. Optional: every read triggers the
    /// load on demand; call this eagerly to pay the cost at startup.
    pub fn ensure_loaded(&self) {
        self.store.ensure_loaded();
    }

    /// A horse's full race history, or `None` if unknown.
    pub fn get_entity(&self, name: &str) -> Option<paddock_core::HorseEntry> {
        self.store.get_entity(name)
    }

    /// Check membership without loading any shard.
    pub fn has_entity(&self, name: &str) -> bool {
        self.store.has_entity(name)
    }

    /// Total number of horses known to the cache.
    pub fn total_count(&self) -> usize {
        self.store.total_count()
    }

    /// Whether usable data is loaded (degraded mode reports `false`).
    pub fn is_loaded(&self) -> bool {
        self.store.is_loaded()
    }

    /// Up to `limit` horse names, for prewarming.
    pub fn sample_names(&self, limit: usize) -> Vec<String> {
        self.store.sample_names(limit)
    }

    /// Memoize a derived result for one horse.
    ///
    /// Runs `compute` on a cache miss and stores the value under `name`
    /// (FIFO-bounded). The computation runs outside the cache lock, so a
    /// slow `compute` never blocks other horses' lookups.
    pub fn cached_result(
        &self,
        name: &str,
        compute: impl FnOnce() -> serde_json::Value,
    ) -> serde_json::Value {
        self.calc.get_or_compute(name, compute)
    }

    /// Drop all memoized derived results and reset the hit counters.
    /// Call after [`refresh`](Paddock::refresh) if derived results must
    /// track the new dataset.
    pub fn clear_cached_results(&self) {
        self.calc.clear();
    }

    /// The pedigree index, built on first use from the full dataset.
    ///
    /// The first call on a cold store is expensive (it assembles the
    /// full in-memory dataset); subsequent calls are free.
    pub fn pedigree(&self) -> &PedigreeIndex {
        self.pedigree
            .get_or_init(|| PedigreeIndex::build(self.store.as_ref()))
    }

    /// Aggregate a sire's offspring performance under `filter`.
    /// `None` means no data, not zero performance.
    pub fn query_sire(&self, name: &str, filter: &RaceFilter) -> Option<SireStats> {
        self.pedigree().query_sire(name, filter)
    }

    /// Aggregate a broodmare sire's offspring performance under `filter`.
    pub fn query_broodmare_sire(&self, name: &str, filter: &RaceFilter) -> Option<SireStats> {
        self.pedigree().query_broodmare_sire(name, filter)
    }

    /// Re-fetch the dataset from the remote source and replace every
    /// storage tier wholesale.
    ///
    /// Memoized derived results and the pedigree index built over the
    /// old dataset are NOT invalidated here; stale derived data is the
    /// host's call (see [`clear_cached_results`]). The pedigree index
    /// reflects the new data only in a freshly constructed `Paddock`.
    ///
    /// [`clear_cached_results`]: Paddock::clear_cached_results
    pub fn refresh(&self) -> Result<()> {
        self.store.refresh()?;
        info!("dataset refreshed from remote source");
        Ok(())
    }

    /// One merged monitoring snapshot. Never triggers loads.
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            store: self.store.diagnostics(),
            calc: self.calc.stats(),
            pedigree_built: self.pedigree.get().is_some(),
        }
    }
}

impl std::fmt::Debug for Paddock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paddock")
            .field("store", &self.store)
            .field("pedigree_built", &self.pedigree.get().is_some())
            .finish()
    }
}

/// Combined monitoring report across all cache tiers.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    /// Storage-tier state (load phase, shard LRU, rebuild meters)
    pub store: StoreDiagnostics,
    /// Derived-result cache counters
    pub calc: CalcStats,
    /// Whether the pedigree index has been built
    pub pedigree_built: bool,
}

/// Builder for cache configuration.
///
/// # Example
///
/// ```ignore
/// let paddock = Paddock::builder()
///     .data_dir("./cache")
///     .source_url("https://cdn.example.com/knowledge.json")
///     .shard_size(750)
///     .max_cached_shards(6)
///     .open();
/// ```
pub struct PaddockBuilder {
    config: CacheConfig,
}

impl PaddockBuilder {
    /// Create a builder seeded from `PADDOCK_*` environment overrides.
    pub fn new() -> Self {
        PaddockBuilder {
            config: CacheConfig::from_env(),
        }
    }

    /// Set the directory holding the mirror and the shard generation.
    pub fn data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.data_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the remote dataset URL. Without one the cache serves local
    /// artifacts only and a [`Paddock::refresh`] fails.
    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.config.source_url = Some(url.into());
        self
    }

    /// Horses per shard file.
    pub fn shard_size(mut self, size: usize) -> Self {
        self.config.shard_size = size;
        self
    }

    /// Bound on in-memory parsed shards.
    pub fn max_cached_shards(mut self, max: usize) -> Self {
        self.config.max_cached_shards = max;
        self
    }

    /// Bound on memoized derived results.
    pub fn calc_cache_max_entries(mut self, max: usize) -> Self {
        self.config.calc_cache_max_entries = max;
        self
    }

    /// Overall download deadline for the remote fetch.
    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.config.download_timeout = timeout;
        self
    }

    /// Connection-establishment deadline for the remote fetch.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Build the cache. No I/O happens until first access.
    pub fn open(self) -> Paddock {
        Paddock::with_config(self.config)
    }
}

impl Default for PaddockBuilder {
    fn default() -> Self {
        Self::new()
    }
}
