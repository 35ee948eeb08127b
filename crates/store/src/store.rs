//! Knowledge store: the facade over the tiered storage.
//!
//! Lifecycle: `Uninitialized -> IndexOnly -> FullyResident`. The first
//! caller that needs data performs the load (index file if present, else
//! full dataset from the local mirror or the remote source); everyone
//! else either takes the lock-free fast path or blocks on the state lock
//! and observes the completed load.
//!
//! # Thread Safety
//!
//! Two locks, always acquired in this order and never reversed:
//! 1. `state` -- index / resident dataset / load bookkeeping. Doubles as
//!    the load lock: holding it through a cold load is what guarantees
//!    at most one thread fetches.
//! 2. `shards` -- the LRU of parsed shard files.
//!
//! The `loaded` flag is the published end of the double-checked load:
//! set with `Release` after the state is installed, read with `Acquire`
//! on the fast path.

use crate::fetch::Fetcher;
use crate::shard::{self, ShardMap};
use crate::shard_cache::ShardLru;
use chrono::{DateTime, Utc};
use paddock_core::{CacheConfig, Dataset, Error, HorseEntry, Result, ShardIndex};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Load state of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadPhase {
    /// Nothing loaded yet; first access triggers the load
    Uninitialized,
    /// Shard index in memory, shards paged in on demand
    IndexOnly,
    /// Full dataset resident in memory
    FullyResident,
}

/// Diagnostics snapshot for monitoring.
///
/// Reading this never loads shards or reconstructs the dataset.
#[derive(Debug, Clone, Serialize)]
pub struct StoreDiagnostics {
    /// Horses known to the store (index size when available)
    pub total_entities: usize,
    /// Current load phase
    pub phase: LoadPhase,
    /// Whether the shard index is in memory
    pub index_loaded: bool,
    /// Shards currently held by the LRU
    pub loaded_shards: usize,
    /// LRU bound
    pub max_cached_shards: usize,
    /// Total horses across cached shards
    pub cached_entities_estimate: usize,
    /// Times the expensive shards-to-full-map assembly ran
    pub full_view_builds: u64,
    /// Times a stale index forced a rebuild-and-retry
    pub missing_shard_rebuilds: u64,
    /// When data was last (re)loaded
    pub last_loaded_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct StoreState {
    /// Fully resident dataset. `Some` with zero horses means a load was
    /// attempted and fell back to empty (degraded mode).
    full: Option<Arc<Dataset>>,
    index: Option<ShardIndex>,
    last_loaded_at: Option<DateTime<Utc>>,
    full_view_builds: u64,
    missing_shard_rebuilds: u64,
}

impl StoreState {
    fn phase(&self) -> LoadPhase {
        if self.full.is_some() {
            LoadPhase::FullyResident
        } else if self.index.is_some() {
            LoadPhase::IndexOnly
        } else {
            LoadPhase::Uninitialized
        }
    }
}

/// Lazy-loading, shard-backed lookup facade over the knowledge dataset.
///
/// Explicitly constructed and passed by handle (`Arc<KnowledgeStore>`) to
/// collaborators; there is deliberately no global instance.
pub struct KnowledgeStore {
    config: CacheConfig,
    fetcher: Option<Fetcher>,
    loaded: AtomicBool,
    state: Mutex<StoreState>,
    shards: Mutex<ShardLru>,
}

impl KnowledgeStore {
    /// Create a store over `config`. No I/O happens until first access.
    pub fn new(config: CacheConfig) -> Self {
        let fetcher = config.source_url.as_ref().map(|url| {
            Fetcher::new(url.clone(), config.connect_timeout, config.download_timeout)
        });
        let max_cached_shards = config.max_cached_shards;
        KnowledgeStore {
            config,
            fetcher,
            loaded: AtomicBool::new(false),
            state: Mutex::new(StoreState::default()),
            shards: Mutex::new(ShardLru::new(max_cached_shards)),
        }
    }

    /// The configuration this store was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Idempotently load the dataset (or its index).
    ///
    /// Fast-path returns once the first load has completed, successful or
    /// degraded; there are no automatic remote retries beyond the single
    /// fetch attempt.
    pub fn ensure_loaded(&self) {
        if self.loaded.load(Ordering::Acquire) {
            return;
        }
        let mut state = self.state.lock();
        if self.loaded.load(Ordering::Relaxed) {
            return;
        }
        self.load_cold(&mut state);
        self.loaded.store(true, Ordering::Release);
    }

    /// Look up a horse's full race history.
    ///
    /// `None` means the horse is not in the dataset -- an expected
    /// outcome, distinct from "store not loaded" (see [`is_loaded`]).
    /// A stale index entry pointing at a deleted shard triggers exactly
    /// one rebuild-and-retry; a second failure yields `None` for this
    /// lookup only.
    ///
    /// [`is_loaded`]: KnowledgeStore::is_loaded
    pub fn get_entity(&self, name: &str) -> Option<HorseEntry> {
        self.ensure_loaded();
        match self.lookup(name) {
            Ok(found) => found,
            Err(e) if e.is_missing_shard() => {
                warn!(horse = name, error = %e, "stale shard index; rebuilding");
                self.rebuild_after_missing_shard();
                match self.lookup(name) {
                    Ok(found) => found,
                    Err(e) => {
                        warn!(horse = name, error = %e, "lookup failed after rebuild");
                        None
                    }
                }
            }
            Err(e) => {
                warn!(horse = name, error = %e, "lookup failed");
                None
            }
        }
    }

    /// Check membership without loading any shard.
    pub fn has_entity(&self, name: &str) -> bool {
        self.ensure_loaded();
        let state = self.state.lock();
        if let Some(full) = &state.full {
            return full.horses.contains_key(name);
        }
        state
            .index
            .as_ref()
            .is_some_and(|index| index.horses.contains_key(name))
    }

    /// Total number of horses.
    ///
    /// Prefers the in-memory index; when the store is untouched it reads
    /// only `index.json` from disk -- never shards, never the network.
    pub fn total_count(&self) -> usize {
        {
            let state = self.state.lock();
            match state.phase() {
                LoadPhase::IndexOnly => return state.index.as_ref().map_or(0, ShardIndex::len),
                LoadPhase::FullyResident => {
                    if let Some(index) = &state.index {
                        return index.len();
                    }
                    return state.full.as_ref().map_or(0, |d| d.len());
                }
                LoadPhase::Uninitialized => {}
            }
        }
        match shard::load_index(&self.config.index_path()) {
            Ok(index) => {
                let count = index.len();
                let mut state = self.state.lock();
                if state.phase() == LoadPhase::Uninitialized {
                    state.index = Some(index);
                    state.last_loaded_at = Some(Utc::now());
                    self.loaded.store(true, Ordering::Release);
                }
                count
            }
            Err(_) => 0,
        }
    }

    /// Whether usable data is loaded. Degraded mode (failed fetch, no
    /// mirror) reports `false` even though a load was attempted.
    pub fn is_loaded(&self) -> bool {
        let state = self.state.lock();
        if let Some(full) = &state.full {
            return !full.is_empty();
        }
        state.index.as_ref().is_some_and(|index| !index.is_empty())
    }

    /// All horse names, from the index when available.
    pub fn all_names(&self) -> Vec<String> {
        self.ensure_loaded();
        let state = self.state.lock();
        if let Some(index) = &state.index {
            return index.horses.keys().cloned().collect();
        }
        state
            .full
            .as_ref()
            .map(|full| full.horses.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Up to `limit` horse names, for cache prewarming.
    pub fn sample_names(&self, limit: usize) -> Vec<String> {
        if limit == 0 {
            return Vec::new();
        }
        let mut names = self.all_names();
        names.truncate(limit);
        names
    }

    /// The full in-memory dataset.
    ///
    /// Expensive and rare: when only the index is loaded this pages in
    /// every distinct referenced shard and assembles the whole map,
    /// transitioning the store to `FullyResident`. Reserved for one-time
    /// full scans (secondary index builds); anything answering requests
    /// should use [`get_entity`](KnowledgeStore::get_entity).
    pub fn knowledge_data(&self) -> Arc<Dataset> {
        self.ensure_loaded();
        let mut state = self.state.lock();
        if let Some(full) = &state.full {
            return full.clone();
        }
        let Some(index) = state.index.clone() else {
            return Arc::new(Dataset::empty());
        };

        state.full_view_builds += 1;
        warn!(
            horses = index.len(),
            builds = state.full_view_builds,
            "assembling full dataset from shards (expensive cold rebuild)"
        );

        let mut horses: BTreeMap<String, HorseEntry> = BTreeMap::new();
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        for entry in index.horses.values() {
            if !seen.insert(entry.file.as_str()) {
                continue;
            }
            match self.load_shard(&entry.file) {
                Ok(shard) => {
                    for (name, races) in shard.iter() {
                        horses.insert(name.clone(), races.clone());
                    }
                }
                Err(e) => warn!(file = %entry.file, error = %e, "shard unreadable during assembly"),
            }
        }

        let full = Arc::new(Dataset {
            meta: index.meta.clone(),
            horses,
        });
        state.full = Some(full.clone());
        full
    }

    /// Monitoring snapshot. Never triggers loads or reconstruction.
    pub fn diagnostics(&self) -> StoreDiagnostics {
        let (total, phase, index_loaded, full_view_builds, missing_shard_rebuilds, last_loaded_at) = {
            let state = self.state.lock();
            let total = match (&state.index, &state.full) {
                (Some(index), _) => index.len(),
                (None, Some(full)) => full.len(),
                (None, None) => 0,
            };
            (
                total,
                state.phase(),
                state.index.is_some(),
                state.full_view_builds,
                state.missing_shard_rebuilds,
                state.last_loaded_at,
            )
        };
        let shards = self.shards.lock();
        StoreDiagnostics {
            total_entities: total,
            phase,
            index_loaded,
            loaded_shards: shards.len(),
            max_cached_shards: shards.capacity(),
            cached_entities_estimate: shards.cached_entry_estimate(),
            full_view_builds,
            missing_shard_rebuilds,
            last_loaded_at,
        }
    }

    /// Re-fetch the dataset from the remote source and replace the shard
    /// generation wholesale.
    ///
    /// Does NOT touch any [`ComputationCache`](crate::ComputationCache):
    /// derived-result invalidation is the host's explicit decision.
    pub fn refresh(&self) -> Result<()> {
        let fetcher = self
            .fetcher
            .clone()
            .ok_or_else(|| Error::Transfer("no source url configured".into()))?;
        let mut state = self.state.lock();
        let dataset = fetcher.fetch()?;
        if let Err(e) = shard::write_full_cache(&self.config.full_cache_path(), &dataset) {
            warn!(error = %e, "failed to write full-cache mirror");
        }
        self.install_dataset(&mut state, dataset, "remote refresh");
        self.shards.lock().clear();
        self.loaded.store(true, Ordering::Release);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Cold load, holding the state lock.
    ///
    /// Order: (a) existing index file for an index-only start; (b) full
    /// dataset from the local mirror, else the remote source, else empty
    /// (degraded). Non-index loads rebuild the shard generation.
    fn load_cold(&self, state: &mut StoreState) {
        match shard::load_index(&self.config.index_path()) {
            Ok(index) => {
                info!(horses = index.len(), "index-only load complete");
                state.index = Some(index);
                state.last_loaded_at = Some(Utc::now());
                return;
            }
            Err(Error::Io(ref e)) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, "shard index unreadable; full load"),
        }
        let dataset = self.acquire_dataset();
        self.install_dataset(state, dataset, "cold load");
    }

    /// Full dataset from the mirror, else a single remote fetch, else
    /// empty. All failures are warnings, never hard errors.
    fn acquire_dataset(&self) -> Dataset {
        let mirror = self.config.full_cache_path();
        match shard::load_full_cache(&mirror) {
            Ok(dataset) if !dataset.is_empty() => {
                info!(horses = dataset.len(), "dataset loaded from local mirror");
                return dataset;
            }
            Ok(_) => warn!("local mirror holds no horses; refetching"),
            Err(Error::Io(ref e)) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, "local mirror unreadable; refetching"),
        }

        let Some(fetcher) = &self.fetcher else {
            warn!("no source url configured; starting with empty dataset");
            return Dataset::empty();
        };
        match fetcher.fetch() {
            Ok(dataset) => {
                if let Err(e) = shard::write_full_cache(&mirror, &dataset) {
                    warn!(error = %e, "failed to write full-cache mirror");
                }
                dataset
            }
            Err(e) => {
                warn!(error = %e, "dataset fetch failed; starting empty (degraded)");
                Dataset::empty()
            }
        }
    }

    /// Install a freshly acquired dataset: rebuild the shard generation
    /// (non-empty datasets only) and publish the resident map.
    fn install_dataset(&self, state: &mut StoreState, dataset: Dataset, source: &str) {
        if !dataset.is_empty() {
            match shard::write_sharded_cache(&self.config.shard_dir(), &dataset, self.config.shard_size)
            {
                Ok(index) => state.index = Some(index),
                Err(e) => warn!(error = %e, "failed to write sharded cache"),
            }
        } else {
            state.index = None;
        }
        info!(horses = dataset.len(), source, "knowledge dataset installed");
        state.full = Some(Arc::new(dataset));
        state.last_loaded_at = Some(Utc::now());
    }

    /// Resolve one horse through the resident map or the shard tier.
    fn lookup(&self, name: &str) -> Result<Option<HorseEntry>> {
        let file = {
            let state = self.state.lock();
            if let Some(full) = &state.full {
                return Ok(full.horses.get(name).cloned());
            }
            match state.index.as_ref().and_then(|index| index.horses.get(name)) {
                Some(entry) => entry.file.clone(),
                None => return Ok(None),
            }
        };
        let shard = self.load_shard(&file)?;
        Ok(shard.get(name).cloned())
    }

    /// Fetch a shard through the LRU, reading from disk on miss.
    fn load_shard(&self, file: &str) -> Result<Arc<ShardMap>> {
        let mut shards = self.shards.lock();
        if let Some(shard) = shards.get(file) {
            return Ok(shard);
        }
        let shard = Arc::new(shard::load_shard_file(&self.config.shard_dir(), file)?);
        debug!(file, horses = shard.len(), "shard paged in");
        if let Some(victim) = shards.insert(file.to_string(), shard.clone()) {
            debug!(file = %victim, "shard evicted");
        }
        Ok(shard)
    }

    /// Recovery for a stale index: drop in-memory state, reload from the
    /// mirror if it is still valid, and rebuild the shard generation.
    /// Without a usable mirror the on-disk generation stays the source of
    /// truth: its index is re-read so only entities in the missing shard
    /// fail, not the whole store. Metered so unexpectedly frequent
    /// triggering is observable.
    fn rebuild_after_missing_shard(&self) {
        let mut state = self.state.lock();
        state.missing_shard_rebuilds += 1;
        state.index = None;
        state.full = None;
        self.shards.lock().clear();

        match shard::load_full_cache(&self.config.full_cache_path()) {
            Ok(dataset) if !dataset.is_empty() => {
                info!(
                    horses = dataset.len(),
                    rebuilds = state.missing_shard_rebuilds,
                    "shard generation rebuilt from full-cache mirror"
                );
                self.install_dataset(&mut state, dataset, "missing-shard rebuild");
                return;
            }
            Ok(_) => warn!("full-cache mirror empty; keeping on-disk shard generation"),
            Err(e) => {
                warn!(error = %e, "full-cache mirror unavailable; keeping on-disk shard generation")
            }
        }

        match shard::load_index(&self.config.index_path()) {
            Ok(index) => {
                info!(horses = index.len(), "shard index reloaded; missing shards stay unresolvable");
                state.index = Some(index);
                state.last_loaded_at = Some(Utc::now());
            }
            Err(e) => warn!(error = %e, "shard index unreadable after failed rebuild; store is empty"),
        }
    }
}

impl std::fmt::Debug for KnowledgeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("KnowledgeStore")
            .field("phase", &state.phase())
            .field("index_loaded", &state.index.is_some())
            .field("data_dir", &self.config.data_dir)
            .finish()
    }
}
