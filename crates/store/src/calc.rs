//! Computation cache: FIFO memoization of per-horse derived results.
//!
//! Independent of the raw-data tier. Eviction here is deliberately FIFO
//! by insertion order, unlike the shard cache's LRU: computed results are
//! cheap to recompute, so strict recency ordering is not worth its
//! bookkeeping. There is no TTL; invalidation is the host's explicit
//! [`clear`](ComputationCache::clear), typically paired with a dataset
//! refresh when the derived formula reads raw history.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::info;

/// Cumulative cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalcStats {
    /// Requests answered from the cache
    pub hits: u64,
    /// Requests that had to compute
    pub misses: u64,
    /// Current number of cached results
    pub entries: usize,
    /// Configured bound
    pub max_entries: usize,
    /// hits / (hits + misses), in percent
    pub hit_rate: f64,
}

struct CalcInner<T> {
    entries: FxHashMap<String, T>,
    /// Insertion order, oldest first (FIFO eviction).
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

/// Bounded memoization cache for a pure `horse name -> result` function.
///
/// The compute closure runs outside the critical section, so it may call
/// back into the [`KnowledgeStore`](crate::KnowledgeStore) freely.
pub struct ComputationCache<T> {
    inner: Mutex<CalcInner<T>>,
    max_entries: usize,
    log_interval: u64,
}

impl<T: Clone> ComputationCache<T> {
    /// Create a cache bounded to `max_entries` results, logging a usage
    /// summary every `log_interval` requests.
    pub fn new(max_entries: usize, log_interval: u64) -> Self {
        ComputationCache {
            inner: Mutex::new(CalcInner {
                entries: FxHashMap::default(),
                order: VecDeque::new(),
                hits: 0,
                misses: 0,
            }),
            max_entries,
            log_interval: log_interval.max(1),
        }
    }

    /// Return the cached result for `name`, computing and storing it on
    /// a miss. The oldest-inserted entry is evicted once the bound is
    /// reached. With `max_entries == 0` results are computed but never
    /// stored; hit/miss counters still advance.
    pub fn get_or_compute(&self, name: &str, compute: impl FnOnce() -> T) -> T {
        {
            let mut inner = self.inner.lock();
            if let Some(value) = inner.entries.get(name) {
                let value = value.clone();
                inner.hits += 1;
                self.maybe_log(&inner);
                return value;
            }
            inner.misses += 1;
            self.maybe_log(&inner);
        }

        // Compute without holding the lock; the closure may take a while
        // and may itself need the knowledge store.
        let value = compute();

        if self.max_entries > 0 {
            let mut inner = self.inner.lock();
            if !inner.entries.contains_key(name) && inner.entries.len() >= self.max_entries {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.entries.remove(&oldest);
                }
            }
            if inner.entries.insert(name.to_string(), value.clone()).is_none() {
                inner.order.push_back(name.to_string());
            }
        }
        value
    }

    /// Peek at a cached result without counting a request.
    pub fn peek(&self, name: &str) -> Option<T> {
        self.inner.lock().entries.get(name).cloned()
    }

    /// Cumulative statistics.
    pub fn stats(&self) -> CalcStats {
        let inner = self.inner.lock();
        let requests = inner.hits + inner.misses;
        let hit_rate = if requests == 0 {
            0.0
        } else {
            inner.hits as f64 / requests as f64 * 100.0
        };
        CalcStats {
            hits: inner.hits,
            misses: inner.misses,
            entries: inner.entries.len(),
            max_entries: self.max_entries,
            hit_rate,
        }
    }

    /// Wipe all entries and reset the counters.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
        inner.hits = 0;
        inner.misses = 0;
    }

    fn maybe_log(&self, inner: &CalcInner<T>) {
        let requests = inner.hits + inner.misses;
        if requests > 0 && requests % self.log_interval == 0 {
            let hit_rate = inner.hits as f64 / requests as f64 * 100.0;
            info!(
                hits = inner.hits,
                misses = inner.misses,
                "computation cache: hit rate {hit_rate:.1}%"
            );
        }
    }
}
