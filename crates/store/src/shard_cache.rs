//! Bounded LRU cache of parsed shards.
//!
//! Hit marks the entry most-recently-used; inserting past the bound
//! evicts the least-recently-used entry. The cache itself is not
//! synchronized -- the [`KnowledgeStore`](crate::KnowledgeStore) owns one
//! instance behind a single mutex, which is the entire locking story for
//! shard state.

use crate::shard::ShardMap;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// LRU cache mapping shard file name to its parsed contents.
#[derive(Debug)]
pub struct ShardLru {
    entries: FxHashMap<String, Arc<ShardMap>>,
    /// Access order, least-recently-used first. The capacity is tiny
    /// (default 6), so linear scans on touch are cheaper than a linked
    /// structure.
    order: Vec<String>,
    capacity: usize,
}

impl ShardLru {
    /// Create an empty cache bounded to `capacity` shards.
    pub fn new(capacity: usize) -> Self {
        ShardLru {
            entries: FxHashMap::default(),
            order: Vec::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Look up a shard, marking it most-recently-used on hit.
    pub fn get(&mut self, file: &str) -> Option<Arc<ShardMap>> {
        let shard = self.entries.get(file)?.clone();
        self.touch(file);
        Some(shard)
    }

    /// Insert a shard as most-recently-used, evicting the
    /// least-recently-used entry when the bound is exceeded. Returns the
    /// evicted file name, if any.
    pub fn insert(&mut self, file: String, shard: Arc<ShardMap>) -> Option<String> {
        if self.entries.insert(file.clone(), shard).is_some() {
            self.touch(&file);
            return None;
        }
        self.order.push(file);
        if self.entries.len() > self.capacity {
            let victim = self.order.remove(0);
            self.entries.remove(&victim);
            return Some(victim);
        }
        None
    }

    /// Number of cached shards.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured bound.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total horses across all cached shards. Diagnostics only.
    pub fn cached_entry_estimate(&self) -> usize {
        self.entries.values().map(|s| s.len()).sum()
    }

    /// Drop every cached shard. Used when the index is rebuilt.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn touch(&mut self, file: &str) {
        if let Some(pos) = self.order.iter().position(|f| f == file) {
            let entry = self.order.remove(pos);
            self.order.push(entry);
        }
    }
}
