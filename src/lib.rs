//! # Paddock
//!
//! Tiered local cache for large remotely-hosted horse-racing knowledge
//! datasets.
//!
//! The source of truth is a single multi-hundred-megabyte JSON blob
//! mapping horse names to race histories. Paddock keeps a verbatim local
//! mirror of that blob, splits it into fixed-size shard files with a
//! name-to-shard index, and serves lookups through a small LRU of parsed
//! shards — so steady-state queries touch one shard file instead of the
//! whole dataset.
//!
//! ## Quick Start
//!
//! ```ignore
//! use paddock::prelude::*;
//!
//! let paddock = Paddock::builder()
//!     .data_dir("./cache")
//!     .source_url("https://cdn.example.com/knowledge.json")
//!     .open();
//!
//! // First lookup triggers the load (index file, local mirror, or
//! // remote fetch, in that order); later lookups hit the shard tier.
//! let history = paddock.get_entity("エスポワール");
//!
//! // Memoize derived results per horse.
//! let score = paddock.cached_result("エスポワール", || {
//!     serde_json::json!({"score": 0.87})
//! });
//!
//! // Pedigree aggregation, index built on first use.
//! let stats = paddock.query_sire("ディープインパクト", &RaceFilter::default());
//! ```
//!
//! ## Tiers
//!
//! - Full-cache mirror: `<data_dir>/knowledge.json`, fetch fallback
//! - Shard generation: `<data_dir>/shards/shard_NNNNN.json` + `index.json`
//! - Shard LRU: bounded in-memory cache of parsed shards
//! - [`ComputationCache`]: FIFO-bounded memoization of derived results
//! - [`PedigreeIndex`]: sire / broodmare-sire secondary index

#![warn(missing_docs)]

mod facade;

pub mod prelude;

// Re-export main entry points
pub use facade::{Diagnostics, Paddock, PaddockBuilder};

// Re-export error handling
pub use paddock_core::{Error, Result};

// Re-export the data model
pub use paddock_core::{
    CacheConfig, Dataset, DatasetMeta, Going, HorseEntry, IndexEntry, RaceRecord, ShardIndex,
    Surface,
};

// Re-export the storage and query layers
pub use paddock_pedigree::{GoingStats, Offspring, PedigreeIndex, RaceFilter, SireStats};
pub use paddock_store::{
    CalcStats, ComputationCache, KnowledgeStore, LoadPhase, StoreDiagnostics,
};
