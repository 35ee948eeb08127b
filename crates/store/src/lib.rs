//! Tiered storage for the paddock knowledge cache
//!
//! This crate implements the raw-data tier and the derived-result tier:
//! - [`fetch::Fetcher`]: streaming download of the remote dataset blob
//! - [`shard`]: full-cache mirror plus shard writer / index builder
//! - [`shard_cache::ShardLru`]: bounded in-memory cache of parsed shards
//! - [`KnowledgeStore`]: the lazy-loading lookup facade over all of it
//! - [`ComputationCache`]: FIFO memoization of per-horse derived results

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod calc;
pub mod fetch;
pub mod shard;
pub mod shard_cache;
pub mod store;

pub use calc::{CalcStats, ComputationCache};
pub use fetch::Fetcher;
pub use store::{KnowledgeStore, LoadPhase, StoreDiagnostics};
