//! Core types for the paddock knowledge cache
//!
//! This crate defines the data model shared by every layer:
//! - [`RaceRecord`] / [`Dataset`]: the entity-keyed historical data
//! - [`ShardIndex`]: the persisted name -> shard mapping
//! - [`CacheConfig`]: recognized configuration options
//! - [`Error`] / [`Result`]: the canonical error type

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod types;

pub use config::CacheConfig;
pub use error::{Error, Result};
pub use types::{
    Dataset, DatasetMeta, Going, HorseEntry, IndexEntry, RaceRecord, ShardIndex, Surface,
};
