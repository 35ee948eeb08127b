//! Unified error types for paddock.
//!
//! This is the canonical error type for the whole cache. Note what is NOT
//! here: a missing entity. Lookups return `Option`, because coverage of
//! the underlying dataset is intentionally partial and "not found" is an
//! expected outcome, distinct from "store not yet loaded".

use thiserror::Error;

/// All paddock errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Remote fetch exceeded its connect or overall deadline
    #[error("download timeout: {0}")]
    Timeout(String),

    /// Remote fetch failed mid-transfer (connection, HTTP status, read)
    #[error("transfer error: {0}")]
    Transfer(String),

    /// Downloaded bytes were not valid dataset JSON
    #[error("parse error: {0}")]
    Parse(String),

    /// Local full-cache file exists but is unparsable or malshaped.
    /// Callers treat this as "absent" and re-fetch.
    #[error("corrupt cache: {0}")]
    CorruptCache(String),

    /// The index references a shard file that is no longer on disk
    #[error("missing shard: {0}")]
    MissingShard(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for paddock operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this is a transient source error (fetch failed or timed
    /// out). Recovered locally via fallback to the local cache or an
    /// empty dataset; never surfaced as a hard failure.
    pub fn is_transient_source(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Transfer(_) | Error::Parse(_))
    }

    /// Check if this is a corrupt-cache error.
    pub fn is_corrupt_cache(&self) -> bool {
        matches!(self, Error::CorruptCache(_))
    }

    /// Check if this is a missing-shard error (stale index).
    pub fn is_missing_shard(&self) -> bool {
        matches!(self, Error::MissingShard(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
