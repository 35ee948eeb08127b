//! Convenient imports for paddock.
//!
//! Re-exports the types most callers need:
//!
//! ```ignore
//! use paddock::prelude::*;
//!
//! let paddock = Paddock::open("./cache");
//! let history = paddock.get_entity("エスポワール");
//! ```

// Main entry point
pub use crate::facade::{Diagnostics, Paddock, PaddockBuilder};

// Error handling
pub use paddock_core::{Error, Result};

// Data model
pub use paddock_core::{CacheConfig, Dataset, Going, HorseEntry, RaceRecord, Surface};

// Query types
pub use paddock_pedigree::{RaceFilter, SireStats};
pub use paddock_store::{KnowledgeStore, LoadPhase};

// Re-export serde_json for convenience
pub use serde_json::json;
