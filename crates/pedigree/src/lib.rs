//! Secondary pedigree index over the knowledge store.
//!
//! Groups every horse under its sire and its broodmare sire (the dam's
//! sire) so that "how do this stallion's offspring perform under these
//! conditions" queries touch one bucket instead of the whole dataset.
//!
//! The index is immutable after [`PedigreeIndex::build`]; after a store
//! refresh, build a new one.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod index;

pub use index::{
    normalize_name, GoingStats, Offspring, PedigreeIndex, RaceFilter, SireStats,
};
