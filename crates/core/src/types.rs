//! Data model for the knowledge cache.
//!
//! The unit of knowledge is a horse: a unique name mapped to an ordered
//! list of historical race records, most recent first. The upstream blob
//! mixes JSON numbers and zero-padded strings (`"01"`) for numeric fields
//! and ships under two shapes (a bare `name -> races` object, or the same
//! object wrapped with a `meta` block), so deserialization here is lenient
//! in both respects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// One historical race record for a horse.
///
/// Only the fields the cache itself interprets are typed; everything else
/// the source ships rides along in `extra` and round-trips untouched.
/// Field aliases match the upstream archive's column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaceRecord {
    /// Venue code (e.g. `"06"`)
    #[serde(default, alias = "KEIBAJO_CODE", skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,

    /// Race distance in meters
    #[serde(
        default,
        alias = "KYORI",
        deserialize_with = "de_lenient_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub distance: Option<u32>,

    /// Final finishing position (1 = win)
    #[serde(
        default,
        alias = "KAKUTEI_CHAKUJUN",
        deserialize_with = "de_lenient_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub finish: Option<u32>,

    /// Track code (11-19 turf, 21-29 dirt, 31-39 jump)
    #[serde(
        default,
        alias = "TRACK_CODE",
        deserialize_with = "de_lenient_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub track_code: Option<u32>,

    /// Turf going code (1-4), zero or absent on dirt races
    #[serde(
        default,
        alias = "SHIBA_BABAJOTAI_CODE",
        deserialize_with = "de_lenient_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub turf_going: Option<u32>,

    /// Dirt going code (1-4), zero or absent on turf races
    #[serde(
        default,
        alias = "DIRT_BABAJOTAI_CODE",
        deserialize_with = "de_lenient_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub dirt_going: Option<u32>,

    /// Sire name, as recorded on this race
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sire: Option<String>,

    /// Broodmare sire (dam's sire) name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broodmare_sire: Option<String>,

    /// Jockey name
    #[serde(default, alias = "KISHUMEI_RYAKUSHO", skip_serializing_if = "Option::is_none")]
    pub jockey: Option<String>,

    /// Uninterpreted source fields, preserved verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RaceRecord {
    /// Racing surface for this record, from the track code when present,
    /// falling back to whichever going field is populated.
    pub fn surface(&self) -> Option<Surface> {
        if let Some(surface) = self.track_code.and_then(Surface::from_track_code) {
            return Some(surface);
        }
        if self.turf_going.filter(|&c| c != 0).is_some() {
            return Some(Surface::Turf);
        }
        if self.dirt_going.filter(|&c| c != 0).is_some() {
            return Some(Surface::Dirt);
        }
        None
    }

    /// Going for this record. Turf and dirt ship in separate columns;
    /// a zero code means "not this surface".
    pub fn going(&self) -> Option<Going> {
        self.turf_going
            .filter(|&c| c != 0)
            .or(self.dirt_going.filter(|&c| c != 0))
            .and_then(Going::from_code)
    }
}

/// A horse's full history, most recent race first.
pub type HorseEntry = Vec<RaceRecord>;

/// Racing surface, derived from upstream track codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Surface {
    /// Turf (track codes 11-19)
    Turf,
    /// Dirt (track codes 21-29)
    Dirt,
    /// Jump / steeplechase (track codes 31-39)
    Jump,
}

impl Surface {
    /// Map an upstream track code to a surface.
    pub fn from_track_code(code: u32) -> Option<Surface> {
        match code {
            11..=19 => Some(Surface::Turf),
            21..=29 => Some(Surface::Dirt),
            31..=39 => Some(Surface::Jump),
            _ => None,
        }
    }
}

/// Track going, from upstream condition codes 1-4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Going {
    /// Code 1
    Good,
    /// Code 2
    Yielding,
    /// Code 3
    Soft,
    /// Code 4
    Heavy,
}

impl Going {
    /// All four conditions, in code order. Used for per-going breakdowns.
    pub const ALL: [Going; 4] = [Going::Good, Going::Yielding, Going::Soft, Going::Heavy];

    /// Map an upstream going code to a condition.
    pub fn from_code(code: u32) -> Option<Going> {
        match code {
            1 => Some(Going::Good),
            2 => Some(Going::Yielding),
            3 => Some(Going::Soft),
            4 => Some(Going::Heavy),
            _ => None,
        }
    }
}

/// Dataset-level metadata carried through the full cache and the index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetMeta {
    /// Source version string (e.g. `"2.0"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Dataset flavor (e.g. `"local_racing"`)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// When the source blob was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// The full entity map plus its metadata.
///
/// `horses` is a `BTreeMap` so shard partitioning order is deterministic
/// across rebuilds. Deserialization accepts both the wrapped form
/// (`{"meta": .., "horses": ..}`) and the bare `name -> races` form the
/// CDN sometimes serves; serialization always writes the wrapped form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireDataset")]
pub struct Dataset {
    /// Dataset metadata
    #[serde(default)]
    pub meta: DatasetMeta,
    /// Horse name -> race history
    pub horses: BTreeMap<String, HorseEntry>,
}

impl Dataset {
    /// An empty dataset. Used as the degraded-mode fallback when the
    /// remote fetch fails and no local mirror exists.
    pub fn empty() -> Self {
        Dataset::default()
    }

    /// Number of horses in the dataset.
    pub fn len(&self) -> usize {
        self.horses.len()
    }

    /// Check if the dataset holds no horses.
    pub fn is_empty(&self) -> bool {
        self.horses.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireDataset {
    Wrapped {
        #[serde(default)]
        meta: DatasetMeta,
        horses: BTreeMap<String, HorseEntry>,
    },
    Bare(BTreeMap<String, HorseEntry>),
}

impl From<WireDataset> for Dataset {
    fn from(wire: WireDataset) -> Self {
        match wire {
            WireDataset::Wrapped { meta, horses } => Dataset { meta, horses },
            WireDataset::Bare(horses) => Dataset {
                meta: DatasetMeta::default(),
                horses,
            },
        }
    }
}

/// One index record: which shard file owns a horse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Owning shard file name (e.g. `shard_00002.json`)
    pub file: String,
}

/// The persisted shard index: horse name -> owning shard file, plus
/// dataset metadata. Written as `index.json` next to the shard files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShardIndex {
    /// Metadata copied from the source dataset
    #[serde(default)]
    pub meta: DatasetMeta,
    /// When this index (and its shard generation) was written
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
    /// Number of shard files in this generation
    pub shard_count: usize,
    /// Horse name -> owning shard
    pub horses: BTreeMap<String, IndexEntry>,
}

impl ShardIndex {
    /// Number of indexed horses.
    pub fn len(&self) -> usize {
        self.horses.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.horses.is_empty()
    }
}

/// Accept a u32 from a JSON number or a (possibly zero-padded, possibly
/// `"2200m"`-suffixed) string. Anything non-numeric becomes `None` rather
/// than a hard error; the source data is too messy to reject wholesale.
fn de_lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(lenient_u32))
}

/// Shared lenient numeric coercion, also used by query-side distance
/// normalization.
pub fn lenient_u32(value: &serde_json::Value) -> Option<u32> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        serde_json::Value::String(s) => {
            let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                None
            } else {
                digits.parse().ok()
            }
        }
        _ => None,
    }
}
