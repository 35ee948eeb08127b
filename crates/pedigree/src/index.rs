//! Pedigree bucket construction and condition-filtered aggregation.

use paddock_core::{Going, RaceRecord, Surface};
use paddock_store::KnowledgeStore;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Canonicalize a horse or sire name for bucket keys.
///
/// Source archives are inconsistent about spacing: full-width ideographic
/// spaces (U+3000), leading/trailing padding, and doubled interior spaces
/// all occur for the same animal. Trim, map full-width spaces to ASCII,
/// and collapse interior runs so all spellings land in one bucket.
pub fn normalize_name(raw: &str) -> String {
    let ascii_spaced: String = raw
        .chars()
        .map(|c| if c == '\u{3000}' { ' ' } else { c })
        .collect();
    let mut out = String::with_capacity(ascii_spaced.len());
    for part in ascii_spaced.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(part);
    }
    out
}

/// One horse under a pedigree bucket.
///
/// The race list is shared (`Arc`) between the sire and broodmare-sire
/// buckets rather than cloned into each.
#[derive(Debug, Clone)]
pub struct Offspring {
    /// Horse name
    pub name: String,
    /// The horse's full race history, most recent first
    pub races: Arc<[RaceRecord]>,
}

/// Race-level conditions a query restricts to. Unset fields match
/// everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RaceFilter {
    /// Venue code (e.g. `"06"`), compared exactly
    pub venue: Option<String>,
    /// Target distance in meters
    pub distance: Option<u32>,
    /// Accepted deviation from `distance`, in meters
    pub distance_tolerance: u32,
    /// Racing surface
    pub surface: Option<Surface>,
}

impl RaceFilter {
    /// Whether one race record satisfies every set condition. Records
    /// missing a field a condition needs are excluded, not assumed.
    pub fn matches(&self, record: &RaceRecord) -> bool {
        if let Some(venue) = &self.venue {
            if record.venue.as_deref() != Some(venue.as_str()) {
                return false;
            }
        }
        if let Some(want) = self.distance {
            match record.distance {
                Some(have) if have.abs_diff(want) <= self.distance_tolerance => {}
                _ => return false,
            }
        }
        if let Some(surface) = self.surface {
            if record.surface() != Some(surface) {
                return false;
            }
        }
        true
    }
}

/// Per-going slice of an aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GoingStats {
    /// The going this slice covers
    pub going: Going,
    /// Matching races run under this going
    pub races: u64,
    /// Wins among them
    pub wins: u64,
    /// Wins as a percentage of races (0 when `races` is 0)
    pub win_rate: f64,
}

/// Aggregated performance of one sire's (or broodmare sire's) offspring
/// under a set of conditions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SireStats {
    /// Offspring with at least one matching race
    pub offspring: usize,
    /// Matching races across all offspring
    pub total_races: u64,
    /// First-place finishes
    pub wins: u64,
    /// Wins as a percentage of `total_races`
    pub win_rate: f64,
    /// Top-three finishes
    pub places: u64,
    /// Places as a percentage of `total_races`
    pub place_rate: f64,
    /// Breakdown by going, in code order (good through heavy)
    pub by_going: [GoingStats; 4],
}

/// Immutable sire / broodmare-sire groupings over a loaded dataset.
pub struct PedigreeIndex {
    by_sire: FxHashMap<String, Vec<Offspring>>,
    by_broodmare_sire: FxHashMap<String, Vec<Offspring>>,
    horses_indexed: usize,
}

impl PedigreeIndex {
    /// Build both groupings in one pass over the store's full dataset.
    ///
    /// Calls [`KnowledgeStore::knowledge_data`] exactly once, which is
    /// the expensive part; each horse contributes its most recent
    /// non-empty sire and broodmare-sire fields as bucket keys. Horses
    /// missing a key are skipped for that grouping only.
    pub fn build(store: &KnowledgeStore) -> Self {
        let dataset = store.knowledge_data();
        let mut by_sire: FxHashMap<String, Vec<Offspring>> = FxHashMap::default();
        let mut by_broodmare_sire: FxHashMap<String, Vec<Offspring>> = FxHashMap::default();
        let mut missing_sire = 0usize;
        let mut missing_broodmare_sire = 0usize;

        for (name, races) in &dataset.horses {
            let shared: Arc<[RaceRecord]> = races.as_slice().into();

            match first_key(races, |r| r.sire.as_deref()) {
                Some(sire) => by_sire.entry(sire).or_default().push(Offspring {
                    name: name.clone(),
                    races: shared.clone(),
                }),
                None => missing_sire += 1,
            }
            match first_key(races, |r| r.broodmare_sire.as_deref()) {
                Some(bms) => by_broodmare_sire.entry(bms).or_default().push(Offspring {
                    name: name.clone(),
                    races: shared,
                }),
                None => missing_broodmare_sire += 1,
            }
        }

        if missing_sire > 0 || missing_broodmare_sire > 0 {
            debug!(
                missing_sire,
                missing_broodmare_sire, "horses without pedigree keys skipped"
            );
        }
        info!(
            horses = dataset.len(),
            sires = by_sire.len(),
            broodmare_sires = by_broodmare_sire.len(),
            "pedigree index built"
        );
        PedigreeIndex {
            by_sire,
            by_broodmare_sire,
            horses_indexed: dataset.len(),
        }
    }

    /// Horses the index was built over.
    pub fn horses_indexed(&self) -> usize {
        self.horses_indexed
    }

    /// Distinct sires.
    pub fn sire_count(&self) -> usize {
        self.by_sire.len()
    }

    /// Distinct broodmare sires.
    pub fn broodmare_sire_count(&self) -> usize {
        self.by_broodmare_sire.len()
    }

    /// The offspring bucket for one sire, if any horse names it.
    pub fn sire_offspring(&self, name: &str) -> Option<&[Offspring]> {
        self.by_sire.get(&normalize_name(name)).map(Vec::as_slice)
    }

    /// The offspring bucket for one broodmare sire, if any horse names it.
    pub fn broodmare_sire_offspring(&self, name: &str) -> Option<&[Offspring]> {
        self.by_broodmare_sire
            .get(&normalize_name(name))
            .map(Vec::as_slice)
    }

    /// Aggregate a sire's offspring under `filter`.
    ///
    /// `None` means "no data": the sire is unknown, or no offspring race
    /// matched. Callers must not read it as "zero performance".
    pub fn query_sire(&self, name: &str, filter: &RaceFilter) -> Option<SireStats> {
        aggregate(self.by_sire.get(&normalize_name(name))?, filter)
    }

    /// Aggregate a broodmare sire's offspring under `filter`.
    pub fn query_broodmare_sire(&self, name: &str, filter: &RaceFilter) -> Option<SireStats> {
        aggregate(self.by_broodmare_sire.get(&normalize_name(name))?, filter)
    }
}

impl std::fmt::Debug for PedigreeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PedigreeIndex")
            .field("horses_indexed", &self.horses_indexed)
            .field("sires", &self.by_sire.len())
            .field("broodmare_sires", &self.by_broodmare_sire.len())
            .finish()
    }
}

/// Most recent non-empty value of a pedigree field, normalized.
fn first_key<'a>(
    races: &'a [RaceRecord],
    field: impl Fn(&'a RaceRecord) -> Option<&'a str>,
) -> Option<String> {
    races
        .iter()
        .filter_map(field)
        .map(normalize_name)
        .find(|name| !name.is_empty())
}

fn aggregate(bucket: &[Offspring], filter: &RaceFilter) -> Option<SireStats> {
    let mut offspring = 0usize;
    let mut total_races = 0u64;
    let mut wins = 0u64;
    let mut places = 0u64;
    let mut going_races = [0u64; 4];
    let mut going_wins = [0u64; 4];

    for member in bucket {
        let mut matched = false;
        for record in member.races.iter().filter(|r| filter.matches(r)) {
            matched = true;
            total_races += 1;
            let won = record.finish == Some(1);
            if won {
                wins += 1;
            }
            if matches!(record.finish, Some(pos) if pos <= 3) {
                places += 1;
            }
            if let Some(going) = record.going() {
                let slot = going_slot(going);
                going_races[slot] += 1;
                if won {
                    going_wins[slot] += 1;
                }
            }
        }
        if matched {
            offspring += 1;
        }
    }

    if total_races == 0 {
        return None;
    }

    let by_going = Going::ALL.map(|going| {
        let slot = going_slot(going);
        GoingStats {
            going,
            races: going_races[slot],
            wins: going_wins[slot],
            win_rate: percent(going_wins[slot], going_races[slot]),
        }
    });

    Some(SireStats {
        offspring,
        total_races,
        wins,
        win_rate: percent(wins, total_races),
        places,
        place_rate: percent(places, total_races),
        by_going,
    })
}

fn going_slot(going: Going) -> usize {
    match going {
        Going::Good => 0,
        Going::Yielding => 1,
        Going::Soft => 2,
        Going::Heavy => 3,
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
