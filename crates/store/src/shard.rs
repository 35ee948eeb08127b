//! Full-cache mirror and shard writer / index builder.
//!
//! The full entity map is persisted two ways: one JSON mirror of the last
//! successfully materialized dataset, and a directory of bounded shard
//! files plus an `index.json` mapping each horse to its owning shard.
//! Every rebuild replaces the shard generation wholesale; nothing is
//! appended incrementally. Individual files go through a
//! temp-then-rename write to bound partial-write exposure, but there is
//! no cross-file atomicity: a crash between renames leaves a mixed
//! generation, which the store's missing-shard rebuild path repairs.

use chrono::Utc;
use paddock_core::{Dataset, Error, HorseEntry, IndexEntry, Result, ShardIndex};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Parsed contents of one shard file.
pub type ShardMap = FxHashMap<String, HorseEntry>;

/// Deterministic shard file name for a shard id.
pub fn shard_filename(id: usize) -> String {
    format!("shard_{id:05}.json")
}

/// Write the single-file JSON mirror of the full dataset.
pub fn write_full_cache(path: &Path, dataset: &Dataset) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    write_json_atomic(path, dataset)?;
    info!(horses = dataset.len(), path = %path.display(), "full cache written");
    Ok(())
}

/// Load the full-cache mirror.
///
/// A file that exists but does not parse as a dataset is
/// [`Error::CorruptCache`]; callers treat that as absent and re-fetch.
pub fn load_full_cache(path: &Path) -> Result<Dataset> {
    let bytes = fs::read(path)?;
    let dataset: Dataset =
        serde_json::from_slice(&bytes).map_err(|e| Error::CorruptCache(e.to_string()))?;
    Ok(dataset)
}

/// Partition the dataset into shard files and write the index.
///
/// Horses are taken in the dataset's (deterministic) iteration order,
/// `shard_size` per file. All previously written shard files are deleted
/// first, so a shrink never leaves orphaned shards behind. An empty
/// dataset writes nothing and returns an empty index.
pub fn write_sharded_cache(
    shard_dir: &Path,
    dataset: &Dataset,
    shard_size: usize,
) -> Result<ShardIndex> {
    if dataset.is_empty() {
        return Ok(ShardIndex::default());
    }
    let shard_size = shard_size.max(1);
    fs::create_dir_all(shard_dir)?;
    remove_stale_shards(shard_dir)?;

    let mut index: BTreeMap<String, IndexEntry> = BTreeMap::new();
    let mut shard: ShardMap = ShardMap::default();
    let mut shard_id = 0usize;

    for (name, races) in &dataset.horses {
        if shard.len() == shard_size {
            write_json_atomic(&shard_dir.join(shard_filename(shard_id)), &shard)?;
            shard_id += 1;
            shard.clear();
        }
        shard.insert(name.clone(), races.clone());
        index.insert(
            name.clone(),
            IndexEntry {
                file: shard_filename(shard_id),
            },
        );
    }
    if !shard.is_empty() {
        write_json_atomic(&shard_dir.join(shard_filename(shard_id)), &shard)?;
    }

    let index = ShardIndex {
        meta: dataset.meta.clone(),
        generated_at: Some(Utc::now()),
        shard_count: shard_id + 1,
        horses: index,
    };
    write_json_atomic(&shard_dir.join("index.json"), &index)?;
    info!(
        horses = index.len(),
        shards = index.shard_count,
        "sharded cache written"
    );
    Ok(index)
}

/// Load the persisted shard index.
///
/// Missing file surfaces as `Error::Io(NotFound)`; an unparsable or
/// empty index is [`Error::CorruptCache`] so the store falls back to a
/// full load.
pub fn load_index(path: &Path) -> Result<ShardIndex> {
    let bytes = fs::read(path)?;
    let index: ShardIndex =
        serde_json::from_slice(&bytes).map_err(|e| Error::CorruptCache(e.to_string()))?;
    if index.is_empty() {
        return Err(Error::CorruptCache("index holds no horses".into()));
    }
    debug!(horses = index.len(), "shard index loaded");
    Ok(index)
}

/// Read and parse one shard file.
///
/// A missing file is [`Error::MissingShard`] (stale index after an
/// out-of-band deletion or a partial rebuild), which the store answers
/// with a single rebuild-and-retry.
pub fn load_shard_file(shard_dir: &Path, file: &str) -> Result<ShardMap> {
    let path = shard_dir.join(file);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::MissingShard(file.to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes).map_err(|e| Error::CorruptCache(e.to_string()))
}

fn remove_stale_shards(shard_dir: &Path) -> Result<()> {
    for entry in fs::read_dir(shard_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.ends_with(".json") || name.ends_with(".json.tmp") {
            if let Err(e) = fs::remove_file(entry.path()) {
                warn!(file = %name, error = %e, "failed to remove stale shard");
            }
        }
    }
    Ok(())
}

/// Serialize to `<path>.tmp`, then rename over `path`.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let mut writer = BufWriter::new(File::create(&tmp)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    fs::rename(&tmp, path)?;
    Ok(())
}
