//! Shard generation layout: partition sizes, index consistency, and
//! wholesale replacement.

use crate::{seed_dataset, write_mirror};
use paddock::prelude::*;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

fn shard_files(shard_dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = std::fs::read_dir(shard_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("shard_"))
        .collect();
    files.sort();
    files
}

fn shard_len(shard_dir: &Path, file: &str) -> usize {
    let text = std::fs::read_to_string(shard_dir.join(file)).unwrap();
    let map: BTreeMap<String, Value> = serde_json::from_str(&text).unwrap();
    map.len()
}

#[test]
fn two_thousand_horses_at_750_make_three_shards() {
    let dir = tempfile::tempdir().unwrap();
    write_mirror(dir.path(), &seed_dataset(2000));
    let paddock = Paddock::builder()
        .data_dir(dir.path())
        .shard_size(750)
        .open();
    paddock.ensure_loaded();

    let shard_dir = dir.path().join("shards");
    let files = shard_files(&shard_dir);
    assert_eq!(
        files,
        vec!["shard_00000.json", "shard_00001.json", "shard_00002.json"]
    );
    assert_eq!(shard_len(&shard_dir, "shard_00000.json"), 750);
    assert_eq!(shard_len(&shard_dir, "shard_00001.json"), 750);
    assert_eq!(shard_len(&shard_dir, "shard_00002.json"), 500);

    // Every horse is indexed to exactly one of those files.
    let index: Value =
        serde_json::from_str(&std::fs::read_to_string(shard_dir.join("index.json")).unwrap())
            .unwrap();
    assert_eq!(index["shard_count"], 3);
    assert_eq!(index["horses"].as_object().unwrap().len(), 2000);

    // And the last horse of the last shard is retrievable end to end.
    assert!(paddock.get_entity("horse_1999").is_some());

    // A fresh instance answers the count from the index alone.
    let fresh = Paddock::builder()
        .data_dir(dir.path())
        .shard_size(750)
        .open();
    assert_eq!(fresh.total_count(), 2000);
    assert_eq!(fresh.diagnostics().store.loaded_shards, 0);
}

#[test]
fn rebuild_removes_stale_shards_from_a_larger_generation() {
    let dir = tempfile::tempdir().unwrap();
    write_mirror(dir.path(), &seed_dataset(40));
    Paddock::builder()
        .data_dir(dir.path())
        .shard_size(8)
        .open()
        .ensure_loaded();
    let shard_dir = dir.path().join("shards");
    assert_eq!(shard_files(&shard_dir).len(), 5);

    // Shrink the dataset and force a full reload.
    write_mirror(dir.path(), &seed_dataset(10));
    std::fs::remove_file(shard_dir.join("index.json")).unwrap();
    Paddock::builder()
        .data_dir(dir.path())
        .shard_size(8)
        .open()
        .ensure_loaded();

    // The old generation's extra files are gone, not orphaned.
    assert_eq!(shard_files(&shard_dir).len(), 2);
}

#[test]
fn shard_layout_is_deterministic_across_rebuilds() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let dataset = seed_dataset(30);
    write_mirror(dir_a.path(), &dataset);
    write_mirror(dir_b.path(), &dataset);

    for dir in [dir_a.path(), dir_b.path()] {
        Paddock::builder().data_dir(dir).shard_size(8).open().ensure_loaded();
    }

    for file in shard_files(&dir_a.path().join("shards")) {
        let a = std::fs::read_to_string(dir_a.path().join("shards").join(&file)).unwrap();
        let b = std::fs::read_to_string(dir_b.path().join("shards").join(&file)).unwrap();
        let a: Value = serde_json::from_str(&a).unwrap();
        let b: Value = serde_json::from_str(&b).unwrap();
        assert_eq!(a, b, "{file} differs between identical rebuilds");
    }
}

#[test]
fn no_temp_files_survive_a_build() {
    let dir = tempfile::tempdir().unwrap();
    write_mirror(dir.path(), &seed_dataset(40));
    Paddock::builder()
        .data_dir(dir.path())
        .shard_size(8)
        .open()
        .ensure_loaded();

    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("shards"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}
