//! Load lifecycle: cold start, index-only start, idempotence, degraded
//! mode, and stale-index recovery.

use crate::{paddock_at, race, seed_dataset, serve_dataset, write_mirror};
use paddock::prelude::*;
use std::time::Duration;

#[test]
fn retrieval_returns_exact_source_payload() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = seed_dataset(30);
    write_mirror(dir.path(), &dataset);

    // Cold start: served from the freshly loaded resident map.
    let paddock = paddock_at(dir.path());
    for name in ["horse_0000", "horse_0013", "horse_0029"] {
        let entry = paddock.get_entity(name).expect("known horse");
        assert_eq!(&entry, dataset.horses.get(name).unwrap(), "{name} payload");
    }

    // Second start: served through the shard tier via the index.
    let paddock = paddock_at(dir.path());
    assert_eq!(paddock.diagnostics().store.phase, LoadPhase::IndexOnly);
    for name in ["horse_0000", "horse_0013", "horse_0029"] {
        let entry = paddock.get_entity(name).expect("known horse");
        assert_eq!(&entry, dataset.horses.get(name).unwrap(), "{name} via shards");
    }
}

#[test]
fn ensure_loaded_is_idempotent_after_first_success() {
    let dir = tempfile::tempdir().unwrap();
    write_mirror(dir.path(), &seed_dataset(10));
    let paddock = paddock_at(dir.path());
    paddock.ensure_loaded();
    assert!(paddock.is_loaded());

    // Remove every artifact; a loaded cache must not go back to disk.
    std::fs::remove_dir_all(dir.path()).unwrap();
    for _ in 0..10 {
        paddock.ensure_loaded();
    }
    assert!(paddock.get_entity("horse_0004").is_some());
    assert!(paddock.is_loaded());
}

#[test]
fn degraded_mode_serves_nothing_but_never_panics() {
    let dir = tempfile::tempdir().unwrap();
    let paddock = Paddock::builder()
        .data_dir(dir.path())
        .source_url("http://127.0.0.1:1/knowledge.json")
        .connect_timeout(Duration::from_secs(2))
        .download_timeout(Duration::from_secs(2))
        .open();

    assert!(paddock.get_entity("anything").is_none());
    assert!(!paddock.has_entity("anything"));
    assert!(!paddock.is_loaded());
    assert_eq!(paddock.total_count(), 0);
    assert_eq!(paddock.sample_names(5).len(), 0);

    let diag = paddock.diagnostics();
    assert_eq!(diag.store.total_entities, 0);
    assert_eq!(diag.store.loaded_shards, 0);
}

#[test]
fn missing_horse_is_none_while_store_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    write_mirror(dir.path(), &seed_dataset(5));
    let paddock = paddock_at(dir.path());

    assert!(paddock.get_entity("no_such_horse").is_none());
    assert!(paddock.is_loaded(), "absence must not read as load failure");
}

#[test]
fn total_count_on_cold_store_reads_only_the_index() {
    let dir = tempfile::tempdir().unwrap();
    write_mirror(dir.path(), &seed_dataset(25));
    paddock_at(dir.path()).ensure_loaded();

    let paddock = paddock_at(dir.path());
    assert_eq!(paddock.total_count(), 25);
    let diag = paddock.diagnostics();
    assert_eq!(diag.store.loaded_shards, 0, "no shard reads for a count");
    assert_eq!(diag.store.phase, LoadPhase::IndexOnly);
}

#[test]
fn out_of_band_shard_deletion_triggers_rebuild_and_retry() {
    let dir = tempfile::tempdir().unwrap();
    write_mirror(dir.path(), &seed_dataset(25));
    paddock_at(dir.path()).ensure_loaded();

    let paddock = paddock_at(dir.path());
    paddock.ensure_loaded();
    assert_eq!(paddock.diagnostics().store.phase, LoadPhase::IndexOnly);

    // Sabotage: delete the shard generation out from under the index.
    for entry in std::fs::read_dir(dir.path().join("shards")).unwrap() {
        let path = entry.unwrap().path();
        if path.file_name().unwrap() != "index.json" {
            std::fs::remove_file(path).unwrap();
        }
    }

    let entry = paddock.get_entity("horse_0012");
    assert!(entry.is_some(), "mirror-backed rebuild should recover");
    assert_eq!(paddock.diagnostics().store.missing_shard_rebuilds, 1);

    // The rebuilt generation is back on disk.
    assert!(dir.path().join("shards/shard_00000.json").exists());
}

#[test]
fn cold_load_fetches_from_remote_and_persists_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = seed_dataset(12);
    let url = serve_dataset(&dataset, 1);

    // No local artifacts at all; the fetch is the only source.
    let paddock = Paddock::builder()
        .data_dir(dir.path())
        .source_url(url)
        .shard_size(8)
        .open();
    let entry = paddock.get_entity("horse_0005").expect("fetched horse");
    assert_eq!(&entry, dataset.horses.get("horse_0005").unwrap());
    assert!(paddock.is_loaded());
    assert_eq!(paddock.total_count(), 12);

    // Both persistence tiers were written for the next process,
    assert!(dir.path().join("knowledge.json").exists());
    assert!(dir.path().join("shards/index.json").exists());

    // which starts index-only without touching the network again.
    let offline = paddock_at(dir.path());
    offline.ensure_loaded();
    assert_eq!(offline.diagnostics().store.phase, LoadPhase::IndexOnly);
    assert!(offline.get_entity("horse_0011").is_some());
}

#[test]
fn refresh_replaces_every_tier_wholesale() {
    let dir = tempfile::tempdir().unwrap();
    write_mirror(dir.path(), &seed_dataset(20));
    paddock_at(dir.path()).ensure_loaded();

    let mut replacement = Dataset::empty();
    for i in 0..10 {
        replacement
            .horses
            .insert(format!("colt_{i:04}"), vec![race(1600, 1, "sire_b")]);
    }
    let url = serve_dataset(&replacement, 1);

    // Index-only start, with a shard paged in by a warm lookup.
    let paddock = Paddock::builder()
        .data_dir(dir.path())
        .source_url(url)
        .shard_size(8)
        .open();
    assert!(paddock.get_entity("horse_0003").is_some());
    assert!(paddock.diagnostics().store.loaded_shards > 0);

    paddock.refresh().expect("refresh against live fixture");

    // New data serves; the old generation is gone everywhere.
    assert!(paddock.get_entity("colt_0007").is_some());
    assert!(paddock.get_entity("horse_0003").is_none());
    assert_eq!(paddock.total_count(), 10);

    let diag = paddock.diagnostics();
    assert_eq!(diag.store.phase, LoadPhase::FullyResident);
    assert_eq!(diag.store.loaded_shards, 0, "shard LRU cleared on refresh");

    // The mirror was rewritten with the replacement dataset.
    let mirror: Dataset =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("knowledge.json")).unwrap())
            .unwrap();
    assert!(mirror.horses.contains_key("colt_0000"));
    assert!(!mirror.horses.contains_key("horse_0000"));

    // And a fresh instance sees only the new generation on disk.
    let fresh = paddock_at(dir.path());
    assert!(fresh.get_entity("colt_0000").is_some());
    assert!(fresh.get_entity("horse_0000").is_none());
}

#[test]
fn failed_rebuild_degrades_only_the_missing_shard() {
    let dir = tempfile::tempdir().unwrap();
    write_mirror(dir.path(), &seed_dataset(25));
    paddock_at(dir.path()).ensure_loaded();

    let paddock = paddock_at(dir.path());
    paddock.ensure_loaded();
    // No mirror to rebuild from, and one shard gone out of band.
    std::fs::remove_file(dir.path().join("knowledge.json")).unwrap();
    std::fs::remove_file(dir.path().join("shards/shard_00001.json")).unwrap();

    // Horses in the deleted shard (8..=15 at shard_size 8) are gone.
    assert!(paddock.get_entity("horse_0008").is_none());
    assert_eq!(paddock.diagnostics().store.missing_shard_rebuilds, 1);

    // Everything the intact shards hold must still resolve.
    for name in ["horse_0000", "horse_0007", "horse_0016", "horse_0024"] {
        assert!(
            paddock.get_entity(name).is_some(),
            "{name} lives in an intact shard and must survive the failed rebuild"
        );
    }
    assert!(paddock.is_loaded());
    assert_eq!(paddock.total_count(), 25, "index still covers the full dataset");
}

#[test]
fn refresh_without_a_source_is_a_transfer_error() {
    let dir = tempfile::tempdir().unwrap();
    write_mirror(dir.path(), &seed_dataset(5));
    let paddock = paddock_at(dir.path());

    let err = paddock.refresh().unwrap_err();
    assert!(err.is_transient_source(), "unexpected error: {err}");
    // The failed refresh must not disturb served data.
    assert!(paddock.get_entity("horse_0001").is_some());
}
