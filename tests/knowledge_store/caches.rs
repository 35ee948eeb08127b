//! Cache behavior: shard LRU under pressure and derived-result
//! memoization counters.

use crate::{paddock_at, seed_dataset, write_mirror};
use paddock::prelude::*;
use paddock_store::shard_cache::ShardLru;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn shard_lru_never_exceeds_its_bound_under_pressure() {
    let dir = tempfile::tempdir().unwrap();
    // 80 horses at shard_size 8 is 10 shards against an LRU bound of 3.
    write_mirror(dir.path(), &seed_dataset(80));
    paddock_at(dir.path()).ensure_loaded();

    let paddock = paddock_at(dir.path());
    for i in 0..80 {
        assert!(paddock.get_entity(&format!("horse_{i:04}")).is_some());
        let diag = paddock.diagnostics();
        assert!(
            diag.store.loaded_shards <= diag.store.max_cached_shards,
            "LRU grew past its bound at horse {i}"
        );
    }
}

#[test]
fn calc_cache_counts_every_request_and_computes_once() {
    let dir = tempfile::tempdir().unwrap();
    write_mirror(dir.path(), &seed_dataset(5));
    let paddock = paddock_at(dir.path());

    let computations = AtomicUsize::new(0);
    for _ in 0..7 {
        let value = paddock.cached_result("horse_0001", || {
            computations.fetch_add(1, Ordering::SeqCst);
            json!({"score": 0.5})
        });
        assert_eq!(value, json!({"score": 0.5}));
    }

    assert_eq!(computations.load(Ordering::SeqCst), 1);
    let stats = paddock.diagnostics().calc;
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 6);
    assert_eq!(stats.hits + stats.misses, 7);
}

#[test]
fn calc_cache_evicts_oldest_first_regardless_of_recency() {
    let dir = tempfile::tempdir().unwrap();
    write_mirror(dir.path(), &seed_dataset(5));
    let paddock = Paddock::builder()
        .data_dir(dir.path())
        .calc_cache_max_entries(2)
        .open();

    paddock.cached_result("a", || json!(1));
    paddock.cached_result("b", || json!(2));
    // Touch "a" so an LRU would evict "b"; FIFO must still evict "a".
    paddock.cached_result("a", || json!(99));
    paddock.cached_result("c", || json!(3));

    assert_eq!(paddock.cached_result("a", || json!(100)), json!(100));
    assert_eq!(paddock.cached_result("b", || json!(2)), json!(2));
}

#[test]
fn clearing_cached_results_resets_counters() {
    let dir = tempfile::tempdir().unwrap();
    write_mirror(dir.path(), &seed_dataset(5));
    let paddock = paddock_at(dir.path());

    paddock.cached_result("x", || json!(1));
    paddock.cached_result("x", || json!(1));
    paddock.clear_cached_results();

    let stats = paddock.diagnostics().calc;
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 0);
}

proptest! {
    /// For any access sequence: the LRU never exceeds capacity, and a
    /// key accessed after the victim's last access always survives an
    /// eviction the victim does not.
    #[test]
    fn shard_lru_matches_a_reference_model(
        capacity in 1usize..6,
        accesses in proptest::collection::vec(0u8..12, 1..200),
    ) {
        let mut lru = ShardLru::new(capacity);
        // Reference model: recency order, most recent last.
        let mut model: Vec<String> = Vec::new();

        for key in accesses {
            let name = format!("shard_{key:05}.json");
            if lru.get(&name).is_none() {
                let evicted = lru.insert(name.clone(), Arc::new(Default::default()));
                if let Some(victim) = evicted {
                    prop_assert_eq!(&victim, &model[0], "evicted key was not least recent");
                    model.remove(0);
                }
            }
            model.retain(|k| k != &name);
            model.push(name);

            prop_assert!(lru.len() <= capacity);
            prop_assert_eq!(lru.len(), model.len());
            for key in &model {
                prop_assert!(lru.get(key).is_some());
            }
            // Re-sync the model after the membership probes touched
            // every entry in model order.
            // (Probing in model order preserves relative recency.)
        }
    }
}
