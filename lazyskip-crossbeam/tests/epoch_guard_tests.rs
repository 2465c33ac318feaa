use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use rand::Rng;
use rstest::rstest;
use serial_test::serial;

use crossbeam_epoch as epoch;
use lazyskip_core::common_tests::skip_map_core_tests::*;
use lazyskip_core::common_tests::skip_map_stress_tests::*;
use lazyskip_core::{Descending, Natural, SkipListOptions};
use lazyskip_crossbeam::{EpochGuard, EpochSkipMap, EpochSkipSet};

#[rstest]
#[serial]
#[case::basic(test_basic_operations::<EpochGuard>)]
#[case::ordered_after_delete(test_ordered_after_delete::<EpochGuard>)]
#[case::store_overwrites(test_store_overwrites::<EpochGuard>)]
#[case::load_or_store(test_load_or_store::<EpochGuard>)]
#[case::load_or_store_lazy(test_load_or_store_lazy::<EpochGuard>)]
#[case::load_and_delete(test_load_and_delete::<EpochGuard>)]
#[case::range(test_range::<EpochGuard>)]
#[case::len(test_len::<EpochGuard>)]
#[case::clear(test_clear::<EpochGuard>)]
#[case::comparators(test_comparators_and_set::<EpochGuard>)]
#[case::against_btree(test_sequential_against_btree::<EpochGuard>)]
#[case::concurrent_stores(test_concurrent_stores::<EpochGuard>)]
fn core(#[case] test: fn()) {
    test();
}

#[rstest]
#[serial]
#[case::load_during_modifications(test_load_during_modifications::<EpochGuard>)]
#[case::concurrent_delete_same_key(test_concurrent_delete_same_key::<EpochGuard>)]
#[case::linearizability(test_linearizability::<EpochGuard>)]
#[case::extreme_contention_single_key(test_extreme_contention_single_key::<EpochGuard>)]
#[case::load_or_store_single_winner(test_load_or_store_single_winner::<EpochGuard>)]
#[case::lazy_producer_calls(test_lazy_producer_calls::<EpochGuard>)]
#[case::concurrent_overwrites(test_concurrent_overwrites::<EpochGuard>)]
#[case::range_during_modifications(test_range_during_modifications::<EpochGuard>)]
#[case::len_after_mixed_operations(test_len_after_mixed_operations::<EpochGuard>)]
#[case::progress(test_progress::<EpochGuard>)]
fn stress(#[case] test: fn()) {
    test();
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn flush_until(drops: &AtomicUsize, expected: usize) -> usize {
    for _ in 0..10_000 {
        if drops.load(Ordering::SeqCst) >= expected {
            break;
        }
        epoch::pin().flush();
    }
    drops.load(Ordering::SeqCst)
}

/// Removed entries are freed while the map is still alive.
#[test]
#[serial]
fn test_reclaims_while_running() {
    let drops = Arc::new(AtomicUsize::new(0));
    let map: EpochSkipMap<u32, DropCounter> = EpochSkipMap::new();

    for k in 0..1000 {
        map.store(k, DropCounter(Arc::clone(&drops)));
    }
    for k in 0..1000 {
        assert!(map.delete(&k));
    }

    assert_eq!(flush_until(&drops, 1000), 1000);
    assert!(map.is_empty());
}

/// Replaced values are reclaimed, the current one survives until drop.
#[test]
#[serial]
fn test_overwritten_values_reclaimed() {
    let drops = Arc::new(AtomicUsize::new(0));
    {
        let map: EpochSkipMap<u32, DropCounter> = EpochSkipMap::new();
        for _ in 0..100 {
            map.store(1, DropCounter(Arc::clone(&drops)));
        }
        assert_eq!(flush_until(&drops, 99), 99);
    }
    // The live value is dropped with the map.
    assert_eq!(drops.load(Ordering::SeqCst), 100);
}

/// A guarded reference keeps a removed value readable.
#[test]
#[serial]
fn test_get_survives_delete() {
    let map: EpochSkipMap<u32, String> = EpochSkipMap::new();
    map.store(7, "seven".to_string());

    let value = map.get(&7).unwrap();
    assert!(map.delete(&7));
    for _ in 0..100 {
        epoch::pin().flush();
    }
    assert_eq!(value.as_str(), "seven");
    assert_eq!(format!("{:?}", value), "EpochRef(\"seven\")");
}

#[rstest]
#[serial]
#[case::natural(false)]
#[case::descending(true)]
fn test_random_set_contents(#[case] descending: bool) {
    let mut rng = rand::rng();
    let keys: Vec<i32> = (0..2000).map(|_| rng.random_range(-10_000..10_000)).collect();

    let mut expected = keys.clone();
    expected.sort_unstable();
    expected.dedup();

    let collected: Vec<i32> = if descending {
        expected.reverse();
        let set: EpochSkipSet<i32, Descending> = keys.iter().copied().collect();
        set.iter().collect()
    } else {
        let set: EpochSkipSet<i32, Natural> = keys.iter().copied().collect();
        set.iter().collect()
    };
    assert_eq!(collected, expected);
}

#[test]
#[serial]
fn test_shared_map_with_custom_shape() {
    let options = SkipListOptions::default().with_max_level(8).with_branching(2);
    let map: Arc<EpochSkipMap<u64, u64>> = Arc::new(EpochSkipMap::with_options(options).unwrap());

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let map = Arc::clone(&map);
            thread::spawn(move || {
                for i in 0..1000 {
                    let key = i * 4 + t;
                    map.store(key, key * 2);
                    if i % 3 == 0 {
                        assert_eq!(map.load_and_delete(&key), Some(key * 2));
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let expected = (0..4000u64).filter(|k| (k / 4) % 3 != 0).count();
    assert_eq!(map.len(), expected);
    assert_eq!(map.iter().count(), expected);
}
