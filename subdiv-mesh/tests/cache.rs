//! Tests for the cache module.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use subdiv_mesh::{
    buffer::slot_count,
    cache::*,
    Error,
};

#[test]
fn test_slot_count_for_both_widths() {
    // Three floats fit into one slot of either width.
    assert_eq!(slot_count(12, EvalWidth::Four.lanes()), 1);
    assert_eq!(slot_count(12, EvalWidth::Eight.lanes()), 1);
    // Twenty floats.
    assert_eq!(slot_count(80, EvalWidth::Four.lanes()), 5);
    assert_eq!(slot_count(80, EvalWidth::Eight.lanes()), 3);
    assert_eq!(EvalWidth::try_from(8).unwrap(), EvalWidth::Eight);
    assert!(EvalWidth::try_from(16).is_err());
}

#[test]
fn test_fetch_is_idempotent() {
    let cache = PatchCache::<Vec<f32>>::new(4, &[2], &[]);
    let calls = AtomicUsize::new(0);
    let make = |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![1.0, 2.0, 3.0])
    };

    let first = cache.fetch(CacheTable::Vertex(0), 3, 1, make).unwrap();
    let second = cache.fetch(CacheTable::Vertex(0), 3, 1, make).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
    assert_eq!(stats.valid_entries, 1);
    assert_eq!(stats.entries, 8);
    assert_eq!(stats.hit_rate(), 0.5);
}

#[test]
fn test_level_invalidation_recomputes_once() {
    let cache = PatchCache::<u64>::new(1, &[1], &[]);
    let calls = AtomicUsize::new(0);
    let make = |_| Ok(calls.fetch_add(1, Ordering::SeqCst) as u64);

    cache.fetch(CacheTable::Vertex(0), 0, 0, make).unwrap();
    let topology_generation = cache.topology_generation();
    let level_generation = cache.level_generation();

    cache.invalidate_levels_only();
    assert!(!cache.is_valid(CacheTable::Vertex(0), 0, 0));
    assert_eq!(cache.topology_generation(), topology_generation);
    assert_eq!(cache.level_generation(), level_generation + 1);

    let refreshed = cache.fetch(CacheTable::Vertex(0), 0, 0, make).unwrap();
    let again = cache.fetch(CacheTable::Vertex(0), 0, 0, make).unwrap();
    assert_eq!((*refreshed, *again), (1, 1));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_topology_invalidation_advances_both_generations() {
    let cache = PatchCache::<u64>::new(1, &[1], &[]);
    let (topology, level) = (cache.topology_generation(), cache.level_generation());

    cache.invalidate_topology();

    assert_eq!(cache.topology_generation(), topology + 1);
    assert_eq!(cache.level_generation(), level + 1);
}

#[test]
fn test_invalidation_during_recompute_leaves_the_entry_stale() {
    let cache = PatchCache::<u64>::new(1, &[1], &[]);
    let before = cache.level_generation();

    let patch = cache
        .fetch(CacheTable::Vertex(0), 0, 0, |_| {
            cache.invalidate_levels_only();
            Ok(before)
        })
        .unwrap();
    assert_eq!(*patch, before);
    assert!(!cache.is_valid(CacheTable::Vertex(0), 0, 0));

    let refreshed = cache
        .fetch(CacheTable::Vertex(0), 0, 0, |_| Ok(cache.level_generation()))
        .unwrap();
    assert_eq!(*refreshed, before + 1);
    assert!(cache.is_valid(CacheTable::Vertex(0), 0, 0));
}

#[test]
fn test_concurrent_invalidation_settles_on_the_latest_generation() {
    let cache = PatchCache::<u64>::new(4, &[1], &[]);
    let make = |_| Ok(cache.level_generation());

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for round in 0..200 {
                    let primitive = round % 4;
                    let observed = cache.level_generation();
                    let patch = cache.fetch(CacheTable::Vertex(0), primitive, 0, make).unwrap();
                    // A returned patch is never older than the generation
                    // the caller saw.
                    assert!(*patch >= observed);
                }
            });
        }
        scope.spawn(|| {
            for _ in 0..50 {
                cache.invalidate_levels_only();
                std::thread::yield_now();
            }
        });
    });

    let generation = cache.level_generation();
    for primitive in 0..4 {
        let patch = cache.fetch(CacheTable::Vertex(0), primitive, 0, make).unwrap();
        assert!(*patch <= generation);
        assert!(cache.is_valid(CacheTable::Vertex(0), primitive, 0));
        let again = cache.fetch(CacheTable::Vertex(0), primitive, 0, make).unwrap();
        assert!(Arc::ptr_eq(&patch, &again));
    }
}

#[test]
fn test_failed_recompute_stays_stale_and_retries() {
    let cache = PatchCache::<u32>::new(2, &[1], &[]);

    let failed = cache.fetch(CacheTable::Vertex(0), 1, 0, |_| {
        Err(Error::Evaluation("malformed patch".to_string()))
    });
    assert!(matches!(failed, Err(Error::Evaluation(_))));
    assert!(!cache.is_valid(CacheTable::Vertex(0), 1, 0));

    // The rest of the cache is unaffected.
    assert_eq!(*cache.fetch(CacheTable::Vertex(0), 0, 0, |_| Ok(7)).unwrap(), 7);

    let retried = cache.fetch(CacheTable::Vertex(0), 1, 0, |_| Ok(9)).unwrap();
    assert_eq!(*retried, 9);

    let stats = cache.stats();
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.misses, 3);
    assert_eq!(stats.valid_entries, 2);
}

#[test]
fn test_stale_patches_are_recycled_unless_shared() {
    let cache = PatchCache::<Vec<f32>>::new(1, &[1], &[]);
    let held = cache
        .fetch(CacheTable::Vertex(0), 0, 0, |_| Ok(vec![0.0; 16]))
        .unwrap();

    // A reader still holds the patch, so it cannot be handed back.
    cache.invalidate_levels_only();
    let mut recycled = None;
    cache
        .fetch(CacheTable::Vertex(0), 0, 0, |stale| {
            recycled = Some(stale.is_some());
            Ok(vec![1.0; 16])
        })
        .unwrap();
    assert_eq!(recycled, Some(false));
    assert_eq!(held[0], 0.0);

    // Nobody holds the second patch.
    cache.invalidate_levels_only();
    let mut recycled = None;
    cache
        .fetch(CacheTable::Vertex(0), 0, 0, |stale| {
            recycled = stale;
            Ok(vec![2.0; 16])
        })
        .unwrap();
    assert_eq!(recycled, Some(vec![1.0; 16]));
}

#[test]
fn test_concurrent_misses_build_once() {
    let cache = PatchCache::<usize>::new(8, &[1], &[]);
    let calls = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for primitive in 0..8 {
                    let patch = cache
                        .fetch(CacheTable::Vertex(0), primitive, 0, |_| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok(primitive * 10)
                        })
                        .unwrap();
                    assert_eq!(*patch, primitive * 10);
                }
            });
        }
    });

    assert_eq!(calls.load(Ordering::SeqCst), 8);
    assert_eq!(cache.stats().misses, 8);
    assert_eq!(cache.stats().hits, 56);
}

#[test]
fn test_addressing_errors() {
    let cache = PatchCache::<u8>::new(2, &[1, 1], &[0, 2]);

    assert!(matches!(
        cache.fetch(CacheTable::Vertex(2), 0, 0, |_| Ok(0)),
        Err(Error::TimeStepOutOfRange { time_step: 2, time_steps: 2 })
    ));
    assert!(matches!(
        cache.fetch(CacheTable::Vertex(1), 2, 0, |_| Ok(0)),
        Err(Error::IndexOutOfBounds { index: 2, max: 1 })
    ));
    assert!(matches!(
        cache.fetch(CacheTable::User(0), 0, 0, |_| Ok(0)),
        Err(Error::UserBufferNotSet(0))
    ));
    assert_eq!(cache.slots(CacheTable::User(1)).unwrap(), 2);
    assert!(cache.fetch(CacheTable::User(1), 1, 1, |_| Ok(0)).is_ok());
}
