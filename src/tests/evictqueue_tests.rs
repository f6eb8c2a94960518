// src/tests/evictqueue_tests.rs

//! tests for `viewer/evictqueue.rs`

use crate::tests::common::{demo_collection, demo_context_with};
use crate::viewer::evictqueue::{EvictionQueue, EVICT_HIGH_WATER_DEFAULT};

use std::sync::Arc;

use ::more_asserts::assert_le;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn test_new_queue_is_disabled_and_empty() {
    let evict = EvictionQueue::new();
    assert!(!evict.is_enabled());
    assert!(evict.is_empty());
    assert_eq!(evict.high_water(), EVICT_HIGH_WATER_DEFAULT);
}

#[test]
fn test_evict_one_on_empty_queue_is_none() {
    let items = demo_collection();
    let evict = EvictionQueue::new();
    assert_eq!(evict.evict_one(&items), None);
}

#[test]
fn test_evict_one_removes_least_recently_touched() {
    let items = demo_collection();
    let evict = Arc::new(EvictionQueue::new());
    let ctx = demo_context_with(items.clone(), evict.clone());
    // parse (and thereby touch) items 0, 1, 2 in order
    for index in 0..3 {
        ctx.ensure_parsed(
            &items
                .get(index)
                .unwrap(),
        );
    }
    assert_eq!(evict.len(), 3);
    assert_eq!(evict.evict_one(&items), Some(0));
    assert!(!items
        .get(0)
        .unwrap()
        .is_parsed());
    assert!(items
        .get(1)
        .unwrap()
        .is_parsed());
    assert!(items
        .get(2)
        .unwrap()
        .is_parsed());
    assert_eq!(evict.len(), 2);
}

#[test]
fn test_touch_promotes_to_most_recent() {
    let items = demo_collection();
    let evict = Arc::new(EvictionQueue::new());
    let ctx = demo_context_with(items.clone(), evict.clone());
    for index in 0..3 {
        ctx.ensure_parsed(
            &items
                .get(index)
                .unwrap(),
        );
    }
    // re-reading item 0 promotes it; item 1 becomes the eviction victim
    ctx.ensure_parsed(
        &items
            .get(0)
            .unwrap(),
    );
    assert_eq!(evict.len(), 3);
    assert_eq!(evict.evict_one(&items), Some(1));
    assert_eq!(evict.evict_one(&items), Some(2));
    assert_eq!(evict.evict_one(&items), Some(0));
    assert_eq!(evict.evict_one(&items), None);
}

#[test]
fn test_disabled_queue_never_evicts_automatically() {
    let items = demo_collection();
    let evict = Arc::new(EvictionQueue::new());
    evict.set_high_water(1);
    let ctx = demo_context_with(items.clone(), evict.clone());
    for index in 0..items.count() {
        ctx.ensure_parsed(
            &items
                .get(index)
                .unwrap(),
        );
    }
    // all parses resident; memory growth is unbounded until a drop
    assert_eq!(evict.len(), items.count());
}

#[test]
fn test_enabled_queue_trims_to_high_water_on_touch() {
    let items = demo_collection();
    let evict = Arc::new(EvictionQueue::new());
    evict.set_high_water(2);
    evict.set_enabled(true);
    let ctx = demo_context_with(items.clone(), evict.clone());
    for index in 0..4 {
        ctx.ensure_parsed(
            &items
                .get(index)
                .unwrap(),
        );
        assert_le!(evict.len(), 2);
    }
    // the two oldest parses were evicted back to Unparsed
    assert!(!items
        .get(0)
        .unwrap()
        .is_parsed());
    assert!(!items
        .get(1)
        .unwrap()
        .is_parsed());
    assert!(items
        .get(2)
        .unwrap()
        .is_parsed());
    assert!(items
        .get(3)
        .unwrap()
        .is_parsed());
}

#[test]
fn test_toggling_takes_effect_immediately() {
    let items = demo_collection();
    let evict = Arc::new(EvictionQueue::new());
    evict.set_high_water(1);
    let ctx = demo_context_with(items.clone(), evict.clone());
    for index in 0..3 {
        ctx.ensure_parsed(
            &items
                .get(index)
                .unwrap(),
        );
    }
    assert_eq!(evict.len(), 3);
    evict.set_enabled(true);
    // the very next touch trims; no log reopen required
    ctx.ensure_parsed(
        &items
            .get(0)
            .unwrap(),
    );
    assert_eq!(evict.len(), 1);
}

#[test]
fn test_drop_cache_resets_every_item() {
    let items = demo_collection();
    let evict = Arc::new(EvictionQueue::new());
    let ctx = demo_context_with(items.clone(), evict.clone());
    for index in 0..items.count() {
        ctx.ensure_parsed(
            &items
                .get(index)
                .unwrap(),
        );
    }
    evict.drop_cache(&items);
    assert!(evict.is_empty());
    for index in 0..items.count() {
        assert!(!items
            .get(index)
            .unwrap()
            .is_parsed());
    }
}

/// Evicting then re-parsing is transparent to callers: the reproduced
/// output is identical to the pre-eviction one.
#[test]
fn test_eviction_round_trip_through_queue() {
    let items = demo_collection();
    let evict = Arc::new(EvictionQueue::new());
    let ctx = demo_context_with(items.clone(), evict.clone());
    let itemp = items
        .get(1)
        .unwrap();
    let before = ctx
        .ensure_parsed(&itemp)
        .output()
        .cloned()
        .unwrap();
    assert_eq!(evict.evict_one(&items), Some(1));
    assert!(!itemp.is_parsed());
    let after = ctx
        .ensure_parsed(&itemp)
        .output()
        .cloned()
        .unwrap();
    assert_eq!(*before, *after);
}
