// src/viewer/evictqueue.rs

//! Implements the [`EvictionQueue`], bounding resident parsed-output
//! memory across potentially huge logs.
//!
//! [`EvictionQueue`]: crate::viewer::evictqueue::EvictionQueue

use crate::common::PacketIndex;
use crate::viewer::collection::ItemCollection;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use ::lru::LruCache;
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Recency order over cached item indices. [LRU cache] keyed by index;
/// the value is unused.
///
/// [LRU cache]: https://docs.rs/lru/0.12.0/lru/index.html
type RecencyQueue = LruCache<PacketIndex, ()>;

/// Default high-water count of resident parsed outputs for automatic
/// eviction.
pub const EVICT_HIGH_WATER_DEFAULT: usize = 1024;

/// Recency-ordered queue of item indices that currently hold a
/// non-`Unparsed` state; evicts the least-recently-touched parses.
///
/// Eviction is advisory and asynchronous: it runs opportunistically on
/// [`touch`] when enabled, or on explicit [`evict_one`] / [`drop_cache`]
/// requests. Automatic eviction is disabled by default; when disabled, no
/// automatic eviction occurs and memory grows unbounded until an explicit
/// full-cache drop. Toggling takes effect immediately.
///
/// [`touch`]: EvictionQueue::touch
/// [`evict_one`]: EvictionQueue::evict_one
/// [`drop_cache`]: EvictionQueue::drop_cache
pub struct EvictionQueue {
    queue: Mutex<RecencyQueue>,
    enabled: AtomicBool,
    high_water: AtomicUsize,
}

impl Default for EvictionQueue {
    fn default() -> EvictionQueue {
        EvictionQueue::new()
    }
}

impl EvictionQueue {
    pub fn new() -> EvictionQueue {
        EvictionQueue {
            queue: Mutex::new(RecencyQueue::unbounded()),
            enabled: AtomicBool::new(false),
            high_water: AtomicUsize::new(EVICT_HIGH_WATER_DEFAULT),
        }
    }

    fn lock_queue(&self) -> MutexGuard<'_, RecencyQueue> {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Enable or disable automatic eviction. Takes effect immediately; no
    /// log reopen required.
    pub fn set_enabled(
        &self,
        enabled: bool,
    ) {
        defñ!("enabled {}", enabled);
        self.enabled
            .store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
            .load(Ordering::SeqCst)
    }

    /// Set the high-water count automatic eviction trims down to.
    pub fn set_high_water(
        &self,
        high_water: usize,
    ) {
        self.high_water
            .store(high_water, Ordering::SeqCst);
    }

    pub fn high_water(&self) -> usize {
        self.high_water
            .load(Ordering::SeqCst)
    }

    /// Count of indices currently tracked (items holding a parsed state).
    pub fn len(&self) -> usize {
        self.lock_queue()
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record that `index`'s parsed output was just read: move/insert the
    /// index at the most-recent end. O(1) amortized.
    ///
    /// While automatic eviction is enabled this also trims the cache down
    /// to the high-water count.
    pub fn touch(
        &self,
        index: PacketIndex,
        items: &ItemCollection,
    ) {
        {
            let mut queue = self.lock_queue();
            queue.put(index, ());
        }
        if self.is_enabled() {
            self.evict_to_high_water(items);
        }
    }

    /// Remove and return the least-recently-touched index, resetting that
    /// item's state to `Unparsed`. Returns `None` when the queue is
    /// empty.
    pub fn evict_one(
        &self,
        items: &ItemCollection,
    ) -> Option<PacketIndex> {
        let (index, _) = {
            let mut queue = self.lock_queue();
            queue.pop_lru()?
        };
        // the item may be gone already if the collection was cleared
        // between the pop and the get; the queue entry is dropped either way
        if let Ok(itemp) = items.get(index) {
            itemp.evict();
        }
        defñ!("evicted item {}", index);

        Some(index)
    }

    /// Evict until at most the high-water count of parses remain.
    fn evict_to_high_water(
        &self,
        items: &ItemCollection,
    ) {
        let high_water: usize = self.high_water();
        while self.len() > high_water {
            if self
                .evict_one(items)
                .is_none()
            {
                break;
            }
        }
    }

    /// Reset every item's state to `Unparsed` and forget all recency
    /// tracking.
    ///
    /// Per-item state replacement is serialized on each item's own lock,
    /// so a concurrent reader observes either the fully-cached or the
    /// fully-evicted state of any one item, never a torn output.
    pub fn drop_cache(
        &self,
        items: &ItemCollection,
    ) {
        defn!();
        {
            let mut queue = self.lock_queue();
            queue.clear();
        }
        let count: usize = items.count();
        for index in 0..count {
            if let Ok(itemp) = items.get(index) {
                itemp.evict();
            }
        }
        defx!("dropped cache of {} items", count);
    }

    /// Forget all recency tracking without touching item state. Used on
    /// log close after the collection is cleared.
    pub fn forget(&self) {
        self.lock_queue()
            .clear();
    }
}
