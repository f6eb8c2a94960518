// src/viewer/collection.rs

//! Implements the [`ItemCollection`], the ordered, capacity-managed
//! container of [`ViewerItem`]s.
//!
//! [`ItemCollection`]: crate::viewer::collection::ItemCollection
//! [`ViewerItem`]: crate::data::item::ViewerItem

use crate::common::PacketIndex;
use crate::data::item::{ViewerItem, ViewerItemP};
use crate::data::packet::PacketRecord;
use crate::readers::netlog::RawRecord;

use std::io::{Error, ErrorKind, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use ::more_asserts::debug_assert_le;
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Ordered, indexable store of [`ViewerItem`]s with a bulk-load fast path.
///
/// Item indices are contiguous `0..N-1` and never change after load. The
/// logical length never shrinks while a log is open; it only grows during
/// load or resets to empty on [`clear`] (log close).
///
/// Concurrent reads of distinct items need no coordination beyond the
/// inner read lock; appends are serialized by the write lock.
///
/// [`ViewerItem`]: crate::data::item::ViewerItem
/// [`clear`]: ItemCollection::clear
pub struct ItemCollection {
    items: RwLock<Vec<ViewerItemP>>,
    /// Set between `suspend_updating` and `resume_updating`; while set,
    /// appends skip per-item derived-state assignment.
    suspended: AtomicBool,
}

impl Default for ItemCollection {
    fn default() -> ItemCollection {
        ItemCollection::new()
    }
}

impl ItemCollection {
    pub fn new() -> ItemCollection {
        ItemCollection {
            items: RwLock::new(Vec::new()),
            suspended: AtomicBool::new(false),
        }
    }

    fn read_items(&self) -> RwLockReadGuard<'_, Vec<ViewerItemP>> {
        self.items
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_items(&self) -> RwLockWriteGuard<'_, Vec<ViewerItemP>> {
        self.items
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Pre-allocate backing storage for `capacity` total items.
    ///
    /// No-op when the current capacity is already sufficient. Existing
    /// contents are never reset.
    pub fn reserve(
        &self,
        capacity: usize,
    ) {
        let mut items = self.write_items();
        if capacity > items.capacity() {
            let additional: usize = capacity - items.len();
            defñ!("reserve {} additional", additional);
            items.reserve(additional);
        }
    }

    /// Begin a bulk-append phase: subsequent appends skip per-item
    /// derived-state assignment until [`resume_updating`].
    ///
    /// Nesting is not supported; suspending while already suspended is a
    /// programming error.
    ///
    /// [`resume_updating`]: ItemCollection::resume_updating
    pub fn suspend_updating(&self) -> Result<()> {
        if self
            .suspended
            .swap(true, Ordering::SeqCst)
        {
            return Err(Error::new(ErrorKind::InvalidInput, "updating is already suspended"));
        }
        defñ!();

        Ok(())
    }

    /// End a bulk-append phase and run exactly one bulk derived-state
    /// pass, equivalent to having updated on every append.
    ///
    /// Calling without a matching pending suspension is a programming
    /// error.
    pub fn resume_updating(&self) -> Result<()> {
        if !self
            .suspended
            .swap(false, Ordering::SeqCst)
        {
            return Err(Error::new(ErrorKind::InvalidInput, "updating is not suspended"));
        }
        defñ!();
        self.update();

        Ok(())
    }

    /// Is the collection inside a suspended bulk-append phase?
    pub fn is_suspended(&self) -> bool {
        self.suspended
            .load(Ordering::SeqCst)
    }

    /// One bulk derived-state pass: assign every item its display
    /// sequence number.
    pub fn update(&self) {
        let items = self.read_items();
        defn!("update {} items", items.len());
        for (index, item) in items.iter().enumerate() {
            item.set_seq(index);
        }
        defx!();
    }

    /// Add a new [`ViewerItem`] at the next index, returning that index.
    ///
    /// O(1) amortized while suspended; assigns derived state immediately
    /// when not suspended.
    ///
    /// [`ViewerItem`]: crate::data::item::ViewerItem
    pub fn append(
        &self,
        record: RawRecord,
    ) -> PacketIndex {
        let mut items = self.write_items();
        let index: PacketIndex = items.len();
        let packet = PacketRecord::new(index, record.data, record.opcode, record.time);
        let item = ViewerItem::new(packet);
        if !self.is_suspended() {
            item.set_seq(index);
        }
        items.push(ViewerItemP::new(item));

        index
    }

    /// Bounds-checked random access.
    pub fn get(
        &self,
        index: PacketIndex,
    ) -> Result<ViewerItemP> {
        let items = self.read_items();
        match items.get(index) {
            Some(itemp) => {
                debug_assert_le!(index, items.len());
                Ok(itemp.clone())
            }
            None => Err(Error::new(
                ErrorKind::InvalidInput,
                format!("index {} out of range [0, {})", index, items.len()),
            )),
        }
    }

    /// Current length.
    pub fn count(&self) -> usize {
        self.read_items()
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Current backing-storage capacity.
    pub fn capacity(&self) -> usize {
        self.read_items()
            .capacity()
    }

    /// Release all items. Used on log close.
    pub fn clear(&self) {
        let mut items = self.write_items();
        defñ!("clear {} items", items.len());
        items.clear();
        self.suspended
            .store(false, Ordering::SeqCst);
    }
}
