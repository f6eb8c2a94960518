// src/data/item.rs

//! Implements a [`ViewerItem`] struct: one packet plus its lazy parse
//! cache.
//!
//! [`ViewerItem`]: crate::data::item::ViewerItem

use crate::common::PacketIndex;
use crate::data::packet::{PacketP, PacketRecord};
use crate::data::parsed::{ParseError, ParseState, ParsedOutput, ParsedOutputP};
use crate::protocols::{ParserCreate, Protocol};

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ, den, deo, dex, deñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Thread-safe [Atomic Reference Counting Pointer] to a [`ViewerItem`].
///
/// [Atomic Reference Counting Pointer]: std::sync::Arc
pub type ViewerItemP = Arc<ViewerItem>;

/// Sentinel for a display sequence number not yet assigned; set while the
/// owning collection is in a suspended bulk-append phase.
pub const SEQ_UNASSIGNED: usize = usize::MAX;

/// One packet plus its lazy parse-cache slot.
///
/// Exactly one `ViewerItem` exists per packet index; the index is stable
/// for the lifetime of the open log. The [`ItemCollection`] exclusively
/// owns all `ViewerItem`s; external consumers receive shared
/// [`ViewerItemP`] access and may trigger parsing but never replace the
/// item identity.
///
/// The per-item [`Mutex`] around [`ParseState`] is what guarantees
/// _at-most-once materialization_: concurrent workers racing to parse the
/// same item serialize on it and converge on the same terminal state.
///
/// [`ItemCollection`]: crate::viewer::collection::ItemCollection
/// [`Mutex`]: std::sync::Mutex
pub struct ViewerItem {
    /// The immutable raw packet.
    packet: PacketP,
    /// The mutable parse-cache slot.
    state: Mutex<ParseState>,
    /// Derived display sequence number, or [`SEQ_UNASSIGNED`].
    ///
    /// Assigned per-append in normal mode, in one bulk pass by
    /// `ItemCollection::resume_updating` after a suspended bulk append.
    seq: AtomicUsize,
}

impl fmt::Debug for ViewerItem {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("ViewerItem")
            .field("index", &self.packet.index())
            .field("packet.len", &self.packet.len())
            .field("state", &self.state_summary())
            .finish()
    }
}

impl ViewerItem {
    /// Create a `ViewerItem` wrapping the passed packet, `Unparsed`.
    pub fn new(packet: PacketRecord) -> ViewerItem {
        ViewerItem {
            packet: PacketP::new(packet),
            state: Mutex::new(ParseState::Unparsed),
            seq: AtomicUsize::new(SEQ_UNASSIGNED),
        }
    }

    #[inline(always)]
    pub fn index(&self) -> PacketIndex {
        self.packet.index()
    }

    #[inline(always)]
    pub fn packet(&self) -> &PacketRecord {
        &self.packet
    }

    /// Clone of the shared packet pointer.
    pub fn packet_p(&self) -> PacketP {
        self.packet.clone()
    }

    /// Lock the parse-cache slot, recovering from a poisoned lock.
    ///
    /// State writes are whole-variant replacements so a panicked writer
    /// cannot leave a torn `ParsedOutput` behind.
    fn lock_state(&self) -> MutexGuard<'_, ParseState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// A point-in-time clone of the parse state.
    pub fn state_summary(&self) -> ParseState {
        self.lock_state()
            .clone()
    }

    /// Has parsing been attempted and terminated (`Parsed` or `Failed`)?
    pub fn is_parsed(&self) -> bool {
        self.lock_state()
            .is_parsed()
    }

    /// The parsed output, when in `Parsed`.
    pub fn parsed_output(&self) -> Option<ParsedOutputP> {
        self.lock_state()
            .output()
            .cloned()
    }

    /// The stored failure, when in `Failed`.
    pub fn parsing_error(&self) -> Option<ParseError> {
        self.lock_state()
            .error()
            .cloned()
    }

    /// Parse this item through the passed protocol if it has not already
    /// been parsed, returning the terminal state.
    ///
    /// Idempotent: a non-`Unparsed` item returns its existing terminal
    /// state without reconstructing anything. Parser-level errors are
    /// caught and stored as [`ParseState::Failed`]; they never propagate.
    ///
    /// The state lock is held across the parse, so at most one real parse
    /// executes per item; racing callers block and then observe the
    /// already-terminal state. Parsing is a pure function of the raw
    /// packet bytes and the passed protocol, so "last writer" is
    /// irrelevant.
    pub fn ensure_parsed(
        &self,
        protocol: &dyn Protocol,
    ) -> ParseState {
        let mut guard = self.lock_state();
        match &*guard {
            ParseState::Parsed(_) | ParseState::Failed(_) => {
                defñ!("item {} already parsed", self.index());
                return guard.clone();
            }
            ParseState::Unparsed | ParseState::Parsing => {}
        }
        defn!("item {} parse begin", self.index());
        *guard = ParseState::Parsing;
        let terminal: ParseState = match protocol.create_parser(&self.packet) {
            ParserCreate::Undefined => {
                ParseState::Parsed(ParsedOutputP::new(ParsedOutput::undefined()))
            }
            ParserCreate::Parser(mut parser) => match parser.parse(&self.packet) {
                Ok(output) => ParseState::Parsed(ParsedOutputP::new(output)),
                Err(err) => ParseState::Failed(err),
            },
        };
        *guard = terminal.clone();
        defx!("item {} parse end: is_parsed {}", self.index(), terminal.is_parsed());

        terminal
    }

    /// Discard any parsed output or stored failure, returning the slot to
    /// `Unparsed`. Returns `true` if something was discarded.
    ///
    /// Used by the eviction queue and by drop-cache. Readers serialized on
    /// the same lock observe either the fully-cached or the fully-evicted
    /// state, never a torn output.
    pub fn evict(&self) -> bool {
        let mut guard = self.lock_state();
        if !guard.is_parsed() {
            return false;
        }
        *guard = ParseState::Unparsed;

        true
    }

    // display sequence

    /// The derived display sequence number, when assigned.
    pub fn seq(&self) -> Option<usize> {
        match self.seq.load(Ordering::Acquire) {
            SEQ_UNASSIGNED => None,
            seq => Some(seq),
        }
    }

    pub(crate) fn set_seq(
        &self,
        seq: usize,
    ) {
        debug_assert_ne!(seq, SEQ_UNASSIGNED, "display sequence overflow");
        self.seq
            .store(seq, Ordering::Release);
    }
}
