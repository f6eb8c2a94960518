// src/common.rs
//
// common imports, type aliases, and other globals (avoids circular imports)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// file-handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub use std::fs::File;
pub use std::path::Path;

/// `F`ake `Path` or `F`ile `Path`
pub type FPath = String;
pub type FileMetadata = std::fs::Metadata;
pub type FileOpenOptions = std::fs::OpenOptions;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// packets and the Item Collection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Position of a packet within an open log. Zero based, contiguous,
/// stable for the lifetime of the open log.
pub type PacketIndex = usize;

/// Sequence of Bytes
pub type Bytes = Vec<u8>;

/// A transport-level packet-type identifier. Only meaningful for protocols
/// that define an opcode enumeration.
pub type Opcode = u32;

/// Count of _things_ (packets read, items scanned, bytes written, …)
pub type Count = u64;

/// An integer percentage `0..=100` for progress reporting.
pub type Percent = u8;

/// Offset into a file in bytes
pub type FileOffset = u64;

/// Size of a file in bytes
pub type FileSz = u64;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// cooperative cancellation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Cooperative cancellation signal shared between a controlling thread and
/// one long-running worker (read, export, or search).
///
/// Workers poll [`is_cancelled`] once per item or record; they never check
/// mid-parse.
///
/// [`is_cancelled`]: CancelToken::is_cancelled
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag
            .store(true, Ordering::SeqCst);
    }

    #[inline(always)]
    pub fn is_cancelled(&self) -> bool {
        self.flag
            .load(Ordering::SeqCst)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// custom Results enums for scanning functions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `Result` Extended
/// for directional scanning functions (search, export).
///
/// `Cancelled` is a distinct terminal outcome, not an error; it carries no
/// payload and triggers no completion callback.
#[derive(Clone, Copy, Debug)]
pub enum ResultFind<T, E> {
    /// Contains the matching data
    Found(T),

    /// The scan ran to the collection boundary without a match;
    /// nothing to return, but no bad errors happened
    NotFound,

    /// The scan was cancelled cooperatively before completing
    Cancelled,

    /// Contains the error value, something bad happened
    Err(E),
}

// Equality compares only the success-carrying variants; the `Err` payload
// may be a non-`PartialEq` type (e.g. `std::io::Error`), so two `Err`
// values never compare equal, matching `contains`'s treatment of `Err`.
impl<T: PartialEq, E> PartialEq for ResultFind<T, E> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ResultFind::Found(a), ResultFind::Found(b)) => a == b,
            (ResultFind::NotFound, ResultFind::NotFound) => true,
            (ResultFind::Cancelled, ResultFind::Cancelled) => true,
            _ => false,
        }
    }
}

impl<T, E> ResultFind<T, E> {
    // Querying the contained values

    /// Returns `true` if the result is [`Found`, `NotFound`, `Cancelled`].
    #[allow(dead_code)]
    #[must_use = "if you intended to assert that this is ok, consider `.unwrap()` instead"]
    #[inline(always)]
    pub const fn is_ok(&self) -> bool {
        matches!(*self, ResultFind::Found(_) | ResultFind::NotFound | ResultFind::Cancelled)
    }

    /// Returns `true` if the result is [`Found`].
    #[inline(always)]
    pub const fn is_found(&self) -> bool {
        matches!(*self, ResultFind::Found(_))
    }

    /// Returns `true` if the result is [`Err`].
    #[allow(dead_code)]
    #[must_use = "if you intended to assert that this is err, consider `.unwrap_err()` instead"]
    #[inline(always)]
    pub const fn is_err(&self) -> bool {
        !self.is_ok()
    }

    /// Returns `true` if the result is [`NotFound`].
    #[inline(always)]
    pub const fn is_not_found(&self) -> bool {
        matches!(*self, ResultFind::NotFound)
    }

    /// Returns `true` if the result is [`Cancelled`].
    #[inline(always)]
    pub const fn is_cancelled(&self) -> bool {
        matches!(*self, ResultFind::Cancelled)
    }

    /// Returns `true` if the result is a [`Found`] value containing the given value.
    #[allow(dead_code)]
    #[must_use]
    #[inline(always)]
    pub fn contains<U>(&self, x: &U) -> bool
    where
        U: PartialEq<T>,
    {
        match self {
            ResultFind::Found(y) => x == y,
            ResultFind::NotFound => false,
            ResultFind::Cancelled => false,
            ResultFind::Err(_) => false,
        }
    }

    // Adapter for each variant

    /// Converts from `ResultFind<T, E>` to [`Option<T>`].
    ///
    /// Converts `self` into an [`Option<T>`], consuming `self`,
    /// and discarding the error, if any.
    #[allow(dead_code)]
    #[inline(always)]
    pub fn ok(self) -> Option<T> {
        match self {
            ResultFind::Found(x) => Some(x),
            ResultFind::NotFound => None,
            ResultFind::Cancelled => None,
            ResultFind::Err(_) => None,
        }
    }

    /// Converts from `ResultFind<T, E>` to [`Option<E>`].
    ///
    /// Converts `self` into an [`Option<E>`], consuming `self`,
    /// and discarding the success value, if any.
    #[allow(dead_code)]
    #[inline(always)]
    pub fn err(self) -> Option<E> {
        match self {
            ResultFind::Found(_) => None,
            ResultFind::NotFound => None,
            ResultFind::Cancelled => None,
            ResultFind::Err(x) => Some(x),
        }
    }
}

impl<T, E> std::fmt::Display for ResultFind<T, E>
where
    E: std::fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultFind::Found(_) => { write!(f, "ResultFind::Found") },
            ResultFind::NotFound => { write!(f, "ResultFind::NotFound") },
            ResultFind::Cancelled => { write!(f, "ResultFind::Cancelled") },
            ResultFind::Err(err) => { write!(f, "ResultFind::Err({})", err) },
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// progress reporting
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Derive an integer percentage from a processed count and a total count.
///
/// `total == 0` yields `100`.
#[inline(always)]
pub fn percent_of(processed: Count, total: Count) -> Percent {
    if total == 0 {
        return 100;
    }
    ((processed * 100) / total) as Percent
}

/// Tracks the last emitted integer percentage so progress consumers are not
/// flooded; `update` returns `Some` only when the integer value changes.
#[derive(Debug, Default)]
pub struct ProgressCoalesce {
    last: Percent,
}

impl ProgressCoalesce {
    pub fn new() -> ProgressCoalesce {
        ProgressCoalesce { last: 0 }
    }

    /// Returns `Some(percent)` when the integer percentage differs from the
    /// previously emitted one, else `None`.
    pub fn update(&mut self, processed: Count, total: Count) -> Option<Percent> {
        let percent: Percent = percent_of(processed, total);
        if percent != self.last {
            self.last = percent;
            return Some(percent);
        }
        None
    }
}
