// src/viewer/search.rs

//! Implements the [`SearchEngine`]: cancellable, progress-reporting
//! directional scans over the [`ItemCollection`].
//!
//! A search request moves through the states
//! `Queued → Running → {Found | NotFound | Cancelled | Failed}`.
//! Every terminal state emits exactly one completion event — except
//! `Cancelled`, which emits nothing; the request is abandoned silently.
//!
//! [`SearchEngine`]: crate::viewer::search::SearchEngine
//! [`ItemCollection`]: crate::viewer::collection::ItemCollection

use crate::common::{CancelToken, Count, PacketIndex, Percent, ProgressCoalesce, ResultFind};
use crate::data::item::ViewerItemP;
use crate::viewer::collection::ItemCollection;
use crate::viewer::matchers::MatchFn;

use std::io::Error;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use ::crossbeam_channel::{bounded, Receiver, Sender};
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ, den, deo, dex, deñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Scan direction across the collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchDirection {
    Forward,
    Backward,
}

impl SearchDirection {
    /// Per-item index step: `+1` forward, `-1` backward.
    const fn delta(self) -> isize {
        match self {
            SearchDirection::Forward => 1,
            SearchDirection::Backward => -1,
        }
    }
}

/// A directional, cancellable scan with a pluggable match predicate.
///
/// Immutable once constructed; owned solely by the worker executing it.
/// At most one search runs per collection at a time — starting a new one
/// implicitly requests cancellation of the previous.
pub struct SearchRequest {
    direction: SearchDirection,
    /// Start from the current selection plus one step, rather than from
    /// the relevant end of the collection.
    continuation: bool,
    matcher: MatchFn,
}

impl SearchRequest {
    pub fn new(
        direction: SearchDirection,
        continuation: bool,
        matcher: MatchFn,
    ) -> SearchRequest {
        SearchRequest {
            direction,
            continuation,
            matcher,
        }
    }

    pub fn direction(&self) -> SearchDirection {
        self.direction
    }

    pub fn is_continuation(&self) -> bool {
        self.continuation
    }
}

/// Typed [`ResultFind`] of one search: the matching item, `NotFound`,
/// `Cancelled`, or a worker error.
///
/// [`ResultFind`]: crate::common::ResultFind
pub type ResultSearch = ResultFind<ViewerItemP, Error>;

/// Event stream of one running search.
#[derive(Debug)]
pub enum SearchEvent {
    /// Coalesced integer progress percentage; emitted only when the
    /// value changes, monotonic.
    Progress(Percent),
    /// The single completion event. Never emitted for a cancelled
    /// search.
    Done(ResultSearch),
}

/// Lifecycle of one search request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SearchState {
    Queued = 0,
    Running = 1,
    Found = 2,
    NotFound = 3,
    Cancelled = 4,
    Failed = 5,
}

impl SearchState {
    fn from_u8(value: u8) -> SearchState {
        match value {
            0 => SearchState::Queued,
            1 => SearchState::Running,
            2 => SearchState::Found,
            3 => SearchState::NotFound,
            4 => SearchState::Cancelled,
            _ => SearchState::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, SearchState::Queued | SearchState::Running)
    }
}

/// Shared, observable [`SearchState`] slot.
#[derive(Clone, Debug)]
pub struct SearchStateCell {
    state: Arc<AtomicU8>,
}

impl SearchStateCell {
    fn new() -> SearchStateCell {
        SearchStateCell {
            state: Arc::new(AtomicU8::new(SearchState::Queued as u8)),
        }
    }

    fn set(
        &self,
        state: SearchState,
    ) {
        self.state
            .store(state as u8, Ordering::SeqCst);
    }

    pub fn get(&self) -> SearchState {
        SearchState::from_u8(
            self.state
                .load(Ordering::SeqCst),
        )
    }
}

/// Handle to one spawned search worker.
///
/// Dropping the handle detaches the worker; [`cancel`] requests
/// cooperative cancellation; [`events`] yields the progress stream and,
/// for non-cancelled requests, the single completion event.
///
/// [`cancel`]: SearchHandle::cancel
/// [`events`]: SearchHandle::events
pub struct SearchHandle {
    events: Receiver<SearchEvent>,
    cancel: CancelToken,
    state: SearchStateCell,
    joinh: Option<JoinHandle<()>>,
}

impl SearchHandle {
    /// A clonable receiver of this search's events.
    pub fn events(&self) -> Receiver<SearchEvent> {
        self.events
            .clone()
    }

    /// Request cooperative cancellation. The worker stops at the next
    /// item boundary; no completion event follows.
    pub fn cancel(&self) {
        self.cancel
            .cancel();
    }

    pub fn state(&self) -> SearchState {
        self.state
            .get()
    }

    /// Wait for the worker to finish. Idempotent.
    pub fn join(&mut self) {
        if let Some(joinh) = self.joinh.take() {
            let _ = joinh.join();
        }
    }
}

impl Drop for SearchHandle {
    fn drop(&mut self) {
        // an abandoned handle leaves the worker running detached; a
        // cancelled one winds down at its next checkpoint
        drop(self.joinh.take());
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// the scan
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Completion/progress channel capacity. Progress is coalesced to at
/// most 100 events per scan so this never blocks the worker, even with
/// an inattentive consumer.
const SEARCH_CHANNEL_CAPACITY: usize = 128;

/// Compute the starting index of a scan, or `None` when the scan is
/// empty before it begins (empty collection, or a continuation falling
/// off the collection edge).
///
/// A continuation request with no current selection falls back to the
/// relevant end, behaving as a non-continuation scan.
fn scan_start(
    count: usize,
    direction: SearchDirection,
    continuation: bool,
    selection: Option<PacketIndex>,
) -> Option<PacketIndex> {
    if count == 0 {
        return None;
    }
    match (continuation, selection, direction) {
        (true, Some(selected), SearchDirection::Forward) => {
            let start: PacketIndex = selected.checked_add(1)?;
            match start < count {
                true => Some(start),
                false => None,
            }
        }
        (true, Some(selected), SearchDirection::Backward) => selected.checked_sub(1),
        (_, _, SearchDirection::Forward) => Some(0),
        (_, _, SearchDirection::Backward) => Some(count - 1),
    }
}

/// Scan the collection for the first item matching the request's
/// predicate, synchronously.
///
/// The scan starts at `scan_start` and steps by the direction's delta
/// until a match, the collection boundary, or cancellation. The
/// cancellation flag is polled at each item boundary, never
/// mid-predicate. Progress percentages derive from the scanned count
/// over the total count and are reported only on integer change.
pub fn scan(
    items: &ItemCollection,
    request: &SearchRequest,
    selection: Option<PacketIndex>,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(Percent),
) -> ResultSearch {
    defn!("direction {:?} continuation {}", request.direction(), request.is_continuation());
    let count: usize = items.count();
    let start: PacketIndex =
        match scan_start(count, request.direction(), request.is_continuation(), selection) {
            Some(start) => start,
            None => {
                defx!("empty scan");
                return ResultFind::NotFound;
            }
        };
    let delta: isize = request
        .direction()
        .delta();
    let mut coalesce = ProgressCoalesce::new();
    let mut scanned: Count = 0;
    let mut at: isize = start as isize;
    while at >= 0 && (at as usize) < count {
        if cancel.is_cancelled() {
            defx!("cancelled after {} items", scanned);
            return ResultFind::Cancelled;
        }
        let itemp: ViewerItemP = match items.get(at as usize) {
            Ok(itemp) => itemp,
            Err(err) => {
                defx!("collection error at {}: {}", at, err);
                return ResultFind::Err(err);
            }
        };
        if (request.matcher)(&itemp) {
            defx!("found item {} after scanning {}", at, scanned + 1);
            return ResultFind::Found(itemp);
        }
        scanned += 1;
        if let Some(percent) = coalesce.update(scanned, count as Count) {
            progress(percent);
        }
        at += delta;
    }
    defx!("not found, scanned {}", scanned);

    ResultFind::NotFound
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// the engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Spawns search workers over one shared [`ItemCollection`].
pub struct SearchEngine {}

impl SearchEngine {
    /// Spawn a worker scanning `items` for `request`.
    ///
    /// `selection` seeds a continuation request's starting point. The
    /// returned handle carries the event receiver, the cancellation
    /// token, and the observable request state.
    pub fn spawn(
        items: Arc<ItemCollection>,
        request: SearchRequest,
        selection: Option<PacketIndex>,
    ) -> std::io::Result<SearchHandle> {
        let (tx, rx): (Sender<SearchEvent>, Receiver<SearchEvent>) =
            bounded(SEARCH_CHANNEL_CAPACITY);
        let cancel = CancelToken::new();
        let state = SearchStateCell::new();
        let cancel_w: CancelToken = cancel.clone();
        let state_w: SearchStateCell = state.clone();
        let joinh: JoinHandle<()> = thread::Builder::new()
            .name("search".to_string())
            .spawn(move || {
                state_w.set(SearchState::Running);
                let mut progress = |percent: Percent| {
                    // the channel cannot fill (capacity exceeds the
                    // coalesced event count); a dropped receiver is not
                    // the worker's concern
                    let _ = tx.send(SearchEvent::Progress(percent));
                };
                let result: ResultSearch =
                    scan(&items, &request, selection, &cancel_w, &mut progress);
                match result {
                    ResultFind::Cancelled => {
                        // abandoned silently: terminal state, no event
                        state_w.set(SearchState::Cancelled);
                    }
                    ResultFind::Found(itemp) => {
                        state_w.set(SearchState::Found);
                        let _ = tx.send(SearchEvent::Done(ResultFind::Found(itemp)));
                    }
                    ResultFind::NotFound => {
                        state_w.set(SearchState::NotFound);
                        let _ = tx.send(SearchEvent::Done(ResultFind::NotFound));
                    }
                    ResultFind::Err(err) => {
                        state_w.set(SearchState::Failed);
                        let _ = tx.send(SearchEvent::Done(ResultFind::Err(err)));
                    }
                }
            })?;

        Ok(SearchHandle {
            events: rx,
            cancel,
            state,
            joinh: Some(joinh),
        })
    }
}
