// src/viewer/mod.rs

//! The viewing core of _nlvlib_.
//!
//! ## Overview of the viewer
//!
//! * An [`ItemCollection`] is the ordered store of [`ViewerItem`]s for
//!   one open log.
//! * An [`EvictionQueue`] bounds resident parsed-output memory.
//! * The [`matchers`] module is the search predicate catalog; the
//!   [`search`] module runs cancellable directional scans applying one
//!   predicate.
//! * A [`Viewer`] ties them together: it owns the collection, the
//!   current protocol, the queue, the current selection, and the
//!   background read/search/export workers, and is the surface the
//!   presentation layer talks to.
//!
//! Log reading, searching, and exporting each run on a dedicated worker
//! thread; results and progress flow back over [`crossbeam_channel`]
//! channels; cancellation flows in over [`CancelToken`]s.
//!
//! [`ItemCollection`]: crate::viewer::collection::ItemCollection
//! [`ViewerItem`]: crate::data::item::ViewerItem
//! [`EvictionQueue`]: crate::viewer::evictqueue::EvictionQueue
//! [`matchers`]: crate::viewer::matchers
//! [`search`]: crate::viewer::search
//! [`Viewer`]: crate::viewer::Viewer
//! [`CancelToken`]: crate::common::CancelToken

pub mod collection;
pub mod evictqueue;
pub mod matchers;
pub mod search;

use crate::common::{CancelToken, Count, PacketIndex, Percent, ResultFind};
use crate::data::item::{ViewerItem, ViewerItemP};
use crate::data::parsed::ParseState;
use crate::printer::export::export_parsed_text;
use crate::protocols::{ProtocolP, ProtocolRegistry};
use crate::readers::netlog::NetworkLog;
use crate::viewer::collection::ItemCollection;
use crate::viewer::evictqueue::EvictionQueue;
use crate::viewer::search::{SearchEngine, SearchEvent, SearchHandle, SearchRequest};

use std::io::{Error, ErrorKind, Result, Write};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::thread;
use std::thread::JoinHandle;

use ::crossbeam_channel::{bounded, Receiver, Sender};
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ, den, deo, dex, deñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// parsing context
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything a predicate or exporter needs to parse items on demand:
/// the collection, the active protocol, and the eviction queue to
/// `touch` on every parsed-output read.
///
/// Cheap to clone; workers capture one per request so a later protocol
/// switch cannot change a scan mid-flight.
#[derive(Clone)]
pub struct ParseContext {
    items: Arc<ItemCollection>,
    protocol: ProtocolP,
    evict: Arc<EvictionQueue>,
}

impl ParseContext {
    pub fn new(
        items: Arc<ItemCollection>,
        protocol: ProtocolP,
        evict: Arc<EvictionQueue>,
    ) -> ParseContext {
        ParseContext {
            items,
            protocol,
            evict,
        }
    }

    pub fn protocol(&self) -> &dyn crate::protocols::Protocol {
        self.protocol
            .as_ref()
    }

    pub fn protocol_p(&self) -> ProtocolP {
        self.protocol
            .clone()
    }

    pub fn items(&self) -> &ItemCollection {
        &self.items
    }

    /// Parse `item` through the active protocol if needed (idempotent)
    /// and record the access with the eviction queue.
    pub fn ensure_parsed(
        &self,
        item: &ViewerItem,
    ) -> ParseState {
        let state: ParseState = item.ensure_parsed(self.protocol());
        if state.is_parsed() {
            self.evict
                .touch(item.index(), &self.items);
        }

        state
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// worker events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Worker-event channel capacity. Progress is coalesced to at most 100
/// events per run, so a full channel never stalls a worker.
const WORKER_CHANNEL_CAPACITY: usize = 128;

/// Summary delivered when a log read completes.
#[derive(Clone, Debug)]
pub struct ReadSummary {
    /// Records appended to the collection.
    pub count: Count,
    /// Protocol identifier recorded in the log container, when any; the
    /// read worker has already activated it if it was registered.
    pub suggested_protocol: Option<String>,
    /// The read stopped early on a cancellation request.
    pub cancelled: bool,
}

/// Event stream of one log-read worker.
#[derive(Debug)]
pub enum ReadEvent {
    Progress(Percent),
    Done(Result<ReadSummary>),
}

/// Event stream of one export worker.
#[derive(Debug)]
pub enum ExportEvent {
    Progress(Percent),
    Done(ResultFind<Count, Error>),
}

/// Cancellation token and join handle of one background worker.
struct WorkerHandle {
    cancel: CancelToken,
    joinh: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    fn cancel_and_join(&mut self) {
        self.cancel
            .cancel();
        if let Some(joinh) = self.joinh.take() {
            let _ = joinh.join();
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// the Viewer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The viewing core: one open log's item collection, current protocol,
/// eviction queue, selection, and background workers.
///
/// The registry is constructed once at startup and passed in by
/// reference; it is never ambient global state.
pub struct Viewer {
    registry: Arc<ProtocolRegistry>,
    items: Arc<ItemCollection>,
    evict: Arc<EvictionQueue>,
    protocol: Arc<RwLock<Option<ProtocolP>>>,
    log: Arc<Mutex<Option<Box<dyn NetworkLog>>>>,
    selected: Mutex<Option<PacketIndex>>,
    read_worker: Mutex<Option<WorkerHandle>>,
    export_worker: Mutex<Option<WorkerHandle>>,
    search_worker: Mutex<Option<SearchHandle>>,
}

impl Viewer {
    pub fn new(registry: Arc<ProtocolRegistry>) -> Viewer {
        Viewer {
            registry,
            items: Arc::new(ItemCollection::new()),
            evict: Arc::new(EvictionQueue::new()),
            protocol: Arc::new(RwLock::new(None)),
            log: Arc::new(Mutex::new(None)),
            selected: Mutex::new(None),
            read_worker: Mutex::new(None),
            export_worker: Mutex::new(None),
            search_worker: Mutex::new(None),
        }
    }

    // accessors

    pub fn registry(&self) -> &ProtocolRegistry {
        &self.registry
    }

    pub fn items(&self) -> &ItemCollection {
        &self.items
    }

    pub fn count(&self) -> usize {
        self.items
            .count()
    }

    pub fn get(
        &self,
        index: PacketIndex,
    ) -> Result<ViewerItemP> {
        self.items
            .get(index)
    }

    pub fn capacity(&self) -> usize {
        self.items
            .capacity()
    }

    fn lock_opt<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
        mutex
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // selection

    /// The currently selected item index, when any. Continuation
    /// searches start one step past it.
    pub fn selected(&self) -> Option<PacketIndex> {
        *Self::lock_opt(&self.selected)
    }

    /// Set the selection. Bounds-checked.
    pub fn set_selected(
        &self,
        index: PacketIndex,
    ) -> Result<()> {
        // get() performs the bounds check
        let _itemp: ViewerItemP = self
            .items
            .get(index)?;
        *Self::lock_opt(&self.selected) = Some(index);

        Ok(())
    }

    pub fn clear_selected(&self) {
        *Self::lock_opt(&self.selected) = None;
    }

    // protocol

    /// The active protocol, when one is set.
    pub fn current_protocol(&self) -> Option<ProtocolP> {
        self.protocol
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Activate the registered protocol with identifier `id`.
    ///
    /// Parsed outputs are a function of the active protocol, so
    /// switching drops the parse cache; re-parses under the new protocol
    /// happen lazily.
    pub fn set_protocol(
        &self,
        id: &str,
    ) -> Result<ProtocolP> {
        let protocolp: ProtocolP = self
            .registry
            .find_by_id(id)
            .ok_or_else(|| {
                Error::new(ErrorKind::NotFound, format!("no protocol registered with id {:?}", id))
            })?;
        let previous: Option<ProtocolP> = {
            let mut guard = self
                .protocol
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::replace(&mut *guard, Some(protocolp.clone()))
        };
        match previous {
            Some(ref prev) if prev.id() == protocolp.id() => {}
            Some(_) => {
                defñ!("protocol changed to {:?}, dropping parse cache", id);
                self.evict
                    .drop_cache(&self.items);
            }
            None => {}
        }

        Ok(protocolp)
    }

    /// The parse context of the moment: collection + active protocol +
    /// eviction queue. Fails when no protocol is active.
    pub fn parse_context(&self) -> Result<ParseContext> {
        let protocolp: ProtocolP = self
            .current_protocol()
            .ok_or_else(|| Error::new(ErrorKind::Other, "no protocol is active"))?;

        Ok(ParseContext::new(self.items.clone(), protocolp, self.evict.clone()))
    }

    // parsing and the cache

    /// Parse the item at `index` on demand (idempotent), returning its
    /// terminal state.
    pub fn parse_item(
        &self,
        index: PacketIndex,
    ) -> Result<ParseState> {
        let ctx: ParseContext = self.parse_context()?;
        let itemp: ViewerItemP = self
            .items
            .get(index)?;

        Ok(ctx.ensure_parsed(&itemp))
    }

    /// Reset every item to `Unparsed`, releasing all parsed memory.
    pub fn drop_cache(&self) {
        self.evict
            .drop_cache(&self.items);
    }

    /// Enable or disable automatic recency-based eviction. Immediate.
    pub fn set_auto_eviction_enabled(
        &self,
        enabled: bool,
    ) {
        self.evict
            .set_enabled(enabled);
    }

    pub fn auto_eviction_enabled(&self) -> bool {
        self.evict
            .is_enabled()
    }

    /// Evict the least-recently-touched parse, if any. An explicit
    /// "idle tick" driver for hosts that want their own eviction timing.
    pub fn evict_one(&self) -> Option<PacketIndex> {
        self.evict
            .evict_one(&self.items)
    }

    pub fn eviction_queue(&self) -> &EvictionQueue {
        &self.evict
    }

    // reading

    /// Open a log and spawn the read worker.
    ///
    /// Any previously open log is closed first. The worker reserves
    /// collection capacity, suspends updating, streams every record in,
    /// closes the stream, resumes updating (one bulk derived-state
    /// pass), activates the log's suggested protocol when it is
    /// registered, and emits [`ReadEvent::Done`].
    pub fn open_log(
        &self,
        log: Box<dyn NetworkLog>,
    ) -> Result<Receiver<ReadEvent>> {
        self.close_log();
        defn!("open_log {:?}", log.name());
        let cancel = CancelToken::new();
        let (tx, rx): (Sender<ReadEvent>, Receiver<ReadEvent>) = bounded(WORKER_CHANNEL_CAPACITY);
        let items: Arc<ItemCollection> = self.items.clone();
        let registry: Arc<ProtocolRegistry> = self.registry.clone();
        let protocol: Arc<RwLock<Option<ProtocolP>>> = self.protocol.clone();
        let log_slot: Arc<Mutex<Option<Box<dyn NetworkLog>>>> = self.log.clone();
        let cancel_w: CancelToken = cancel.clone();
        let joinh: JoinHandle<()> = thread::Builder::new()
            .name("netlog-read".to_string())
            .spawn(move || {
                let mut log = log;
                let result: Result<ReadSummary> =
                    read_worker(&mut log, &items, &registry, &protocol, &tx, &cancel_w);
                log.close_stream();
                *log_slot
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(log);
                let _ = tx.send(ReadEvent::Done(result));
            })?;
        *Self::lock_opt(&self.read_worker) = Some(WorkerHandle {
            cancel,
            joinh: Some(joinh),
        });
        defx!();

        Ok(rx)
    }

    /// Request cancellation of the running log read, if any. The worker
    /// stops at the next record boundary; records already appended stay.
    pub fn cancel_read(&self) {
        if let Some(handle) = Self::lock_opt(&self.read_worker).as_ref() {
            handle
                .cancel
                .cancel();
        }
    }

    /// Is a log currently open (read worker finished or not)?
    pub fn has_log(&self) -> bool {
        Self::lock_opt(&self.log).is_some()
            || Self::lock_opt(&self.read_worker).is_some()
    }

    /// Close the open log, if any: signal cancellation to every worker,
    /// wait for quiescence, then clear the collection and the queue.
    pub fn close_log(&self) {
        defn!();
        if let Some(mut handle) = Self::lock_opt(&self.search_worker).take() {
            handle.cancel();
            handle.join();
        }
        if let Some(mut handle) = Self::lock_opt(&self.read_worker).take() {
            handle.cancel_and_join();
        }
        if let Some(mut handle) = Self::lock_opt(&self.export_worker).take() {
            handle.cancel_and_join();
        }
        *Self::lock_opt(&self.log) = None;
        self.items
            .clear();
        self.evict
            .forget();
        self.clear_selected();
        defx!();
    }

    // searching

    /// Start a search, implicitly requesting cancellation of any prior
    /// running search. Returns the new search's event receiver.
    ///
    /// The continuation starting point is the selection at call time.
    pub fn start_search(
        &self,
        request: SearchRequest,
    ) -> Result<Receiver<SearchEvent>> {
        let mut slot = Self::lock_opt(&self.search_worker);
        if let Some(previous) = slot.take() {
            // abandoned silently; the worker winds down at its next
            // item-boundary checkpoint
            previous.cancel();
        }
        let handle: SearchHandle =
            SearchEngine::spawn(self.items.clone(), request, self.selected())?;
        let events: Receiver<SearchEvent> = handle.events();
        *slot = Some(handle);

        Ok(events)
    }

    /// Request cancellation of the running search, if any.
    pub fn cancel_search(&self) {
        if let Some(handle) = Self::lock_opt(&self.search_worker).as_ref() {
            handle.cancel();
        }
    }

    /// Observable state of the most recent search, when one exists.
    pub fn search_state(&self) -> Option<search::SearchState> {
        Self::lock_opt(&self.search_worker)
            .as_ref()
            .map(|handle| handle.state())
    }

    // exporting

    /// Export every item's parsed text to `writer`, synchronously.
    /// See [`export_parsed_text`].
    ///
    /// [`export_parsed_text`]: crate::printer::export::export_parsed_text
    pub fn export_parsed_text<W: Write>(
        &self,
        writer: &mut W,
        progress: &mut dyn FnMut(Percent),
        cancel: &CancelToken,
    ) -> ResultFind<Count, Error> {
        let ctx: ParseContext = match self.parse_context() {
            Ok(ctx) => ctx,
            Err(err) => return ResultFind::Err(err),
        };

        export_parsed_text(&ctx, writer, progress, cancel)
    }

    /// Export on a dedicated worker thread, streaming progress and the
    /// completion event over the returned channel.
    pub fn spawn_export<W: Write + Send + 'static>(
        &self,
        mut writer: W,
    ) -> Result<Receiver<ExportEvent>> {
        let ctx: ParseContext = self.parse_context()?;
        let cancel = CancelToken::new();
        let (tx, rx): (Sender<ExportEvent>, Receiver<ExportEvent>) =
            bounded(WORKER_CHANNEL_CAPACITY);
        let cancel_w: CancelToken = cancel.clone();
        let joinh: JoinHandle<()> = thread::Builder::new()
            .name("export".to_string())
            .spawn(move || {
                let mut progress = |percent: Percent| {
                    let _ = tx.send(ExportEvent::Progress(percent));
                };
                let result: ResultFind<Count, Error> =
                    export_parsed_text(&ctx, &mut writer, &mut progress, &cancel_w);
                let _ = tx.send(ExportEvent::Done(result));
            })?;
        *Self::lock_opt(&self.export_worker) = Some(WorkerHandle {
            cancel,
            joinh: Some(joinh),
        });

        Ok(rx)
    }

    /// Request cancellation of the running export, if any.
    pub fn cancel_export(&self) {
        if let Some(handle) = Self::lock_opt(&self.export_worker).as_mut() {
            handle
                .cancel
                .cancel();
        }
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.close_log();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// the read worker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Body of the log-read worker thread.
///
/// Collection updates stay suspended for the whole streaming read;
/// `resume_updating` runs its single bulk pass whether the read
/// completed, was cancelled, or failed, so the collection is always left
/// consistent.
fn read_worker(
    log: &mut Box<dyn NetworkLog>,
    items: &Arc<ItemCollection>,
    registry: &Arc<ProtocolRegistry>,
    protocol: &Arc<RwLock<Option<ProtocolP>>>,
    tx: &Sender<ReadEvent>,
    cancel: &CancelToken,
) -> Result<ReadSummary> {
    defn!("reading {:?}", log.name());
    let capacity: usize = log.capacity_hint();
    if capacity > 0 {
        items.reserve(capacity);
    }
    items.suspend_updating()?;
    let items_sink: &Arc<ItemCollection> = items;
    let read_result: Result<Count> = log.read(
        &mut |record| {
            items_sink.append(record);
        },
        &mut |percent| {
            let _ = tx.send(ReadEvent::Progress(percent));
        },
        cancel,
    );
    // exactly one bulk recompute, on every exit path
    items
        .resume_updating()?;
    let count: Count = read_result?;
    let suggested: Option<String> = log.suggested_protocol();
    if let Some(ref id) = suggested {
        if let Some(protocolp) = registry.find_by_id(id) {
            let mut guard = protocol
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if guard.is_none() {
                defo!("activating suggested protocol {:?}", id);
                *guard = Some(protocolp);
            }
        }
    }
    defx!("read {} records", count);

    Ok(ReadSummary {
        count,
        suggested_protocol: suggested,
        cancelled: cancel.is_cancelled(),
    })
}
