// src/tests/search_tests.rs

//! tests for `viewer/search.rs`

use crate::common::{CancelToken, Percent, ResultFind};
use crate::data::item::ViewerItem;
use crate::protocols::demo::OPCODE_PING;
use crate::tests::common::{demo_collection, demo_context, fill_collection, record};
use crate::viewer::collection::ItemCollection;
use crate::viewer::matchers::{opcode_equals, MatchFn};
use crate::viewer::search::{
    scan,
    SearchDirection,
    SearchEngine,
    SearchEvent,
    SearchRequest,
    SearchState,
};

use std::sync::Arc;

use ::crossbeam_channel::unbounded;
use ::more_asserts::assert_lt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A collection of `count` opcode-less packets with opcode `0x42`
/// packets at the passed indices.
fn collection_with_0x42_at(
    count: usize,
    at: &[usize],
) -> Arc<ItemCollection> {
    let records = (0..count)
        .map(|n| {
            let opcode = match at.contains(&n) {
                true => Some(0x42),
                false => Some(0x01),
            };
            record(n, &[n as u8], opcode)
        })
        .collect();

    fill_collection(records)
}

/// Predicate on the raw opcode, no parsing, no setup requirements.
fn opcode_is(opcode: u32) -> MatchFn {
    Box::new(move |item: &ViewerItem| item.packet().opcode() == Some(opcode))
}

fn no_progress() -> impl FnMut(Percent) {
    |_percent| {}
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// the synchronous scan

#[test]
fn test_forward_scan_finds_first_match() {
    let items = collection_with_0x42_at(1000, &[500]);
    let request = SearchRequest::new(SearchDirection::Forward, false, opcode_is(0x42));
    let result = scan(&items, &request, None, &CancelToken::new(), &mut no_progress());
    match result {
        ResultFind::Found(itemp) => assert_eq!(itemp.index(), 500),
        other => panic!("expected Found, got {:?}", other),
    }
}

#[test]
fn test_continuation_scan_past_only_match_is_not_found() {
    let items = collection_with_0x42_at(1000, &[500]);
    let request = SearchRequest::new(SearchDirection::Forward, true, opcode_is(0x42));
    let result = scan(&items, &request, Some(500), &CancelToken::new(), &mut no_progress());
    assert!(result.is_not_found());
}

#[test]
fn test_backward_scan_finds_last_match() {
    let items = collection_with_0x42_at(100, &[10, 90]);
    let request = SearchRequest::new(SearchDirection::Backward, false, opcode_is(0x42));
    let result = scan(&items, &request, None, &CancelToken::new(), &mut no_progress());
    match result {
        ResultFind::Found(itemp) => assert_eq!(itemp.index(), 90),
        other => panic!("expected Found, got {:?}", other),
    }
}

/// A forward scan from the start followed by a backward continuation
/// from the found index never returns the same index.
#[test]
fn test_no_self_match_across_directions() {
    let items = collection_with_0x42_at(100, &[50]);
    let forward = SearchRequest::new(SearchDirection::Forward, false, opcode_is(0x42));
    let found = match scan(&items, &forward, None, &CancelToken::new(), &mut no_progress()) {
        ResultFind::Found(itemp) => itemp.index(),
        other => panic!("expected Found, got {:?}", other),
    };
    assert_eq!(found, 50);
    let backward = SearchRequest::new(SearchDirection::Backward, true, opcode_is(0x42));
    let result = scan(&items, &backward, Some(found), &CancelToken::new(), &mut no_progress());
    assert!(result.is_not_found());
}

/// Repeated scans with a fixed predicate and collection return the same
/// result.
#[test]
fn test_scan_is_deterministic() {
    let items = collection_with_0x42_at(200, &[7, 40, 41]);
    for _ in 0..3 {
        let request = SearchRequest::new(SearchDirection::Forward, false, opcode_is(0x42));
        let result = scan(&items, &request, None, &CancelToken::new(), &mut no_progress());
        match result {
            ResultFind::Found(itemp) => assert_eq!(itemp.index(), 7),
            other => panic!("expected Found, got {:?}", other),
        }
    }
}

#[test]
fn test_scan_on_empty_collection_is_not_found() {
    let items = ItemCollection::new();
    let request = SearchRequest::new(SearchDirection::Forward, false, opcode_is(0x42));
    let result = scan(&items, &request, None, &CancelToken::new(), &mut no_progress());
    assert!(result.is_not_found());
}

#[test]
fn test_backward_continuation_from_zero_is_not_found() {
    let items = collection_with_0x42_at(10, &[0]);
    let request = SearchRequest::new(SearchDirection::Backward, true, opcode_is(0x42));
    let result = scan(&items, &request, Some(0), &CancelToken::new(), &mut no_progress());
    assert!(result.is_not_found());
}

/// A continuation request with no current selection falls back to the
/// relevant end of the collection.
#[test]
fn test_continuation_without_selection_scans_from_the_end() {
    let items = collection_with_0x42_at(10, &[3]);
    let request = SearchRequest::new(SearchDirection::Forward, true, opcode_is(0x42));
    let result = scan(&items, &request, None, &CancelToken::new(), &mut no_progress());
    assert!(result.is_found());
}

#[test]
fn test_progress_is_monotonic_and_coalesced() {
    let items = collection_with_0x42_at(250, &[]);
    let request = SearchRequest::new(SearchDirection::Forward, false, opcode_is(0x42));
    let mut reports: Vec<Percent> = Vec::new();
    let result = scan(&items, &request, None, &CancelToken::new(), &mut |percent| {
        reports.push(percent)
    });
    assert!(result.is_not_found());
    for pair in reports.windows(2) {
        assert_lt!(pair[0], pair[1]);
    }
    assert_eq!(reports.last(), Some(&100));
}

/// Cancellation mid-scan stops at an item boundary; the collection is
/// unchanged.
#[test]
fn test_cancellation_stops_scan_at_item_boundary() {
    let items = demo_context_items_unparsed();
    let cancel = CancelToken::new();
    let cancel_inner: CancelToken = cancel.clone();
    // the predicate cancels after the third item; deterministic, no
    // threads involved
    let matcher: MatchFn = {
        let counter = std::sync::Mutex::new(0usize);
        Box::new(move |_item: &ViewerItem| {
            let mut counter = counter
                .lock()
                .unwrap();
            *counter += 1;
            if *counter == 3 {
                cancel_inner.cancel();
            }
            false
        })
    };
    let request = SearchRequest::new(SearchDirection::Forward, false, matcher);
    let result = scan(&items, &request, None, &cancel, &mut no_progress());
    assert!(result.is_cancelled());
    // the scan stopped after the third predicate call; nothing was
    // parsed, nothing mutated
    for index in 0..items.count() {
        assert!(!items
            .get(index)
            .unwrap()
            .is_parsed());
    }
}

fn demo_context_items_unparsed() -> Arc<ItemCollection> {
    let items = demo_collection();
    for index in 0..items.count() {
        assert!(!items
            .get(index)
            .unwrap()
            .is_parsed());
    }

    items
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// the spawned worker

/// Drain a search's events, returning (progress reports, completion).
fn drain(
    events: ::crossbeam_channel::Receiver<SearchEvent>,
) -> (Vec<Percent>, Option<ResultFind<usize, String>>) {
    let mut reports: Vec<Percent> = Vec::new();
    let mut done: Option<ResultFind<usize, String>> = None;
    while let Ok(event) = events.recv() {
        match event {
            SearchEvent::Progress(percent) => reports.push(percent),
            SearchEvent::Done(result) => {
                done = Some(match result {
                    ResultFind::Found(itemp) => ResultFind::Found(itemp.index()),
                    ResultFind::NotFound => ResultFind::NotFound,
                    ResultFind::Cancelled => ResultFind::Cancelled,
                    ResultFind::Err(err) => ResultFind::Err(err.to_string()),
                });
                break;
            }
        }
    }

    (reports, done)
}

#[test]
fn test_spawned_search_delivers_one_completion() {
    let items = collection_with_0x42_at(1000, &[500]);
    let request = SearchRequest::new(SearchDirection::Forward, false, opcode_is(0x42));
    let mut handle = SearchEngine::spawn(items, request, None).unwrap();
    let (_reports, done) = drain(handle.events());
    assert_eq!(done, Some(ResultFind::Found(500)));
    handle.join();
    assert_eq!(handle.state(), SearchState::Found);
}

#[test]
fn test_spawned_search_not_found() {
    let items = collection_with_0x42_at(100, &[]);
    let request = SearchRequest::new(SearchDirection::Forward, false, opcode_is(0x42));
    let mut handle = SearchEngine::spawn(items, request, None).unwrap();
    let (reports, done) = drain(handle.events());
    assert_eq!(done, Some(ResultFind::NotFound));
    assert_eq!(reports.last(), Some(&100));
    handle.join();
    assert_eq!(handle.state(), SearchState::NotFound);
}

/// A cancelled search reaches the `Cancelled` state and never emits a
/// completion event: the channel disconnects instead.
#[test]
fn test_spawned_search_cancellation_emits_no_completion() {
    let items = demo_collection();
    // gate the predicate so the worker is reliably mid-scan when the
    // cancellation lands
    let (gate_tx, gate_rx) = unbounded::<()>();
    let matcher: MatchFn = Box::new(move |_item: &ViewerItem| {
        let _ = gate_rx.recv();
        false
    });
    let request = SearchRequest::new(SearchDirection::Forward, false, matcher);
    let mut handle = SearchEngine::spawn(items, request, None).unwrap();
    handle.cancel();
    // release any predicate call blocked on the gate
    for _ in 0..8 {
        let _ = gate_tx.send(());
    }
    let (_reports, done) = drain(handle.events());
    assert_eq!(done, None);
    handle.join();
    assert_eq!(handle.state(), SearchState::Cancelled);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// predicates end-to-end

#[test]
fn test_opcode_search_end_to_end() {
    let items = demo_collection();
    let ctx = demo_context(items.clone());
    let matcher = opcode_equals(&ctx, "PING").unwrap();
    let request = SearchRequest::new(SearchDirection::Forward, false, matcher);
    let result = scan(&items, &request, None, &CancelToken::new(), &mut no_progress());
    match result {
        ResultFind::Found(itemp) => {
            assert_eq!(itemp.index(), 0);
            assert_eq!(itemp.packet().opcode(), Some(OPCODE_PING));
        }
        other => panic!("expected Found, got {:?}", other),
    }
}
