// src/tests/export_tests.rs

//! tests for `printer/export.rs`

use crate::common::{CancelToken, Percent, ResultFind};
use crate::printer::export::export_parsed_text;
use crate::protocols::demo::{OPCODE_PING, OPCODE_TEXT};
use crate::tests::common::{demo_context, fill_collection, record};

use ::more_asserts::assert_lt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn no_progress() -> impl FnMut(Percent) {
    |_percent| {}
}

/// Exporting a 3-item log with one unparsable item produces 3 header
/// blocks in order, the unparsable item's block has an empty body, and
/// the export does not fail.
#[test]
fn test_export_with_unparsable_item() {
    let items = fill_collection(vec![
        record(0, b"", Some(OPCODE_PING)),
        // invalid UTF-8: the parse fails, the export must not
        record(1, &[0xFF, 0xFE], Some(OPCODE_TEXT)),
        record(2, b"hi", Some(OPCODE_TEXT)),
    ]);
    let ctx = demo_context(items);
    let mut out: Vec<u8> = Vec::new();
    let result = export_parsed_text(&ctx, &mut out, &mut no_progress(), &CancelToken::new());
    assert_eq!(result, ResultFind::Found(3));
    let text = String::from_utf8(out).unwrap();
    let header_positions: Vec<usize> = (0..3)
        .map(|n| {
            text.find(&format!("__ Packet {} ", n))
                .unwrap()
        })
        .collect();
    assert_lt!(header_positions[0], header_positions[1]);
    assert_lt!(header_positions[1], header_positions[2]);
    // packet 1's block carries only its header lines, no parsed text
    let block1: &str = &text[header_positions[1]..header_positions[2]];
    assert_eq!(block1.lines().count(), 2);
    // packet 2's block carries the parsed text
    let block2: &str = &text[header_positions[2]..];
    assert!(block2.contains("hi"));
}

#[test]
fn test_export_of_empty_collection_writes_nothing() {
    let ctx = demo_context(fill_collection(vec![]));
    let mut out: Vec<u8> = Vec::new();
    let result = export_parsed_text(&ctx, &mut out, &mut no_progress(), &CancelToken::new());
    assert_eq!(result, ResultFind::Found(0));
    assert!(out.is_empty());
}

#[test]
fn test_export_cancellation_is_not_an_error() {
    let items = fill_collection(
        (0..10)
            .map(|n| record(n, b"x", Some(OPCODE_PING)))
            .collect(),
    );
    let ctx = demo_context(items);
    let cancel = CancelToken::new();
    cancel.cancel();
    let mut out: Vec<u8> = Vec::new();
    let result = export_parsed_text(&ctx, &mut out, &mut no_progress(), &cancel);
    assert!(result.is_cancelled());
    assert!(out.is_empty());
}

#[test]
fn test_export_progress_is_monotonic() {
    let items = fill_collection(
        (0..200)
            .map(|n| record(n, b"", Some(OPCODE_PING)))
            .collect(),
    );
    let ctx = demo_context(items);
    let mut reports: Vec<Percent> = Vec::new();
    let mut out: Vec<u8> = Vec::new();
    let result = export_parsed_text(&ctx, &mut out, &mut |percent| reports.push(percent), &CancelToken::new());
    assert_eq!(result, ResultFind::Found(200));
    for pair in reports.windows(2) {
        assert_lt!(pair[0], pair[1]);
    }
    assert_eq!(reports.last(), Some(&100));
}

/// A short write is surfaced as a worker error, not a panic.
#[test]
fn test_export_surfaces_write_errors() {
    struct FailingWriter {}
    impl std::io::Write for FailingWriter {
        fn write(
            &mut self,
            _data: &[u8],
        ) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
    let items = fill_collection(vec![record(0, b"", Some(OPCODE_PING))]);
    let ctx = demo_context(items);
    let result = export_parsed_text(
        &ctx,
        &mut FailingWriter {},
        &mut no_progress(),
        &CancelToken::new(),
    );
    assert!(result.is_err());
}
