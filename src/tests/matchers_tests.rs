// src/tests/matchers_tests.rs

//! tests for `viewer/matchers.rs`

use crate::tests::common::{demo_collection, demo_context};
use crate::viewer::matchers::{
    binary_subsequence,
    opcode_equals,
    packet_bytes,
    parse_byte_pattern,
    parsed_text,
    parser_error,
    string_extractions,
    subsequence_contains,
    subsequence_find,
    undefined_parser,
    unescape_search_text,
    unknown_opcode,
    BytePattern,
    TextMode,
};
use crate::viewer::evictqueue::EvictionQueue;
use crate::viewer::ParseContext;

use std::io::ErrorKind;
use std::sync::Arc;

use ::test_case::test_case;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A parse context over the *default* protocol (no opcode table).
fn default_context() -> ParseContext {
    ParseContext::new(
        demo_collection(),
        Arc::new(crate::protocols::default::DefaultProtocol::new()),
        Arc::new(EvictionQueue::new()),
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// byte patterns

#[test]
fn test_parse_byte_pattern_hex_and_wildcards() {
    let pattern: BytePattern = parse_byte_pattern("DE ad ? BE ??").unwrap();
    assert_eq!(
        pattern,
        vec![Some(0xDE), Some(0xAD), None, Some(0xBE), None]
    );
}

#[test_case(""; "empty")]
#[test_case("   "; "whitespace only")]
#[test_case("GG"; "not hex")]
#[test_case("DEAD"; "token too wide")]
#[test_case("DE -1"; "negative")]
fn test_parse_byte_pattern_rejects(text: &str) {
    let err = parse_byte_pattern(text).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_subsequence_finds_plain_pattern() {
    let pattern: BytePattern = vec![Some(0xBE), Some(0xEF)];
    assert_eq!(subsequence_find(&[0xDE, 0xAD, 0xBE, 0xEF], &pattern), Some(2));
    assert_eq!(subsequence_find(&[0xDE, 0xAD], &pattern), None);
}

#[test]
fn test_subsequence_wildcard_matches_any_byte() {
    let pattern: BytePattern = vec![Some(0xDE), None, Some(0xEF)];
    assert!(subsequence_contains(&[0x00, 0xDE, 0x55, 0xEF], &pattern));
    assert!(subsequence_contains(&[0xDE, 0x00, 0xEF], &pattern));
    assert!(!subsequence_contains(&[0xDE, 0x00, 0x00, 0xEF], &pattern));
}

#[test]
fn test_subsequence_all_wildcards_matches_when_it_fits() {
    let pattern: BytePattern = vec![None, None];
    assert_eq!(subsequence_find(&[0x01, 0x02, 0x03], &pattern), Some(0));
    assert_eq!(subsequence_find(&[0x01], &pattern), None);
}

#[test]
fn test_subsequence_pattern_longer_than_haystack_never_matches() {
    let pattern: BytePattern = vec![Some(0x01), Some(0x02), Some(0x03)];
    assert!(!subsequence_contains(&[0x01, 0x02], &pattern));
}

#[test]
fn test_subsequence_empty_haystack_never_matches() {
    let pattern: BytePattern = vec![Some(0x01)];
    assert!(!subsequence_contains(&[], &pattern));
    assert!(!subsequence_contains(b"", &[None]));
}

#[test]
fn test_subsequence_repeated_anchor_bytes() {
    // the first anchor candidate fails, a later one matches
    let pattern: BytePattern = vec![Some(0xAA), Some(0xBB)];
    assert_eq!(
        subsequence_find(&[0xAA, 0xAA, 0xAA, 0xBB], &pattern),
        Some(2)
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// text helpers

#[test_case("a\\nb", "a\nb"; "newline")]
#[test_case("a\\rb", "a\rb"; "carriage return")]
#[test_case("a\\tb", "a\tb"; "tab")]
#[test_case("a\\0b", "a\0b"; "nul")]
#[test_case("plain", "plain"; "no escapes")]
fn test_unescape_search_text(
    input: &str,
    expected: &str,
) {
    assert_eq!(unescape_search_text(input), expected);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// opcode predicates

#[test]
fn test_opcode_equals_by_name_and_number() {
    let items = demo_collection();
    let ctx = demo_context(items.clone());
    let by_name = opcode_equals(&ctx, "TEXT").unwrap();
    let by_number = opcode_equals(&ctx, "0x11").unwrap();
    let item1 = items
        .get(1)
        .unwrap();
    let item0 = items
        .get(0)
        .unwrap();
    assert!(by_name(&item1));
    assert!(by_number(&item1));
    assert!(!by_name(&item0));
    // a packet without an opcode never matches
    let item3 = items
        .get(3)
        .unwrap();
    assert!(!by_name(&item3));
}

#[test]
fn test_opcode_equals_requires_an_opcode_table() {
    let ctx = default_context();
    let err = opcode_equals(&ctx, "1").err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_opcode_equals_rejects_unresolvable_text() {
    let ctx = demo_context(demo_collection());
    let err = opcode_equals(&ctx, "NOPE").err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_unknown_opcode_matches_only_off_enumeration_packets() {
    let items = demo_collection();
    let ctx = demo_context(items.clone());
    let matcher = unknown_opcode(&ctx).unwrap();
    // index 5 carries opcode 0x77, absent from the enumeration
    assert!(matcher(
        &items
            .get(5)
            .unwrap()
    ));
    assert!(!matcher(
        &items
            .get(0)
            .unwrap()
    ));
    // no opcode at all is not "unknown opcode"
    assert!(!matcher(
        &items
            .get(3)
            .unwrap()
    ));
}

#[test]
fn test_unknown_opcode_requires_an_opcode_table() {
    let ctx = default_context();
    assert!(unknown_opcode(&ctx).is_err());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// binary predicates

#[test]
fn test_packet_bytes_scans_raw_data_without_parsing() {
    let items = demo_collection();
    let matcher = packet_bytes("AD BE").unwrap();
    let item2 = items
        .get(2)
        .unwrap();
    assert!(matcher(&item2));
    // no parse was forced
    assert!(!item2.is_parsed());
    assert!(!matcher(
        &items
            .get(1)
            .unwrap()
    ));
}

#[test]
fn test_binary_subsequence_searches_raw_and_extractions() {
    let items = demo_collection();
    let ctx = demo_context(items.clone());
    let matcher = binary_subsequence(&ctx, "DE ? BE").unwrap();
    assert!(matcher(
        &items
            .get(2)
            .unwrap()
    ));
    // the unparsable TEXT item is "no match", not an abort
    let matcher_miss = binary_subsequence(&ctx, "AA BB CC").unwrap();
    assert!(!matcher_miss(
        &items
            .get(4)
            .unwrap()
    ));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// text predicates

#[test]
fn test_parsed_text_contains_case_insensitive() {
    let items = demo_collection();
    let ctx = demo_context(items.clone());
    let insensitive = parsed_text(&ctx, "hello world", TextMode::Contains, false, false).unwrap();
    let sensitive = parsed_text(&ctx, "hello world", TextMode::Contains, true, false).unwrap();
    let item1 = items
        .get(1)
        .unwrap();
    assert!(insensitive(&item1));
    assert!(!sensitive(&item1));
}

#[test]
fn test_parsed_text_exact_mode() {
    let items = demo_collection();
    let ctx = demo_context(items.clone());
    // PING parses to exactly "PING\n"
    let exact = parsed_text(&ctx, "PING\\n", TextMode::Exact, true, true).unwrap();
    assert!(exact(
        &items
            .get(0)
            .unwrap()
    ));
    let exact_noescape = parsed_text(&ctx, "PING\\n", TextMode::Exact, true, false).unwrap();
    assert!(!exact_noescape(
        &items
            .get(0)
            .unwrap()
    ));
}

#[test]
fn test_parsed_text_regex() {
    let items = demo_collection();
    let ctx = demo_context(items.clone());
    let matcher = parsed_text(&ctx, r"^TEXT \(\d+ bytes\)", TextMode::Regex, true, false).unwrap();
    assert!(matcher(
        &items
            .get(1)
            .unwrap()
    ));
    assert!(!matcher(
        &items
            .get(2)
            .unwrap()
    ));
}

#[test]
fn test_invalid_regex_is_a_setup_error() {
    let ctx = demo_context(demo_collection());
    let err = parsed_text(&ctx, "(unclosed", TextMode::Regex, true, false).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_string_extractions_matcher() {
    let items = demo_collection();
    let ctx = demo_context(items.clone());
    let matcher = string_extractions(&ctx, "Hello", TextMode::Contains, true, false).unwrap();
    assert!(matcher(
        &items
            .get(1)
            .unwrap()
    ));
    // PING has no string extractions
    assert!(!matcher(
        &items
            .get(0)
            .unwrap()
    ));
}

#[test]
fn test_failed_parse_is_no_match_for_text() {
    let items = demo_collection();
    let ctx = demo_context(items.clone());
    let matcher = parsed_text(&ctx, "", TextMode::Contains, true, false).unwrap();
    // empty pattern matches any successfully parsed text…
    assert!(matcher(
        &items
            .get(0)
            .unwrap()
    ));
    // …but a failed parse never matches
    assert!(!matcher(
        &items
            .get(4)
            .unwrap()
    ));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// parser-outcome predicates

#[test]
fn test_parser_error_matcher() {
    let items = demo_collection();
    let ctx = demo_context(items.clone());
    let matcher = parser_error(&ctx);
    assert!(matcher(
        &items
            .get(4)
            .unwrap()
    ));
    assert!(!matcher(
        &items
            .get(1)
            .unwrap()
    ));
}

#[test]
fn test_undefined_parser_matcher() {
    let items = demo_collection();
    let ctx = demo_context(items.clone());
    let matcher = undefined_parser(&ctx);
    assert!(matcher(
        &items
            .get(3)
            .unwrap()
    ));
    assert!(!matcher(
        &items
            .get(1)
            .unwrap()
    ));
    // a failed parse is not an undefined parser
    assert!(!matcher(
        &items
            .get(4)
            .unwrap()
    ));
}
