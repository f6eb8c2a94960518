// src/viewer/matchers.rs

//! The search predicate catalog: constructors turning user-entered
//! patterns into [`MatchFn`] predicates, and the wildcard
//! binary-subsequence scanner they share.
//!
//! Every constructor validates its pattern up front and fails with a
//! setup error before any background work starts; the returned predicates
//! are pure functions of one [`ViewerItem`] with no shared mutable state.
//!
//! [`MatchFn`]: crate::viewer::matchers::MatchFn
//! [`ViewerItem`]: crate::data::item::ViewerItem

use crate::common::Opcode;
use crate::data::item::ViewerItem;
use crate::data::parsed::ParseState;
use crate::viewer::ParseContext;

use std::io::{Error, ErrorKind, Result};

use ::memchr::memchr;
use ::regex::{Regex, RegexBuilder};
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A search predicate over one [`ViewerItem`].
///
/// [`ViewerItem`]: crate::data::item::ViewerItem
pub type MatchFn = Box<dyn Fn(&ViewerItem) -> bool + Send + Sync>;

/// A byte pattern with wildcard positions; `None` matches any single
/// byte.
pub type BytePattern = Vec<Option<u8>>;

/// How text patterns compare against candidate strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextMode {
    /// Substring containment.
    Contains,
    /// Whole-string equality.
    Exact,
    /// Regular-expression match.
    Regex,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// binary subsequence scanning
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse a space-separated hex byte pattern, e.g. `"DE AD ?? 0F"`.
///
/// `?` or `??` is a wildcard matching any single byte. An empty pattern
/// or a non-hex token is a setup error.
pub fn parse_byte_pattern(text: &str) -> Result<BytePattern> {
    let mut pattern: BytePattern = Vec::new();
    for token in text.split_whitespace() {
        match token {
            "?" | "??" => pattern.push(None),
            _ => match u8::from_str_radix(token, 16) {
                Ok(byte) => pattern.push(Some(byte)),
                Err(_) => {
                    return Err(Error::new(
                        ErrorKind::InvalidInput,
                        format!("cannot convert {:?} to a byte sequence: bad token {:?}", text, token),
                    ));
                }
            },
        }
    }
    if pattern.is_empty() {
        return Err(Error::new(ErrorKind::InvalidInput, "empty byte pattern"));
    }

    Ok(pattern)
}

/// Does `pattern` occur at `haystack[at..]`?
#[inline(always)]
fn pattern_matches_at(
    haystack: &[u8],
    at: usize,
    pattern: &[Option<u8>],
) -> bool {
    haystack[at..]
        .iter()
        .zip(pattern.iter())
        .all(|(byte, want)| match want {
            Some(want) => byte == want,
            None => true,
        })
}

/// Find the first occurrence of the wildcard `pattern` anywhere in
/// `haystack`.
///
/// A pattern longer than the haystack never matches; an empty haystack
/// never matches a non-empty pattern. Uses [`memchr`] on the first
/// concrete pattern byte to skip candidate positions.
pub fn subsequence_find(
    haystack: &[u8],
    pattern: &[Option<u8>],
) -> Option<usize> {
    let plen: usize = pattern.len();
    if plen == 0 || plen > haystack.len() {
        return None;
    }
    let last_candidate: usize = haystack.len() - plen;
    // anchor on the first concrete byte; an all-wildcard pattern matches
    // at position zero
    let (anchor, byte): (usize, u8) = match pattern
        .iter()
        .enumerate()
        .find_map(|(n, b)| b.map(|byte| (n, byte)))
    {
        Some(anchor_byte) => anchor_byte,
        None => return Some(0),
    };
    let mut candidate: usize = 0;
    while candidate <= last_candidate {
        let window: &[u8] = &haystack[candidate + anchor..=last_candidate + anchor];
        let offset: usize = memchr(byte, window)?;
        let at: usize = candidate + offset;
        if pattern_matches_at(haystack, at, pattern) {
            return Some(at);
        }
        candidate = at + 1;
    }

    None
}

/// Does the wildcard `pattern` occur anywhere in `haystack`?
#[inline(always)]
pub fn subsequence_contains(
    haystack: &[u8],
    pattern: &[Option<u8>],
) -> bool {
    subsequence_find(haystack, pattern).is_some()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// text comparison
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Replace the `\r \n \t \0` escape sequences with their characters.
pub fn unescape_search_text(text: &str) -> String {
    text.replace("\\r", "\r")
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\0", "\0")
}

/// A prepared text comparison over candidate strings.
enum TextMatcher {
    Contains { pattern: String, case_sensitive: bool },
    Exact { pattern: String, case_sensitive: bool },
    Regex(Regex),
}

impl TextMatcher {
    fn matches(
        &self,
        candidate: &str,
    ) -> bool {
        match self {
            TextMatcher::Contains { pattern, case_sensitive: true } => candidate.contains(pattern.as_str()),
            TextMatcher::Contains { pattern, case_sensitive: false } => candidate
                .to_lowercase()
                .contains(pattern.as_str()),
            TextMatcher::Exact { pattern, case_sensitive: true } => candidate == pattern,
            TextMatcher::Exact { pattern, case_sensitive: false } => candidate.to_lowercase() == *pattern,
            TextMatcher::Regex(regex) => regex.is_match(candidate),
        }
    }
}

/// Build a [`TextMatcher`]. An invalid regular expression is a setup
/// error, not a per-item error.
fn build_text_matcher(
    pattern: &str,
    mode: TextMode,
    case_sensitive: bool,
    unescape: bool,
) -> Result<TextMatcher> {
    let pattern: String = match unescape {
        true => unescape_search_text(pattern),
        false => pattern.to_string(),
    };
    match mode {
        TextMode::Regex => {
            let regex: Regex = RegexBuilder::new(&pattern)
                .case_insensitive(!case_sensitive)
                .build()
                .map_err(|err| {
                    Error::new(
                        ErrorKind::InvalidInput,
                        format!("cannot convert {:?} to a regular expression: {}", pattern, err),
                    )
                })?;

            Ok(TextMatcher::Regex(regex))
        }
        TextMode::Contains | TextMode::Exact => {
            let pattern: String = match case_sensitive {
                true => pattern,
                false => pattern.to_lowercase(),
            };
            match mode {
                TextMode::Contains => Ok(TextMatcher::Contains { pattern, case_sensitive }),
                _ => Ok(TextMatcher::Exact { pattern, case_sensitive }),
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// the predicate catalog
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Match packets whose transport-level opcode equals the one named by
/// `text` (an enumeration name, `0x`-hex, or decimal).
///
/// Setup fails when the context's protocol exposes no opcode
/// enumeration, or when `text` resolves to nothing. Packets without an
/// opcode never match. Does not force parsing.
pub fn opcode_equals(
    ctx: &ParseContext,
    text: &str,
) -> Result<MatchFn> {
    let table = match ctx
        .protocol()
        .opcode_table()
    {
        Some(table) => table,
        None => {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("protocol {:?} has no opcode enumeration", ctx.protocol().name()),
            ));
        }
    };
    let target: Opcode = table
        .resolve(text)
        .ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("cannot convert {:?} to an opcode of {}", text, table.name()),
            )
        })?;

    Ok(Box::new(move |item: &ViewerItem| item.packet().opcode() == Some(target)))
}

/// Match packets whose opcode is absent from the active protocol's
/// opcode enumeration. Packets without an opcode never match.
///
/// Setup fails when the protocol exposes no opcode enumeration.
pub fn unknown_opcode(ctx: &ParseContext) -> Result<MatchFn> {
    if ctx
        .protocol()
        .opcode_table()
        .is_none()
    {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            format!("protocol {:?} has no opcode enumeration", ctx.protocol().name()),
        ));
    }
    let protocol = ctx.protocol_p();

    Ok(Box::new(move |item: &ViewerItem| {
        let opcode: Opcode = match item.packet().opcode() {
            Some(opcode) => opcode,
            None => return false,
        };
        match protocol.opcode_table() {
            Some(table) => !table.contains(opcode),
            None => false,
        }
    }))
}

/// Match items whose raw packet bytes contain the wildcard byte
/// `pattern`. Does not force parsing.
pub fn packet_bytes(pattern_text: &str) -> Result<MatchFn> {
    let pattern: BytePattern = parse_byte_pattern(pattern_text)?;

    Ok(Box::new(move |item: &ViewerItem| {
        subsequence_contains(item.packet().data(), &pattern)
    }))
}

/// Match items where the wildcard byte `pattern` occurs in the raw
/// packet bytes or in any parsed binary extraction. Forces parsing.
pub fn binary_subsequence(
    ctx: &ParseContext,
    pattern_text: &str,
) -> Result<MatchFn> {
    let pattern: BytePattern = parse_byte_pattern(pattern_text)?;
    let ctx: ParseContext = ctx.clone();

    Ok(Box::new(move |item: &ViewerItem| {
        if subsequence_contains(item.packet().data(), &pattern) {
            return true;
        }
        match ctx.ensure_parsed(item) {
            ParseState::Parsed(outputp) => outputp
                .binaries()
                .iter()
                .any(|(_label, data)| subsequence_contains(data, &pattern)),
            // a failed parse is "no match", never an abort
            _ => false,
        }
    }))
}

/// Match items whose parsed text satisfies the text pattern. Forces
/// parsing; a failed parse has empty text and so never matches a
/// non-empty pattern.
pub fn parsed_text(
    ctx: &ParseContext,
    pattern: &str,
    mode: TextMode,
    case_sensitive: bool,
    unescape: bool,
) -> Result<MatchFn> {
    let matcher: TextMatcher = build_text_matcher(pattern, mode, case_sensitive, unescape)?;
    let ctx: ParseContext = ctx.clone();

    Ok(Box::new(move |item: &ViewerItem| {
        match ctx.ensure_parsed(item) {
            ParseState::Parsed(outputp) => matcher.matches(outputp.text()),
            _ => false,
        }
    }))
}

/// Match items where any parsed string extraction satisfies the text
/// pattern. Forces parsing.
pub fn string_extractions(
    ctx: &ParseContext,
    pattern: &str,
    mode: TextMode,
    case_sensitive: bool,
    unescape: bool,
) -> Result<MatchFn> {
    let matcher: TextMatcher = build_text_matcher(pattern, mode, case_sensitive, unescape)?;
    let ctx: ParseContext = ctx.clone();

    Ok(Box::new(move |item: &ViewerItem| {
        match ctx.ensure_parsed(item) {
            ParseState::Parsed(outputp) => outputp
                .strings()
                .iter()
                .any(|(_label, s)| matcher.matches(s)),
            _ => false,
        }
    }))
}

/// Match items whose parse terminated with a structural error. Forces
/// parsing.
pub fn parser_error(ctx: &ParseContext) -> MatchFn {
    let ctx: ParseContext = ctx.clone();

    Box::new(move |item: &ViewerItem| {
        matches!(ctx.ensure_parsed(item), ParseState::Failed(_))
    })
}

/// Match items no parser recognizes (the distinguished undefined-parser
/// outcome). Forces parsing.
pub fn undefined_parser(ctx: &ParseContext) -> MatchFn {
    let ctx: ParseContext = ctx.clone();

    Box::new(move |item: &ViewerItem| {
        match ctx.ensure_parsed(item) {
            ParseState::Parsed(outputp) => outputp.is_undefined(),
            _ => false,
        }
    })
}
