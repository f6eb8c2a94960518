// src/data/parsed.rs

//! Implements [`ParsedOutput`], [`ParseError`], and the per-item
//! [`ParseState`] cache slot.
//!
//! [`ParsedOutput`]: crate::data::parsed::ParsedOutput
//! [`ParseError`]: crate::data::parsed::ParseError
//! [`ParseState`]: crate::data::parsed::ParseState

use crate::common::Bytes;

use std::fmt;
use std::sync::Arc;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A labeled binary sub-range discovered during parsing,
/// e.g. `("Payload", [0x01, 0x02, …])`.
pub type BinaryExtraction = (String, Bytes);

/// A labeled string discovered during parsing,
/// e.g. `("Chat Message", "hello")`.
pub type StringExtraction = (String, String);

/// Thread-safe [Atomic Reference Counting Pointer] to a [`ParsedOutput`].
///
/// [Atomic Reference Counting Pointer]: std::sync::Arc
pub type ParsedOutputP = Arc<ParsedOutput>;

/// The product of running one packet through a protocol-specific parser.
///
/// Created once per item. Replaced wholesale if the item is re-parsed.
/// Discarded entirely when the item is evicted back to
/// [`ParseState::Unparsed`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedOutput {
    /// Parsed human-readable text. May be empty.
    text: String,
    /// Labeled binary sub-ranges discovered during parsing.
    binaries: Vec<BinaryExtraction>,
    /// Labeled strings discovered during parsing.
    strings: Vec<StringExtraction>,
    /// Set when no registered parser recognizes the packet; the output is
    /// a valid terminal state, distinct from [`ParseState::Failed`].
    undefined: bool,
}

impl ParsedOutput {
    /// Create a `ParsedOutput` from passed arguments.
    pub fn new(
        text: String,
        binaries: Vec<BinaryExtraction>,
        strings: Vec<StringExtraction>,
    ) -> ParsedOutput {
        ParsedOutput {
            text,
            binaries,
            strings,
            undefined: false,
        }
    }

    /// The output of the distinguished _undefined parser_: no parser
    /// recognizes the packet. Empty text, no extractions.
    pub fn undefined() -> ParsedOutput {
        ParsedOutput {
            text: String::new(),
            binaries: vec![],
            strings: vec![],
            undefined: true,
        }
    }

    #[inline(always)]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline(always)]
    pub fn binaries(&self) -> &[BinaryExtraction] {
        &self.binaries
    }

    #[inline(always)]
    pub fn strings(&self) -> &[StringExtraction] {
        &self.strings
    }

    /// Was this output produced by the _undefined parser_?
    #[inline(always)]
    pub fn is_undefined(&self) -> bool {
        self.undefined
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A per-item parse failure, captured during `parse()` and stored on the
/// item. Never propagated to callers; downstream consumers observe it as a
/// [`ParseState::Failed`] state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    /// Human-readable failure message.
    message: String,
    /// Byte offset into the raw packet where parsing failed, when known.
    offset: Option<usize>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            offset: None,
        }
    }

    pub fn at_offset(
        message: impl Into<String>,
        offset: usize,
    ) -> ParseError {
        ParseError {
            message: message.into(),
            offset: Some(offset),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }
}

impl fmt::Display for ParseError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "{} (at byte {})", self.message, offset),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ParseError {}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The lazy parse-cache slot of one [`ViewerItem`].
///
/// Allowed transitions:
///
/// ```text
/// Unparsed → Parsing → Parsed
///                    ↘ Failed
/// Parsed → Unparsed   (eviction only)
/// Failed → Unparsed   (eviction only)
/// ```
///
/// Never any other transition.
///
/// [`ViewerItem`]: crate::data::item::ViewerItem
#[derive(Clone, Debug, Default)]
pub enum ParseState {
    /// No parse has been attempted, or a prior output was evicted.
    #[default]
    Unparsed,
    /// A parse is in flight on some worker.
    Parsing,
    /// Parsing terminated and produced output
    /// (possibly the _undefined parser_ output).
    Parsed(ParsedOutputP),
    /// Parsing was attempted and terminated with a structural error.
    /// Still counts as "parsed" for idempotency purposes.
    Failed(ParseError),
}

impl ParseState {
    /// Has parsing been attempted and terminated?
    ///
    /// `true` for both `Parsed` and `Failed`; a failed parse was still
    /// attempted and terminated.
    #[inline(always)]
    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseState::Parsed(_) | ParseState::Failed(_))
    }

    #[inline(always)]
    pub fn is_unparsed(&self) -> bool {
        matches!(self, ParseState::Unparsed)
    }

    /// The parsed output, when in `Parsed`.
    pub fn output(&self) -> Option<&ParsedOutputP> {
        match self {
            ParseState::Parsed(outputp) => Some(outputp),
            _ => None,
        }
    }

    /// The stored failure, when in `Failed`.
    pub fn error(&self) -> Option<&ParseError> {
        match self {
            ParseState::Failed(err) => Some(err),
            _ => None,
        }
    }
}
