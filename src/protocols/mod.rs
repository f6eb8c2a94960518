// src/protocols/mod.rs

//! Pluggable protocol catalog for _nlvlib_.
//!
//! ## Overview of protocols
//!
//! * A [`Protocol`] is a stateless interpreter for one packet format. It
//!   supplies a parser factory, [`create_parser`], and optionally an
//!   [`OpcodeTable`] when the packet format has an opcode concept.
//! * A [`PacketParser`] is created per item and turns raw packet bytes
//!   into one [`ParsedOutput`].
//! * A [`ProtocolRegistry`] is the explicit catalog of registered
//!   protocols; exactly one protocol is "current" at a time for a given
//!   open log (tracked by the [`Viewer`], not here).
//!
//! Protocols hold no references to individual items. The registry is an
//! explicit object constructed once at startup and passed by reference,
//! never ambient global state.
//!
//! [`create_parser`]: Protocol::create_parser
//! [`ParsedOutput`]: crate::data::parsed::ParsedOutput
//! [`Viewer`]: crate::viewer::Viewer

pub mod default;
pub mod demo;

use crate::common::Opcode;
use crate::data::packet::PacketRecord;
use crate::data::parsed::{ParseError, ParsedOutput};

use std::fmt::Write as _;
use std::io::{Error, ErrorKind, Result};
use std::sync::{Arc, RwLock};

#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// opcode enumerations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One named value of an [`OpcodeTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpcodeEntry {
    pub value: Opcode,
    pub name: &'static str,
}

/// The opcode enumeration descriptor of a [`Protocol`].
///
/// `None` from [`Protocol::opcode_table`] means the protocol has no opcode
/// concept; searches by opcode fail at setup for such protocols.
#[derive(Clone, Debug)]
pub struct OpcodeTable {
    /// Descriptor name, e.g. `"DemoOpcode"`.
    name: &'static str,
    entries: Vec<OpcodeEntry>,
}

impl OpcodeTable {
    pub fn new(
        name: &'static str,
        entries: Vec<OpcodeEntry>,
    ) -> OpcodeTable {
        OpcodeTable { name, entries }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn entries(&self) -> &[OpcodeEntry] {
        &self.entries
    }

    /// Is the passed opcode a known enumeration value?
    pub fn contains(
        &self,
        opcode: Opcode,
    ) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.value == opcode)
    }

    /// The enumeration name for the passed opcode, when known.
    pub fn name_of(
        &self,
        opcode: Opcode,
    ) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|entry| entry.value == opcode)
            .map(|entry| entry.name)
    }

    /// Resolve user-entered text to an opcode value.
    ///
    /// Tries, in order: a case-insensitive enumeration-name match, a
    /// `0x`-prefixed hexadecimal number, a decimal number.
    pub fn resolve(
        &self,
        text: &str,
    ) -> Option<Opcode> {
        let text = text.trim();
        if let Some(entry) = self
            .entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(text))
        {
            return Some(entry.value);
        }
        if let Some(hex) = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
        {
            return Opcode::from_str_radix(hex, 16).ok();
        }

        text.parse::<Opcode>()
            .ok()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// the Protocol capability
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Thread-safe shared pointer to a registered [`Protocol`].
pub type ProtocolP = Arc<dyn Protocol>;

/// A per-item parser produced by [`Protocol::create_parser`].
///
/// `parse` is called at most once per materialization; idempotency across
/// repeated requests is enforced by
/// [`ViewerItem::ensure_parsed`], not here.
///
/// [`ViewerItem::ensure_parsed`]: crate::data::item::ViewerItem::ensure_parsed
pub trait PacketParser: Send {
    /// Turn the raw packet bytes into one [`ParsedOutput`].
    ///
    /// Failures are returned, never panicked; the caller stores them as a
    /// `Failed` parse state.
    fn parse(
        &mut self,
        packet: &PacketRecord,
    ) -> std::result::Result<ParsedOutput, ParseError>;
}

/// Result of asking a protocol for a parser for one packet.
pub enum ParserCreate {
    /// The protocol recognizes the packet and supplies a parser.
    Parser(Box<dyn PacketParser>),
    /// No parser recognizes this packet. A valid terminal outcome,
    /// distinct from a parse failure; searchable via the
    /// undefined-parser predicate.
    Undefined,
}

/// A pluggable interpreter for one packet format.
///
/// Protocols are stateless factories. Multiple protocols may be
/// registered; the [`Viewer`] tracks which one is current.
///
/// [`Viewer`]: crate::viewer::Viewer
pub trait Protocol: Send + Sync {
    /// Stable identifier used for registry lookup, e.g. `"default"`.
    fn id(&self) -> &str;

    /// Human-readable name, e.g. `"Default"`.
    fn name(&self) -> &str;

    /// The opcode enumeration descriptor, or `None` when this protocol
    /// has no opcode concept.
    fn opcode_table(&self) -> Option<&OpcodeTable>;

    /// Create a parser for one packet, or [`ParserCreate::Undefined`]
    /// when no parser recognizes it.
    fn create_parser(
        &self,
        packet: &PacketRecord,
    ) -> ParserCreate;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// the Protocol Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Explicit catalog of registered protocols.
///
/// Registration order is preserved for deterministic listing.
pub struct ProtocolRegistry {
    protocols: RwLock<Vec<ProtocolP>>,
}

impl Default for ProtocolRegistry {
    fn default() -> ProtocolRegistry {
        ProtocolRegistry::new()
    }
}

impl ProtocolRegistry {
    /// An empty registry.
    pub fn new() -> ProtocolRegistry {
        ProtocolRegistry {
            protocols: RwLock::new(Vec::new()),
        }
    }

    /// A registry preloaded with the built-in protocols,
    /// [`DefaultProtocol`] first.
    ///
    /// [`DefaultProtocol`]: crate::protocols::default::DefaultProtocol
    pub fn with_builtins() -> ProtocolRegistry {
        let registry = ProtocolRegistry::new();
        registry
            .register(Arc::new(default::DefaultProtocol::new()))
            .expect("built-in protocol ids collide");
        registry
            .register(Arc::new(demo::DemoProtocol::new()))
            .expect("built-in protocol ids collide");

        registry
    }

    /// Register a protocol. Fails when another protocol with the same id
    /// is already registered.
    pub fn register(
        &self,
        protocol: ProtocolP,
    ) -> Result<()> {
        let mut protocols = self
            .protocols
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if protocols
            .iter()
            .any(|p| p.id() == protocol.id())
        {
            return Err(Error::new(
                ErrorKind::AlreadyExists,
                format!("protocol id {:?} already registered", protocol.id()),
            ));
        }
        defñ!("registered protocol {:?}", protocol.id());
        protocols.push(protocol);

        Ok(())
    }

    /// All registered protocols, in registration order.
    pub fn list(&self) -> Vec<ProtocolP> {
        self.protocols
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Look up a protocol by its identifier.
    pub fn find_by_id(
        &self,
        id: &str,
    ) -> Option<ProtocolP> {
        self.protocols
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .find(|p| p.id() == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.protocols
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// shared parser helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Bytes shown per hex-dump row.
const HEXDUMP_WIDTH: usize = 16;

/// Render bytes as a conventional offset + hex + ASCII dump.
///
/// Non-printable bytes render as `.` in the ASCII column.
pub fn hexdump_text(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() / HEXDUMP_WIDTH + 1) * 70);
    for (rown, row) in data
        .chunks(HEXDUMP_WIDTH)
        .enumerate()
    {
        let _ = write!(out, "{:08X} ", rown * HEXDUMP_WIDTH);
        for coln in 0..HEXDUMP_WIDTH {
            match row.get(coln) {
                Some(byte) => {
                    let _ = write!(out, " {:02X}", byte);
                }
                None => out.push_str("   "),
            }
        }
        out.push_str("  ");
        for byte in row.iter() {
            out.push(match byte {
                0x20..=0x7E => *byte as char,
                _ => '.',
            });
        }
        out.push('\n');
    }

    out
}

/// Minimum length for a printable-ASCII run to count as an extracted
/// string.
const STRING_RUN_MIN: usize = 4;

/// Extract runs of printable ASCII of at least [`STRING_RUN_MIN`] bytes.
pub fn printable_runs(data: &[u8]) -> Vec<String> {
    let mut runs: Vec<String> = Vec::new();
    let mut current = String::new();
    for byte in data.iter() {
        match byte {
            0x20..=0x7E => current.push(*byte as char),
            _ => {
                if current.len() >= STRING_RUN_MIN {
                    runs.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
            }
        }
    }
    if current.len() >= STRING_RUN_MIN {
        runs.push(current);
    }

    runs
}
