// src/protocols/default.rs

//! The [`DefaultProtocol`]: a protocol of last resort that renders any
//! packet as a hex dump. It has no opcode concept.
//!
//! [`DefaultProtocol`]: crate::protocols::default::DefaultProtocol

use crate::data::packet::PacketRecord;
use crate::data::parsed::{ParseError, ParsedOutput};
use crate::protocols::{
    hexdump_text,
    printable_runs,
    OpcodeTable,
    PacketParser,
    ParserCreate,
    Protocol,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Registry identifier of the [`DefaultProtocol`].
pub const DEFAULT_PROTOCOL_ID: &str = "default";

/// Hex-dump interpreter for packets of unknown format.
///
/// Recognizes every packet, never fails, extracts the raw payload and any
/// printable-ASCII runs so binary and text searches have something to
/// scan.
pub struct DefaultProtocol {}

impl DefaultProtocol {
    pub fn new() -> DefaultProtocol {
        DefaultProtocol {}
    }
}

impl Default for DefaultProtocol {
    fn default() -> DefaultProtocol {
        DefaultProtocol::new()
    }
}

impl Protocol for DefaultProtocol {
    fn id(&self) -> &str {
        DEFAULT_PROTOCOL_ID
    }

    fn name(&self) -> &str {
        "Default"
    }

    fn opcode_table(&self) -> Option<&OpcodeTable> {
        None
    }

    fn create_parser(
        &self,
        _packet: &PacketRecord,
    ) -> ParserCreate {
        ParserCreate::Parser(Box::new(DefaultParser {}))
    }
}

/// Parser created by [`DefaultProtocol::create_parser`].
struct DefaultParser {}

impl PacketParser for DefaultParser {
    fn parse(
        &mut self,
        packet: &PacketRecord,
    ) -> Result<ParsedOutput, ParseError> {
        let data: &[u8] = packet.data();
        let text: String = hexdump_text(data);
        let binaries = vec![("Packet Data".to_string(), data.to_vec())];
        let strings = printable_runs(data)
            .into_iter()
            .enumerate()
            .map(|(n, run)| (format!("String {}", n), run))
            .collect();

        Ok(ParsedOutput::new(text, binaries, strings))
    }
}
