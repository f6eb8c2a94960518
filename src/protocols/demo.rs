// src/protocols/demo.rs

//! The [`DemoProtocol`]: a small opcode-bearing protocol used by the
//! `nlv` driver and the test suite.
//!
//! It exercises every parser outcome: defined parses, UTF-8 parse
//! failures, packets the protocol does not recognize (no opcode at all),
//! and opcodes missing from the enumeration.
//!
//! [`DemoProtocol`]: crate::protocols::demo::DemoProtocol

use crate::common::Opcode;
use crate::data::packet::PacketRecord;
use crate::data::parsed::{ParseError, ParsedOutput};
use crate::protocols::{
    hexdump_text,
    printable_runs,
    OpcodeEntry,
    OpcodeTable,
    PacketParser,
    ParserCreate,
    Protocol,
};

use ::lazy_static::lazy_static;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Registry identifier of the [`DemoProtocol`].
pub const DEMO_PROTOCOL_ID: &str = "demo";

pub const OPCODE_PING: Opcode = 0x01;
pub const OPCODE_PONG: Opcode = 0x02;
pub const OPCODE_DATA: Opcode = 0x10;
pub const OPCODE_TEXT: Opcode = 0x11;
pub const OPCODE_BYE: Opcode = 0xFF;

lazy_static! {
    static ref DEMO_OPCODES: OpcodeTable = OpcodeTable::new(
        "DemoOpcode",
        vec![
            OpcodeEntry { value: OPCODE_PING, name: "PING" },
            OpcodeEntry { value: OPCODE_PONG, name: "PONG" },
            OpcodeEntry { value: OPCODE_DATA, name: "DATA" },
            OpcodeEntry { value: OPCODE_TEXT, name: "TEXT" },
            OpcodeEntry { value: OPCODE_BYE, name: "BYE" },
        ],
    );
}

/// Opcode-bearing interpreter for the demo packet format.
///
/// A packet without an opcode is not recognized at all
/// ([`ParserCreate::Undefined`]). A `TEXT` packet with an invalid UTF-8
/// body is a parse failure. An opcode outside the enumeration still
/// parses, as an `UNKNOWN` summary.
pub struct DemoProtocol {}

impl DemoProtocol {
    pub fn new() -> DemoProtocol {
        DemoProtocol {}
    }
}

impl Default for DemoProtocol {
    fn default() -> DemoProtocol {
        DemoProtocol::new()
    }
}

impl Protocol for DemoProtocol {
    fn id(&self) -> &str {
        DEMO_PROTOCOL_ID
    }

    fn name(&self) -> &str {
        "Demo Protocol"
    }

    fn opcode_table(&self) -> Option<&OpcodeTable> {
        Some(&DEMO_OPCODES)
    }

    fn create_parser(
        &self,
        packet: &PacketRecord,
    ) -> ParserCreate {
        match packet.opcode() {
            Some(_) => ParserCreate::Parser(Box::new(DemoParser {})),
            // a packet with no opcode is not a demo-format packet
            None => ParserCreate::Undefined,
        }
    }
}

/// Parser created by [`DemoProtocol::create_parser`].
struct DemoParser {}

impl PacketParser for DemoParser {
    fn parse(
        &mut self,
        packet: &PacketRecord,
    ) -> Result<ParsedOutput, ParseError> {
        // `create_parser` only hands out a parser for opcode-bearing packets
        let opcode: Opcode = match packet.opcode() {
            Some(opcode) => opcode,
            None => return Err(ParseError::new("demo packet has no opcode")),
        };
        let data: &[u8] = packet.data();
        match opcode {
            OPCODE_TEXT => {
                let body: &str = std::str::from_utf8(data).map_err(|err| {
                    ParseError::at_offset(
                        format!("TEXT body is not valid UTF-8: {}", err),
                        err.valid_up_to(),
                    )
                })?;
                let text = format!("TEXT ({} bytes)\n{}\n", data.len(), body);
                let binaries = vec![("Payload".to_string(), data.to_vec())];
                let strings = vec![("Text".to_string(), body.to_string())];

                Ok(ParsedOutput::new(text, binaries, strings))
            }
            OPCODE_DATA => {
                let text = format!("DATA ({} bytes)\n{}", data.len(), hexdump_text(data));
                let binaries = vec![("Payload".to_string(), data.to_vec())];
                let strings = printable_runs(data)
                    .into_iter()
                    .enumerate()
                    .map(|(n, run)| (format!("String {}", n), run))
                    .collect();

                Ok(ParsedOutput::new(text, binaries, strings))
            }
            OPCODE_PING | OPCODE_PONG | OPCODE_BYE => {
                // control packets; payload unusual but not an error
                let name: &str = DEMO_OPCODES
                    .name_of(opcode)
                    .unwrap_or("CONTROL");
                let mut text = format!("{}\n", name);
                let mut binaries = Vec::new();
                if !data.is_empty() {
                    text.push_str(&hexdump_text(data));
                    binaries.push(("Payload".to_string(), data.to_vec()));
                }

                Ok(ParsedOutput::new(text, binaries, vec![]))
            }
            _ => {
                let text = format!(
                    "UNKNOWN (opcode 0x{:X}, {} bytes)\n{}",
                    opcode,
                    data.len(),
                    hexdump_text(data),
                );
                let binaries = vec![("Payload".to_string(), data.to_vec())];

                Ok(ParsedOutput::new(text, binaries, vec![]))
            }
        }
    }
}
