// src/printer/export.rs

//! Streams every item's parsed text to a writer, in index order.

use crate::common::{CancelToken, Count, Percent, ProgressCoalesce, ResultFind};
use crate::data::item::ViewerItemP;
use crate::data::packet::PacketRecord;
use crate::data::parsed::ParseState;
use crate::viewer::ParseContext;

use std::io::{Error, Write};

#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Typed [`ResultFind`] of one export run: the count of items written,
/// `Cancelled`, or a write error.
///
/// [`ResultFind`]: crate::common::ResultFind
pub type ResultExport = ResultFind<Count, Error>;

/// One line summarizing the raw packet, under each packet header.
fn packet_summary_line(packet: &PacketRecord) -> String {
    match packet.opcode() {
        Some(opcode) => format!(
            "{} | opcode 0x{:X} | {} bytes",
            packet
                .time()
                .format("%Y-%m-%d %H:%M:%S%.6f"),
            opcode,
            packet.len(),
        ),
        None => format!(
            "{} | {} bytes",
            packet
                .time()
                .format("%Y-%m-%d %H:%M:%S%.6f"),
            packet.len(),
        ),
    }
}

/// Stream `__ Packet <i> __…` header blocks plus each item's parsed text
/// to `writer`, in index order.
///
/// Parsing is on demand and idempotent. A parse failure yields a header
/// block with an empty body; it never aborts the export. The
/// cancellation flag is polled once per item; cancellation is a distinct
/// outcome, not an error. Progress is coalesced to integer-percent
/// changes.
pub fn export_parsed_text<W: Write>(
    ctx: &ParseContext,
    writer: &mut W,
    progress: &mut dyn FnMut(Percent),
    cancel: &CancelToken,
) -> ResultExport {
    defn!();
    let count: usize = ctx
        .items()
        .count();
    let mut coalesce = ProgressCoalesce::new();
    let mut written: Count = 0;
    for index in 0..count {
        if cancel.is_cancelled() {
            defx!("cancelled after {} items", written);
            return ResultFind::Cancelled;
        }
        let itemp: ViewerItemP = match ctx
            .items()
            .get(index)
        {
            Ok(itemp) => itemp,
            Err(err) => return ResultFind::Err(err),
        };
        let state: ParseState = ctx.ensure_parsed(&itemp);
        if let Err(err) = writeln!(writer, "__ Packet {} _________________________", index) {
            return ResultFind::Err(err);
        }
        if let Err(err) = writeln!(writer, "{}", packet_summary_line(itemp.packet())) {
            return ResultFind::Err(err);
        }
        match state {
            ParseState::Parsed(outputp) if !outputp.text().is_empty() => {
                if let Err(err) = writeln!(writer, "{}", outputp.text().trim_end_matches('\n')) {
                    return ResultFind::Err(err);
                }
            }
            // failed or undefined parses export an empty body
            _ => {}
        }
        written += 1;
        if let Some(percent) = coalesce.update(written, count as Count) {
            progress(percent);
        }
    }
    if let Err(err) = writer.flush() {
        return ResultFind::Err(err);
    }
    defx!("exported {} items", written);

    ResultFind::Found(written)
}
