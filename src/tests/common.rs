// src/tests/common.rs

//! Shared fixtures for _nlvlib_ tests: synthetic records, prefilled
//! collections, and parse contexts over the built-in protocols.

#![allow(non_snake_case)]

use crate::common::Opcode;
use crate::data::packet::CaptureTime;
use crate::protocols::demo::{DemoProtocol, OPCODE_DATA, OPCODE_PING, OPCODE_TEXT};
use crate::protocols::ProtocolRegistry;
use crate::readers::netlog::RawRecord;
use crate::viewer::collection::ItemCollection;
use crate::viewer::evictqueue::EvictionQueue;
use crate::viewer::{ParseContext, Viewer};

use std::io::Write;
use std::sync::{Arc, Mutex};

use ::chrono::{Duration, TimeZone, Utc};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A fixed, deterministic capture time, offset by `n` seconds.
pub fn capture_time(n: usize) -> CaptureTime {
    Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0)
        .unwrap()
        + Duration::seconds(n as i64)
}

/// One synthetic raw record; `n` offsets the capture time.
pub fn record(
    n: usize,
    data: &[u8],
    opcode: Option<Opcode>,
) -> RawRecord {
    RawRecord {
        data: data.to_vec(),
        opcode,
        time: capture_time(n),
    }
}

/// Append every record, returning the filled collection.
pub fn fill_collection(records: Vec<RawRecord>) -> Arc<ItemCollection> {
    let items = Arc::new(ItemCollection::new());
    for record in records {
        items.append(record);
    }

    items
}

/// A small mixed collection over the demo protocol:
///
/// | index | opcode | notes                                    |
/// |-------|--------|------------------------------------------|
/// | 0     | PING   | empty payload                            |
/// | 1     | TEXT   | `"Hello World"`                          |
/// | 2     | DATA   | binary payload `DE AD BE EF`             |
/// | 3     | —      | no opcode: undefined parser              |
/// | 4     | TEXT   | invalid UTF-8: parse failure             |
/// | 5     | 0x77   | opcode missing from the enumeration      |
pub fn demo_records() -> Vec<RawRecord> {
    vec![
        record(0, b"", Some(OPCODE_PING)),
        record(1, b"Hello World", Some(OPCODE_TEXT)),
        record(2, &[0xDE, 0xAD, 0xBE, 0xEF], Some(OPCODE_DATA)),
        record(3, b"raw", None),
        record(4, &[0xFF, 0xFE, 0x00], Some(OPCODE_TEXT)),
        record(5, &[0x01, 0x02], Some(0x77)),
    ]
}

pub fn demo_collection() -> Arc<ItemCollection> {
    fill_collection(demo_records())
}

/// A parse context over the demo protocol with the passed eviction
/// queue.
pub fn demo_context_with(
    items: Arc<ItemCollection>,
    evict: Arc<EvictionQueue>,
) -> ParseContext {
    ParseContext::new(items, Arc::new(DemoProtocol::new()), evict)
}

/// A parse context over the demo protocol with a fresh (disabled)
/// eviction queue.
pub fn demo_context(items: Arc<ItemCollection>) -> ParseContext {
    demo_context_with(items, Arc::new(EvictionQueue::new()))
}

/// A `Viewer` over a registry preloaded with the built-in protocols.
pub fn builtins_viewer() -> Viewer {
    Viewer::new(Arc::new(ProtocolRegistry::with_builtins()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A `Write` target shareable across threads, for export-worker tests.
#[derive(Clone, Default)]
pub struct SharedBuf {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuf {
    pub fn new() -> SharedBuf {
        SharedBuf {
            buf: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(
            &self
                .buf
                .lock()
                .unwrap(),
        )
        .to_string()
    }
}

impl Write for SharedBuf {
    fn write(
        &mut self,
        data: &[u8],
    ) -> std::io::Result<usize> {
        self.buf
            .lock()
            .unwrap()
            .extend_from_slice(data);

        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
