// src/readers/netlog.rs

//! The [`NetworkLog`] source abstraction and an in-memory implementation.
//!
//! [`NetworkLog`]: crate::readers::netlog::NetworkLog

use crate::common::{Bytes, CancelToken, Count, Opcode, Percent, ProgressCoalesce};
use crate::data::packet::CaptureTime;

use std::io::Result;

#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One raw record yielded by a [`NetworkLog`] before the Item Collection
/// assigns it an index.
#[derive(Clone, Debug, PartialEq)]
pub struct RawRecord {
    pub data: Bytes,
    pub opcode: Option<Opcode>,
    pub time: CaptureTime,
}

/// Callback receiving each [`RawRecord`] as it is read.
pub type RecordSink<'a> = &'a mut dyn FnMut(RawRecord);

/// Callback receiving coalesced integer read-progress percentages.
pub type ProgressFn<'a> = &'a mut dyn FnMut(Percent);

/// An ordered source of raw packet records.
///
/// The on-disk codec behind an implementation is out of scope for the
/// core; the core assumes only that records arrive in log order, with a
/// read-progress callback and cooperative cancellation.
pub trait NetworkLog: Send {
    /// Human-readable source name (usually a file name).
    fn name(&self) -> &str;

    /// Expected record count, `0` when unknown. Used to pre-reserve
    /// collection capacity.
    fn capacity_hint(&self) -> usize {
        0
    }

    /// Identifier of the protocol this log was captured with, when the
    /// container records one.
    fn suggested_protocol(&self) -> Option<String> {
        None
    }

    /// Stream every record into `sink`, reporting coalesced progress.
    ///
    /// Returns the count of records delivered. Cancellation stops the
    /// stream promptly at a record boundary and returns the count
    /// delivered so far; it is not an error. Already-delivered records
    /// stay delivered.
    fn read(
        &mut self,
        sink: RecordSink,
        progress: ProgressFn,
        cancel: &CancelToken,
    ) -> Result<Count>;

    /// Release the underlying stream. Called once reading completes;
    /// further `read` calls are not expected.
    fn close_stream(&mut self);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An in-memory [`NetworkLog`], for synthetic logs and tests.
pub struct VecLog {
    name: String,
    suggested: Option<String>,
    records: Vec<RawRecord>,
}

impl VecLog {
    pub fn new(
        name: impl Into<String>,
        records: Vec<RawRecord>,
    ) -> VecLog {
        VecLog {
            name: name.into(),
            suggested: None,
            records,
        }
    }

    /// Attach a suggested protocol identifier.
    pub fn with_suggested_protocol(
        mut self,
        protocol_id: impl Into<String>,
    ) -> VecLog {
        self.suggested = Some(protocol_id.into());

        self
    }
}

impl NetworkLog for VecLog {
    fn name(&self) -> &str {
        &self.name
    }

    fn capacity_hint(&self) -> usize {
        self.records.len()
    }

    fn suggested_protocol(&self) -> Option<String> {
        self.suggested.clone()
    }

    fn read(
        &mut self,
        sink: RecordSink,
        progress: ProgressFn,
        cancel: &CancelToken,
    ) -> Result<Count> {
        defn!("VecLog {:?} read begin", self.name);
        let total: Count = self.records.len() as Count;
        let mut coalesce = ProgressCoalesce::new();
        let mut delivered: Count = 0;
        for record in self.records.iter() {
            if cancel.is_cancelled() {
                break;
            }
            sink(record.clone());
            delivered += 1;
            if let Some(percent) = coalesce.update(delivered, total) {
                progress(percent);
            }
        }
        defx!("VecLog {:?} read end, delivered {}", self.name, delivered);

        Ok(delivered)
    }

    fn close_stream(&mut self) {}
}
