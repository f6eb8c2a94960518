// src/data/packet.rs

//! Implements a [`PacketRecord`] struct.
//!
//! [`PacketRecord`]: crate::data::packet::PacketRecord

use crate::common::{Bytes, Opcode, PacketIndex};

use std::fmt;
use std::sync::Arc;

use ::chrono::{DateTime, Utc};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Capture timestamp of a [`PacketRecord`].
pub type CaptureTime = DateTime<Utc>;

/// Thread-safe [Atomic Reference Counting Pointer] to a [`PacketRecord`].
///
/// [Atomic Reference Counting Pointer]: std::sync::Arc
pub type PacketP = Arc<PacketRecord>;

/// One raw packet captured in a network log.
///
/// Immutable once created; owned exclusively by the
/// [`ItemCollection`] (via the wrapping [`ViewerItem`]).
///
/// [`ItemCollection`]: crate::viewer::collection::ItemCollection
/// [`ViewerItem`]: crate::data::item::ViewerItem
pub struct PacketRecord {
    /// Position of this packet within the log. Assigned at append,
    /// never changes afterward.
    index: PacketIndex,
    /// The raw packet bytes as captured.
    data: Bytes,
    /// Transport-level opcode. `None` when the underlying packet type
    /// carries no opcode concept.
    opcode: Option<Opcode>,
    /// Capture timestamp.
    time: CaptureTime,
}

impl fmt::Debug for PacketRecord {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("PacketRecord")
            .field("index", &self.index)
            .field("data.len", &self.data.len())
            .field("opcode", &self.opcode)
            .field("time", &self.time)
            .finish()
    }
}

impl PacketRecord {
    /// Create a `PacketRecord` from passed arguments.
    pub fn new(
        index: PacketIndex,
        data: Bytes,
        opcode: Option<Opcode>,
        time: CaptureTime,
    ) -> PacketRecord {
        PacketRecord {
            index,
            data,
            opcode,
            time,
        }
    }

    #[inline(always)]
    pub fn index(&self) -> PacketIndex {
        self.index
    }

    /// The raw packet bytes.
    #[inline(always)]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Byte length of the raw packet.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The transport-level opcode, if the packet type carries one.
    #[inline(always)]
    pub fn opcode(&self) -> Option<Opcode> {
        self.opcode
    }

    /// The capture timestamp.
    #[inline(always)]
    pub fn time(&self) -> &CaptureTime {
        &self.time
    }
}
