// src/readers/framedlog.rs

//! A minimal length-prefixed packet-log container, [`FramedLog`] and
//! [`FramedLogWriter`].
//!
//! This is deliberately the simplest container that can carry the data
//! model: real capture codecs are out of scope for the core, but the
//! _nlv_ binary needs an on-disk format to open and the test suite needs
//! a round-trippable one.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! header:  magic "NLVC" | u32 version | u32 count | u8 idlen | idlen×u8 protocol-id
//! record:  u32 datalen | u8 flags | (u32 opcode when flags&0x01) | i64 micros | datalen×u8 data
//! ```
//!
//! `count == 0` means "unknown, read to end of file"; [`FramedLogWriter`]
//! backfills the true count on [`finish`].
//!
//! [`FramedLog`]: crate::readers::framedlog::FramedLog
//! [`FramedLogWriter`]: crate::readers::framedlog::FramedLogWriter
//! [`finish`]: crate::readers::framedlog::FramedLogWriter::finish

use crate::common::{
    CancelToken,
    Count,
    FPath,
    File,
    FileSz,
    Opcode,
    Percent,
    ProgressCoalesce,
};
use crate::data::packet::CaptureTime;
use crate::readers::netlog::{NetworkLog, ProgressFn, RawRecord, RecordSink};

use std::io::{BufReader, BufWriter, Error, ErrorKind, Read, Result, Seek, SeekFrom, Write};

use ::chrono::{DateTime, Utc};
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// File magic, first four bytes of a framed log.
pub const FRAMED_MAGIC: [u8; 4] = *b"NLVC";

/// Container version written and accepted.
pub const FRAMED_VERSION: u32 = 1;

/// Record flag bit: an opcode field follows the flags byte.
const FLAG_HAS_OPCODE: u8 = 0x01;

/// Refuse records claiming more data than this; a corrupt length prefix
/// would otherwise ask for an absurd allocation.
const RECORD_SZ_MAX: u32 = 0x0FFF_FFFF;

/// Byte offset of the `count` header field, for backfill on `finish`.
const COUNT_OFFSET: u64 = 8;

fn err_truncated(what: &str) -> Error {
    Error::new(ErrorKind::UnexpectedEof, format!("framed log truncated reading {}", what))
}

fn read_u32(reader: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;

    Ok(u32::from_le_bytes(buf))
}

fn read_u8(reader: &mut impl Read) -> Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;

    Ok(buf[0])
}

fn read_i64(reader: &mut impl Read) -> Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;

    Ok(i64::from_le_bytes(buf))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// [`NetworkLog`] implementation reading the framed container.
#[derive(Debug)]
pub struct FramedLog {
    path: FPath,
    /// `None` after `close_stream`.
    reader: Option<BufReader<File>>,
    filesz: FileSz,
    /// Bytes consumed so far; drives read progress.
    consumed: FileSz,
    /// Record count from the header, `0` when unknown.
    count: u32,
    protocol_id: Option<String>,
}

impl FramedLog {
    /// Open the framed log at `path` and validate its header.
    pub fn open(path: &FPath) -> Result<FramedLog> {
        defn!("({:?})", path);
        let file: File = File::open(path)?;
        let filesz: FileSz = file
            .metadata()?
            .len();
        let mut reader = BufReader::new(file);
        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|_| Error::new(ErrorKind::InvalidData, "not a framed log: short header"))?;
        if magic != FRAMED_MAGIC {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("not a framed log: bad magic {:?}", magic),
            ));
        }
        let version: u32 = read_u32(&mut reader)?;
        if version != FRAMED_VERSION {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("unsupported framed log version {}", version),
            ));
        }
        let count: u32 = read_u32(&mut reader)?;
        let idlen: u8 = read_u8(&mut reader)?;
        let protocol_id: Option<String> = match idlen {
            0 => None,
            _ => {
                let mut idbuf = vec![0u8; idlen as usize];
                reader
                    .read_exact(&mut idbuf)
                    .map_err(|_| err_truncated("protocol id"))?;
                let id = String::from_utf8(idbuf).map_err(|_| {
                    Error::new(ErrorKind::InvalidData, "protocol id is not valid UTF-8")
                })?;
                Some(id)
            }
        };
        let consumed: FileSz = 13 + idlen as FileSz;
        defx!("({:?}): version {} count {} protocol {:?}", path, version, count, protocol_id);

        Ok(FramedLog {
            path: path.clone(),
            reader: Some(reader),
            filesz,
            consumed,
            count,
            protocol_id,
        })
    }

    /// Read one record, or `None` at a clean end of file.
    fn read_record(&mut self) -> Result<Option<RawRecord>> {
        let reader = match self.reader.as_mut() {
            Some(reader) => reader,
            None => return Err(Error::new(ErrorKind::Other, "framed log stream is closed")),
        };
        let datalen: u32 = match read_u32(reader) {
            Ok(datalen) => datalen,
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err),
        };
        if datalen > RECORD_SZ_MAX {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("record length {} exceeds maximum {}", datalen, RECORD_SZ_MAX),
            ));
        }
        let flags: u8 = read_u8(reader).map_err(|_| err_truncated("record flags"))?;
        let opcode: Option<Opcode> = match flags & FLAG_HAS_OPCODE {
            0 => None,
            _ => Some(read_u32(reader).map_err(|_| err_truncated("record opcode"))?),
        };
        let micros: i64 = read_i64(reader).map_err(|_| err_truncated("record timestamp"))?;
        let time: CaptureTime = DateTime::<Utc>::from_timestamp_micros(micros)
            .ok_or_else(|| Error::new(ErrorKind::InvalidData, "record timestamp out of range"))?;
        let mut data = vec![0u8; datalen as usize];
        reader
            .read_exact(&mut data)
            .map_err(|_| err_truncated("record data"))?;
        self.consumed += 4 + 1 + 8 + datalen as FileSz;
        if opcode.is_some() {
            self.consumed += 4;
        }

        Ok(Some(RawRecord { data, opcode, time }))
    }
}

impl NetworkLog for FramedLog {
    fn name(&self) -> &str {
        &self.path
    }

    fn capacity_hint(&self) -> usize {
        self.count as usize
    }

    fn suggested_protocol(&self) -> Option<String> {
        self.protocol_id.clone()
    }

    fn read(
        &mut self,
        sink: RecordSink,
        progress: ProgressFn,
        cancel: &CancelToken,
    ) -> Result<Count> {
        defn!("FramedLog {:?} read begin", self.path);
        let total: Count = self.filesz;
        let mut coalesce = ProgressCoalesce::new();
        let mut delivered: Count = 0;
        loop {
            if cancel.is_cancelled() {
                break;
            }
            match self.read_record()? {
                Some(record) => {
                    sink(record);
                    delivered += 1;
                    if let Some(percent) = coalesce.update(self.consumed, total) {
                        progress(percent);
                    }
                }
                None => break,
            }
        }
        defx!("FramedLog {:?} read end, delivered {}", self.path, delivered);

        Ok(delivered)
    }

    fn close_stream(&mut self) {
        self.reader = None;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Writer for the framed container; the complement of [`FramedLog`].
pub struct FramedLogWriter {
    writer: BufWriter<File>,
    count: u32,
}

impl FramedLogWriter {
    /// Create (truncate) the framed log at `path`.
    pub fn create(
        path: &FPath,
        protocol_id: Option<&str>,
    ) -> Result<FramedLogWriter> {
        let file: File = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&FRAMED_MAGIC)?;
        writer.write_all(&FRAMED_VERSION.to_le_bytes())?;
        // count backfilled by `finish`
        writer.write_all(&0u32.to_le_bytes())?;
        let id: &[u8] = protocol_id
            .unwrap_or("")
            .as_bytes();
        if id.len() > u8::MAX as usize {
            return Err(Error::new(ErrorKind::InvalidInput, "protocol id longer than 255 bytes"));
        }
        writer.write_all(&[id.len() as u8])?;
        writer.write_all(id)?;

        Ok(FramedLogWriter { writer, count: 0 })
    }

    /// Append one record.
    pub fn write_record(
        &mut self,
        data: &[u8],
        opcode: Option<Opcode>,
        time: &CaptureTime,
    ) -> Result<()> {
        if data.len() as u64 > RECORD_SZ_MAX as u64 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("record length {} exceeds maximum {}", data.len(), RECORD_SZ_MAX),
            ));
        }
        self.writer
            .write_all(&(data.len() as u32).to_le_bytes())?;
        match opcode {
            Some(opcode) => {
                self.writer
                    .write_all(&[FLAG_HAS_OPCODE])?;
                self.writer
                    .write_all(&opcode.to_le_bytes())?;
            }
            None => {
                self.writer
                    .write_all(&[0u8])?;
            }
        }
        self.writer
            .write_all(&time.timestamp_micros().to_le_bytes())?;
        self.writer
            .write_all(data)?;
        self.count += 1;

        Ok(())
    }

    /// Backfill the header count and flush. The writer is consumed.
    pub fn finish(mut self) -> Result<Count> {
        self.writer.flush()?;
        let mut file: File = self
            .writer
            .into_inner()
            .map_err(|err| Error::new(ErrorKind::Other, format!("flush failed: {}", err)))?;
        file.seek(SeekFrom::Start(COUNT_OFFSET))?;
        file.write_all(&self.count.to_le_bytes())?;
        file.flush()?;

        Ok(self.count as Count)
    }
}
