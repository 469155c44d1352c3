//! Fixed-capacity output blocks and the block file format.
//!
//! A block file is a sequence of data blocks, each a 12 byte little-endian header
//! followed by `size` bytes of records:
//!
//! ```text
//! numRecords u32 | size u32 | type u16 (= 3) | flags u16
//! ```
//!
//! Every stored record starts with `type u16, size u16`, so a reader can step over
//! record types it does not know.

use crate::error::{FlowrecError, Result};
use crate::metrics::StatRecord;
use crate::storage::OutputSink;
use bytes::Bytes;
use flowrec_common::{ByteCursor, ByteWriter, DecodeError, EncodeError};
use std::io::Write;
use std::path::Path;
use tracing::debug;

pub const DATA_BLOCK_TYPE: u16 = 3;

/// Smallest record that can be stored: `type` and `size`
const MIN_STORED_RECORD: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub num_records: u32,
    /// Data bytes following the header
    pub size: u32,
    pub block_type: u16,
    pub flags: u16,
}

impl BlockHeader {
    pub const SIZE: usize = 12;

    pub fn parse(buf: &[u8]) -> std::result::Result<Self, DecodeError> {
        let mut cursor = ByteCursor::new(buf);
        Ok(Self {
            num_records: cursor.read_u32_le()?,
            size: cursor.read_u32_le()?,
            block_type: cursor.read_u16_le()?,
            flags: cursor.read_u16_le()?,
        })
    }

    pub fn write(&self, writer: &mut ByteWriter<'_>) -> std::result::Result<(), EncodeError> {
        writer.put_u32_le(self.num_records)?;
        writer.put_u32_le(self.size)?;
        writer.put_u16_le(self.block_type)?;
        writer.put_u16_le(self.flags)
    }
}

/// In-memory block the pipeline appends records to.
///
/// The capacity is fixed at construction; `ensure_space` never grows it. Statistics
/// survive `clear` since they describe the whole output, not a single block.
#[derive(Debug)]
pub struct OutputBlock {
    buf: Vec<u8>,
    used: usize,
    num_records: u32,
    stats: StatRecord,
}

impl OutputBlock {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity],
            used: 0,
            num_records: 0,
            stats: StatRecord::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Committed bytes
    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    pub fn free(&self) -> usize {
        self.buf.len() - self.used
    }

    pub fn num_records(&self) -> u32 {
        self.num_records
    }

    pub fn data(&self) -> &[u8] {
        &self.buf[..self.used]
    }

    pub fn stats(&self) -> &StatRecord {
        &self.stats
    }

    pub fn records(&self) -> RecordIter<'_> {
        RecordIter::new(self.data())
    }

    /// Drop all committed records
    pub fn clear(&mut self) {
        self.used = 0;
        self.num_records = 0;
    }

    /// Write the block with its header to `out` and clear it.
    ///
    /// Returns the number of bytes written; an empty block writes nothing.
    pub fn write_to<W: Write>(&mut self, out: &mut W) -> Result<usize> {
        if self.is_empty() {
            return Ok(0);
        }

        let size = u32::try_from(self.used)
            .map_err(|_| FlowrecError::BlockFile(format!("Block of {} bytes", self.used)))?;
        let header = BlockHeader {
            num_records: self.num_records,
            size,
            block_type: DATA_BLOCK_TYPE,
            flags: 0,
        };
        let mut raw = [0u8; BlockHeader::SIZE];
        header
            .write(&mut ByteWriter::new(&mut raw))
            .map_err(|e| FlowrecError::BlockFile(e.to_string()))?;

        out.write_all(&raw)?;
        out.write_all(self.data())?;
        debug!(
            "Flushed block: {} records, {} bytes",
            self.num_records, self.used
        );

        let written = BlockHeader::SIZE + self.used;
        self.clear();
        Ok(written)
    }
}

impl OutputSink for OutputBlock {
    fn ensure_space(&mut self, needed: usize) -> usize {
        let free = self.free();
        if free >= needed {
            free
        } else {
            0
        }
    }

    fn cursor(&mut self) -> &mut [u8] {
        &mut self.buf[self.used..]
    }

    fn commit(&mut self, len: usize) {
        self.used = (self.used + len).min(self.buf.len());
        self.num_records += 1;
    }

    fn stats_mut(&mut self) -> &mut StatRecord {
        &mut self.stats
    }
}

/// An [`OutputBlock`] that writes itself to `out` when a record does not fit.
///
/// A failed write leaves the block untouched and makes every later `ensure_space`
/// report no room; `finish` returns the error.
pub struct FlushingBlock<'a, W: Write> {
    block: &'a mut OutputBlock,
    out: &'a mut W,
    flushed: u64,
    error: Option<FlowrecError>,
}

impl<'a, W: Write> FlushingBlock<'a, W> {
    pub fn new(block: &'a mut OutputBlock, out: &'a mut W) -> Self {
        Self {
            block,
            out,
            flushed: 0,
            error: None,
        }
    }

    /// Blocks written so far
    pub fn flushed(&self) -> u64 {
        self.flushed
    }

    /// Number of blocks written, or the write error that stopped flushing
    pub fn finish(self) -> Result<u64> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.flushed),
        }
    }
}

impl<W: Write> OutputSink for FlushingBlock<'_, W> {
    fn ensure_space(&mut self, needed: usize) -> usize {
        if self.error.is_some() {
            return 0;
        }
        if self.block.free() < needed && !self.block.is_empty() {
            match self.block.write_to(self.out) {
                Ok(_) => self.flushed += 1,
                Err(e) => {
                    self.error = Some(e);
                    return 0;
                }
            }
        }
        self.block.ensure_space(needed)
    }

    fn cursor(&mut self) -> &mut [u8] {
        self.block.cursor()
    }

    fn commit(&mut self, len: usize) {
        self.block.commit(len)
    }

    fn stats_mut(&mut self) -> &mut StatRecord {
        self.block.stats_mut()
    }
}

/// One record as stored in a block
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoredRecord<'a> {
    pub record_type: u16,
    pub bytes: &'a [u8],
}

/// Iterates the records of block data; stops after the first malformed record
pub struct RecordIter<'a> {
    data: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> RecordIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            failed: false,
        }
    }

    fn next_record(&mut self) -> std::result::Result<StoredRecord<'a>, DecodeError> {
        let rest = &self.data[self.pos..];
        let mut cursor = ByteCursor::new(rest);
        let record_type = cursor.read_u16_le()?;
        let size = usize::from(cursor.read_u16_le()?);
        if size < MIN_STORED_RECORD || size > rest.len() {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: size.max(MIN_STORED_RECORD),
                available: rest.len(),
            });
        }

        self.pos += size;
        Ok(StoredRecord {
            record_type,
            bytes: &rest[..size],
        })
    }
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = std::result::Result<StoredRecord<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.data.len() {
            return None;
        }
        let item = self.next_record();
        self.failed = item.is_err();
        Some(item)
    }
}

/// A data block read back from a block file
#[derive(Clone, Debug)]
pub struct DataBlock {
    pub header: BlockHeader,
    pub data: Bytes,
}

impl DataBlock {
    pub fn records(&self) -> RecordIter<'_> {
        RecordIter::new(&self.data)
    }
}

/// Split the contents of a block file into data blocks
pub fn parse_blocks(contents: Bytes) -> Result<Vec<DataBlock>> {
    let mut blocks = Vec::new();
    let mut pos = 0;

    while pos < contents.len() {
        let header = BlockHeader::parse(&contents[pos..]).map_err(|e| {
            FlowrecError::BlockFile(format!("Block header at offset {}: {}", pos, e))
        })?;
        if header.block_type != DATA_BLOCK_TYPE {
            return Err(FlowrecError::BlockFile(format!(
                "Unknown block type {} at offset {}",
                header.block_type, pos
            )));
        }

        let start = pos + BlockHeader::SIZE;
        let end = start + header.size as usize;
        if end > contents.len() {
            return Err(FlowrecError::BlockFile(format!(
                "Block at offset {} declares {} bytes, file has {} left",
                pos,
                header.size,
                contents.len() - start
            )));
        }

        blocks.push(DataBlock {
            header,
            data: contents.slice(start..end),
        });
        pos = end;
    }

    Ok(blocks)
}

pub fn read_block_file(path: &Path) -> Result<Vec<DataBlock>> {
    let contents = std::fs::read(path)?;
    parse_blocks(Bytes::from(contents))
}
