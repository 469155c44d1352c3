//! pcapd export packet header
//!
//! Every pcapd packet starts with a 16 byte header in network byte order,
//! followed by V3 records back to back.

use crate::cursor::{ByteCursor, ByteWriter};
use crate::error::{DecodeError, EncodeError};
use crate::extension::Extension;
use crate::header::RecordHeader;
use crate::record::RecordWriter;

/// Version number carried by pcapd exporters
pub const PCAPD_VERSION: u16 = 240;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PcapdHeader {
    pub version: u16,
    /// Total packet length including this header
    pub length: u16,
    pub last_sequence: u32,
    pub num_record: u32,
    pub reserved: u32,
}

impl PcapdHeader {
    pub const SIZE: usize = 16;

    pub fn new(num_record: u32, length: u16) -> Self {
        Self {
            version: PCAPD_VERSION,
            length,
            last_sequence: 0,
            num_record,
            reserved: 0,
        }
    }

    pub fn parse(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = ByteCursor::new(buf);
        Ok(Self {
            version: cursor.read_u16_be()?,
            length: cursor.read_u16_be()?,
            last_sequence: cursor.read_u32_be()?,
            num_record: cursor.read_u32_be()?,
            reserved: cursor.read_u32_be()?,
        })
    }

    pub fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), EncodeError> {
        writer.put_u16_be(self.version)?;
        writer.put_u16_be(self.length)?;
        writer.put_u32_be(self.last_sequence)?;
        writer.put_u32_be(self.num_record)?;
        writer.put_u32_be(self.reserved)
    }
}

/// Assembles a pcapd packet the way an exporter sends it
#[derive(Debug, Clone)]
pub struct PcapdPacketBuilder {
    buf: Vec<u8>,
    num_record: u32,
    declared: Option<u32>,
    sequence: u32,
}

impl Default for PcapdPacketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PcapdPacketBuilder {
    pub fn new() -> Self {
        Self {
            buf: vec![0u8; PcapdHeader::SIZE],
            num_record: 0,
            declared: None,
            sequence: 0,
        }
    }

    pub fn sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Override the record count written into the header
    pub fn declare_records(mut self, count: u32) -> Self {
        self.declared = Some(count);
        self
    }

    /// Append one record built from `header` and `extensions`
    pub fn record(
        mut self,
        header: RecordHeader,
        extensions: &[Extension],
    ) -> Result<Self, EncodeError> {
        let start = self.buf.len();
        let size = RecordHeader::SIZE
            + extensions
                .iter()
                .map(Extension::element_len)
                .sum::<usize>();
        self.buf.resize(start + size, 0);

        let mut writer = RecordWriter::new(&mut self.buf[start..], header)?;
        for ext in extensions {
            writer.push(ext)?;
        }
        writer.finish()?;
        self.num_record += 1;
        Ok(self)
    }

    /// Append bytes as they are, e.g. a hand-crafted record
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_record == 0
    }

    pub fn build(mut self) -> Result<Vec<u8>, EncodeError> {
        let size = self.buf.len();
        let length = u16::try_from(size).map_err(|_| EncodeError::RecordTooLarge { size })?;
        let header = PcapdHeader {
            version: PCAPD_VERSION,
            length,
            last_sequence: self.sequence,
            num_record: self.declared.unwrap_or(self.num_record),
            reserved: 0,
        };
        header.write(&mut ByteWriter::new(&mut self.buf[..PcapdHeader::SIZE]))?;
        Ok(self.buf)
    }
}
