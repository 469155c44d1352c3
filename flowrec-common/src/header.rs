//! Record and element headers of the V3 record format
//!
//! Layout (12 bytes, little-endian):
//! - type: record type, 11 for V3 records
//! - size: total record size including this header
//! - num_elements: number of extension elements following the header
//! - engine_type / engine_id: exporting engine identification
//! - exporter_id: exporter system id
//! - flags: EVENT / SAMPLED / ANON bits
//! - nfversion: export flavor (high bits) and protocol version (low nibble)

use crate::cursor::{ByteCursor, ByteWriter};
use crate::error::{DecodeError, EncodeError};

/// Record type of a V3 record
pub const V3_RECORD_TYPE: u16 = 11;

/// Record header flag bits
pub mod flags {
    pub const EVENT: u8 = 0x01;
    pub const SAMPLED: u8 = 0x02;
    pub const ANON: u8 = 0x04;
}

const FLAVOR_SFLOW: u8 = 0x80;
const FLAVOR_PCAP: u8 = 0x40;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecordHeader {
    pub record_type: u16,
    pub size: u16,
    pub num_elements: u16,
    pub engine_type: u8,
    pub engine_id: u8,
    pub exporter_id: u16,
    pub flags: u8,
    pub nfversion: u8,
}

impl RecordHeader {
    pub const SIZE: usize = 12;

    /// Empty V3 header: no elements, size of the header alone
    pub fn v3() -> Self {
        Self {
            record_type: V3_RECORD_TYPE,
            size: Self::SIZE as u16,
            num_elements: 0,
            engine_type: 0,
            engine_id: 0,
            exporter_id: 0,
            flags: 0,
            nfversion: 0,
        }
    }

    /// Parse the header at the start of `buf`
    pub fn parse(buf: &[u8]) -> Result<Self, DecodeError> {
        Self::read(&mut ByteCursor::new(buf))
    }

    pub fn read(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            record_type: cursor.read_u16_le()?,
            size: cursor.read_u16_le()?,
            num_elements: cursor.read_u16_le()?,
            engine_type: cursor.read_u8()?,
            engine_id: cursor.read_u8()?,
            exporter_id: cursor.read_u16_le()?,
            flags: cursor.read_u8()?,
            nfversion: cursor.read_u8()?,
        })
    }

    pub fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), EncodeError> {
        writer.put_u16_le(self.record_type)?;
        writer.put_u16_le(self.size)?;
        writer.put_u16_le(self.num_elements)?;
        writer.put_u8(self.engine_type)?;
        writer.put_u8(self.engine_id)?;
        writer.put_u16_le(self.exporter_id)?;
        writer.put_u8(self.flags)?;
        writer.put_u8(self.nfversion)
    }

    pub fn is_event(&self) -> bool {
        self.flags & flags::EVENT != 0
    }

    pub fn is_sampled(&self) -> bool {
        self.flags & flags::SAMPLED != 0
    }

    pub fn is_anonymized(&self) -> bool {
        self.flags & flags::ANON != 0
    }

    pub fn flavor(&self) -> ExportFlavor {
        ExportFlavor::from_header(self)
    }

    /// Export protocol version encoded in the low nibble of `nfversion`
    pub fn protocol_version(&self) -> u8 {
        self.nfversion & 0x0F
    }
}

/// What kind of exporter produced a record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFlavor {
    Event,
    /// nfversion 0, records written before the flavor bits existed
    Legacy,
    Netflow,
    Sflow,
    Pcap,
}

impl ExportFlavor {
    pub fn from_header(header: &RecordHeader) -> Self {
        if header.is_event() {
            ExportFlavor::Event
        } else if header.nfversion == 0 {
            ExportFlavor::Legacy
        } else if header.nfversion & FLAVOR_SFLOW != 0 {
            ExportFlavor::Sflow
        } else if header.nfversion & FLAVOR_PCAP != 0 {
            ExportFlavor::Pcap
        } else {
            ExportFlavor::Netflow
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            ExportFlavor::Event => "EVENT",
            ExportFlavor::Legacy => "FLOW",
            ExportFlavor::Netflow => "NETFLOW",
            ExportFlavor::Sflow => "SFLOW",
            ExportFlavor::Pcap => "PCAP",
        }
    }
}

impl std::fmt::Display for ExportFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Header in front of every extension payload.
///
/// `length` counts this header plus the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElementHeader {
    pub ext_type: u16,
    pub length: u16,
}

impl ElementHeader {
    pub const SIZE: usize = 4;

    pub fn read(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            ext_type: cursor.read_u16_le()?,
            length: cursor.read_u16_le()?,
        })
    }

    pub fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), EncodeError> {
        writer.put_u16_le(self.ext_type)?;
        writer.put_u16_le(self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_header_field_order() {
        let header = RecordHeader {
            record_type: V3_RECORD_TYPE,
            size: 0x0150,
            num_elements: 3,
            engine_type: 0x11,
            engine_id: 1,
            exporter_id: 0x0203,
            flags: flags::SAMPLED,
            nfversion: 0x41,
        };
        let mut buf = [0u8; RecordHeader::SIZE];
        header.write(&mut ByteWriter::new(&mut buf)).unwrap();

        assert_eq!(
            buf,
            [0x0B, 0x00, 0x50, 0x01, 0x03, 0x00, 0x11, 0x01, 0x03, 0x02, 0x02, 0x41]
        );
        assert_eq!(RecordHeader::parse(&buf).unwrap(), header);
    }

    #[test]
    fn test_flavor_decoding() {
        let mut header = RecordHeader::v3();
        assert_eq!(header.flavor(), ExportFlavor::Legacy);

        header.nfversion = 0x41;
        assert_eq!(header.flavor(), ExportFlavor::Pcap);
        assert_eq!(header.protocol_version(), 1);

        header.nfversion = 0x85;
        assert_eq!(header.flavor(), ExportFlavor::Sflow);

        header.nfversion = 0x09;
        assert_eq!(header.flavor(), ExportFlavor::Netflow);

        header.flags = flags::EVENT;
        assert_eq!(header.flavor(), ExportFlavor::Event);
    }

    #[test]
    fn test_short_header_is_truncated() {
        let err = RecordHeader::parse(&[0x0B, 0x00, 0x10]).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));
    }
}
