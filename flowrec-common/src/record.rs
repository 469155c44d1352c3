//! Record writer
//!
//! Builds a V3 record from header fields, an element list and appended extensions.
//! The header's `size` and `num_elements` are computed from what was written and
//! stored when the record is finished.

use crate::cursor::ByteWriter;
use crate::error::EncodeError;
use crate::extension::Extension;
use crate::header::RecordHeader;

pub struct RecordWriter<'a> {
    writer: ByteWriter<'a>,
    header: RecordHeader,
    elements: u16,
}

impl<'a> RecordWriter<'a> {
    /// Start a record at the beginning of `buf`.
    ///
    /// `size` and `num_elements` of `header` are ignored and recomputed.
    pub fn new(buf: &'a mut [u8], header: RecordHeader) -> Result<Self, EncodeError> {
        let mut writer = ByteWriter::new(buf);
        writer.put_zeros(RecordHeader::SIZE)?;
        Ok(Self {
            writer,
            header,
            elements: 0,
        })
    }

    /// Copy already encoded elements verbatim
    pub fn append_raw(&mut self, elements: &[u8], count: u16) -> Result<(), EncodeError> {
        let total = self
            .elements
            .checked_add(count)
            .ok_or(EncodeError::TooManyElements)?;
        self.writer.put_slice(elements)?;
        self.elements = total;
        Ok(())
    }

    pub fn push(&mut self, ext: &Extension) -> Result<(), EncodeError> {
        let total = self
            .elements
            .checked_add(1)
            .ok_or(EncodeError::TooManyElements)?;
        ext.write_element(&mut self.writer)?;
        self.elements = total;
        Ok(())
    }

    /// Bytes written so far, header included
    pub fn len(&self) -> usize {
        self.writer.position()
    }

    /// Nothing written beyond the header
    pub fn is_empty(&self) -> bool {
        self.len() == RecordHeader::SIZE
    }

    pub fn num_elements(&self) -> u16 {
        self.elements
    }

    /// Store the final header and return the record size
    pub fn finish(self) -> Result<usize, EncodeError> {
        let size = self.writer.position();
        let header = RecordHeader {
            size: u16::try_from(size).map_err(|_| EncodeError::RecordTooLarge { size })?,
            num_elements: self.elements,
            ..self.header
        };
        let buf = self.writer.into_inner();
        header.write(&mut ByteWriter::new(&mut buf[..RecordHeader::SIZE]))?;
        Ok(size)
    }
}
