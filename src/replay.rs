//! Capture replay
//!
//! A capture is a file of pcapd packets stored back to back, as received. Packets
//! are delimited by the `length` field of their header.

use crate::error::{FlowrecError, Result};
use bytes::Bytes;
use flowrec_common::PcapdHeader;
use std::path::Path;

/// Iterates the packets of a capture; stops after the first framing error
pub struct CaptureReader {
    data: Bytes,
    pos: usize,
}

impl CaptureReader {
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::from_bytes(Bytes::from(data)))
    }

    pub fn from_bytes(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    /// Offset of the next packet
    pub fn position(&self) -> usize {
        self.pos
    }

    fn fail(&mut self, reason: String) -> Option<Result<Bytes>> {
        let offset = self.pos;
        self.pos = self.data.len();
        Some(Err(FlowrecError::Capture { offset, reason }))
    }
}

impl Iterator for CaptureReader {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.data.len() - self.pos;
        if remaining == 0 {
            return None;
        }

        let header = match PcapdHeader::parse(&self.data[self.pos..]) {
            Ok(header) => header,
            Err(_) => {
                return self.fail(format!(
                    "{} trailing bytes, too short for a pcapd header",
                    remaining
                ))
            }
        };

        let length = usize::from(header.length);
        if length < PcapdHeader::SIZE {
            return self.fail(format!("packet length {} below header size", length));
        }
        if length > remaining {
            return self.fail(format!(
                "packet length {} exceeds the {} bytes left",
                length, remaining
            ));
        }

        let packet = self.data.slice(self.pos..self.pos + length);
        self.pos += length;
        Some(Ok(packet))
    }
}
