//! Record decoder
//!
//! Walks the element chain of one V3 record and records where each extension's
//! payload lives inside the record. Payloads are not interpreted here; callers decode
//! what they need through [`ExtensionIndex::extension`].

use crate::catalog::{ExtensionType, MAX_ELEMENTS};
use crate::cursor::ByteCursor;
use crate::error::DecodeError;
use crate::extension::Extension;
use crate::header::{ElementHeader, RecordHeader};

/// Location of an extension payload, relative to the start of its record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElementSpan {
    pub offset: usize,
    pub len: usize,
}

impl ElementSpan {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Per-record map from extension type to payload location
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionIndex {
    slots: [Option<ElementSpan>; MAX_ELEMENTS],
    walked: u16,
}

impl Default for ExtensionIndex {
    fn default() -> Self {
        Self {
            slots: [None; MAX_ELEMENTS],
            walked: 0,
        }
    }
}

impl ExtensionIndex {
    /// Index with no extensions
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, ext_type: ExtensionType) -> Option<ElementSpan> {
        ext_type.slot().and_then(|slot| self.slots[slot])
    }

    pub fn contains(&self, ext_type: ExtensionType) -> bool {
        self.get(ext_type).is_some()
    }

    /// Payload bytes of `ext_type` inside `record`
    pub fn payload<'r>(&self, record: &'r [u8], ext_type: ExtensionType) -> Option<&'r [u8]> {
        self.get(ext_type).and_then(|span| record.get(span.range()))
    }

    /// Decoded extension of `ext_type`, if the record has one
    pub fn extension(
        &self,
        record: &[u8],
        ext_type: ExtensionType,
    ) -> Option<Result<Extension, DecodeError>> {
        self.payload(record, ext_type)
            .map(|payload| Extension::decode(ext_type, payload))
    }

    /// Types present in this record, in id order
    pub fn present(&self) -> impl Iterator<Item = ExtensionType> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, span)| span.is_some())
            .map(|(id, _)| ExtensionType::from_id(id as u16))
    }

    /// Number of elements walked, including ones without an index slot
    pub fn walked(&self) -> u16 {
        self.walked
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    fn insert(&mut self, ext_type: ExtensionType, span: ElementSpan) {
        if let Some(slot) = ext_type.slot() {
            // duplicates: last one wins
            self.slots[slot] = Some(span);
        }
    }
}

/// Build the extension index of the record at the start of `record`.
///
/// The declared record size bounds the walk; `record` may extend beyond it.
pub fn build_index(record: &[u8]) -> Result<ExtensionIndex, DecodeError> {
    let header = RecordHeader::parse(record)?;
    let size = usize::from(header.size);
    if size < RecordHeader::SIZE || size > record.len() {
        return Err(DecodeError::Truncated {
            offset: 0,
            needed: size.max(RecordHeader::SIZE),
            available: record.len(),
        });
    }

    let mut cursor = ByteCursor::new(&record[..size]);
    cursor.skip(RecordHeader::SIZE)?;

    let mut index = ExtensionIndex::default();
    while !cursor.is_empty() {
        let offset = cursor.position();
        let element = ElementHeader::read(&mut cursor)?;
        let length = usize::from(element.length);
        if length == 0 {
            return Err(DecodeError::ZeroLengthElement { offset });
        }
        if length < ElementHeader::SIZE {
            return Err(DecodeError::Truncated {
                offset,
                needed: ElementHeader::SIZE,
                available: length,
            });
        }

        let payload_len = length - ElementHeader::SIZE;
        cursor.skip(payload_len)?;
        index.insert(
            ExtensionType::from_id(element.ext_type),
            ElementSpan {
                offset: offset + ElementHeader::SIZE,
                len: payload_len,
            },
        );
        index.walked = index.walked.saturating_add(1);
    }

    if index.walked != header.num_elements {
        return Err(DecodeError::CountMismatch {
            declared: header.num_elements,
            walked: index.walked,
            index: Box::new(index),
        });
    }

    Ok(index)
}

/// A record with its header parsed and extension index built
#[derive(Clone, Debug)]
pub struct DecodedRecord<'a> {
    pub header: RecordHeader,
    pub index: ExtensionIndex,
    bytes: &'a [u8],
}

impl<'a> DecodedRecord<'a> {
    /// Record bytes, exactly `header.size` long
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn extension(&self, ext_type: ExtensionType) -> Option<Result<Extension, DecodeError>> {
        self.index.extension(self.bytes, ext_type)
    }
}

/// Decode a complete record for read-only consumers such as renderers.
///
/// An element count mismatch is tolerated; the index of the walked chain is used.
pub fn decode_record(bytes: &[u8]) -> Result<DecodedRecord<'_>, DecodeError> {
    let index = match build_index(bytes) {
        Ok(index) => index,
        Err(err) if err.is_soft() => err.salvage().unwrap_or_default(),
        Err(err) => return Err(err),
    };
    let header = RecordHeader::parse(bytes)?;
    Ok(DecodedRecord {
        header,
        index,
        bytes: &bytes[..usize::from(header.size)],
    })
}
