use crate::decoder::ExtensionIndex;
use thiserror::Error;

/// Errors raised while walking or decoding a V3 record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Element at offset {offset} declares zero length")]
    ZeroLengthElement { offset: usize },

    #[error("Truncated input at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Soft error: the chain was well formed, only the declared element count disagrees.
    /// The complete index is carried along so the caller can keep using it.
    #[error("Record declares {declared} elements but {walked} were walked")]
    CountMismatch {
        declared: u16,
        walked: u16,
        index: Box<ExtensionIndex>,
    },

    #[error("Extension {ext_type} payload is {actual} bytes, layout needs {expected}")]
    PayloadSize {
        ext_type: u16,
        expected: usize,
        actual: usize,
    },
}

impl DecodeError {
    /// Whether the error leaves a usable extension index behind.
    pub fn is_soft(&self) -> bool {
        matches!(self, DecodeError::CountMismatch { .. })
    }

    /// Recover the index from a soft error.
    pub fn salvage(self) -> Option<ExtensionIndex> {
        match self {
            DecodeError::CountMismatch { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Errors raised while writing records into an output buffer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Output buffer too small: need {needed} bytes, {available} available")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("Record of {size} bytes exceeds the 16-bit size field")]
    RecordTooLarge { size: usize },

    #[error("Record element count overflows the 16-bit element field")]
    TooManyElements,
}
