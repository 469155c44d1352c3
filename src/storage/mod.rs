//! Output side of the ingest pipeline

pub mod block;

pub use block::{
    parse_blocks, read_block_file, BlockHeader, DataBlock, FlushingBlock, OutputBlock, RecordIter,
    StoredRecord,
};

use crate::metrics::StatRecord;

/// Destination of enriched records.
///
/// The pipeline reserves room with `ensure_space`, writes a record at `cursor` and
/// then `commit`s it. Nothing written past the committed length is visible.
pub trait OutputSink {
    /// Make room for `needed` bytes. Returns the space available at the cursor, or 0
    /// when `needed` bytes cannot be provided.
    fn ensure_space(&mut self, needed: usize) -> usize;

    /// Writable space following the committed data
    fn cursor(&mut self) -> &mut [u8];

    /// Publish `len` bytes written at the cursor as one record
    fn commit(&mut self, len: usize);

    fn stats_mut(&mut self) -> &mut StatRecord;
}
