//! pcapd flow record ingestion
//!
//! Packets from pcapd exporters are split into V3 records, each record is extended
//! with the exporter's address and stored in fixed-capacity output blocks. The record
//! format itself lives in `flowrec-common`.

pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod render;
pub mod replay;
pub mod storage;

pub use error::{FlowrecError, IngestError, Result};
pub use flowrec_common as format;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
