pub mod exporter;
pub mod pipeline;
pub mod source;

pub use exporter::{
    AddressFamily, Exporter, ExporterInfo, ExporterKey, ExporterPersistence, ExporterRegistry,
    ExporterStats, ExporterStore,
};
pub use pipeline::{PacketSummary, PcapdPipeline, PipelineOptions, MIN_PACKET_SIZE};
pub use source::{run_source, FlowSource, SourceReport};

use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Where and when a packet was received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketContext {
    pub source: IpAddr,
    pub received: SystemTime,
}

impl PacketContext {
    pub fn new(source: IpAddr, received: SystemTime) -> Self {
        Self { source, received }
    }

    pub fn now(source: IpAddr) -> Self {
        Self::new(source, SystemTime::now())
    }

    /// Receive time in milliseconds since the Unix epoch
    pub fn received_ms(&self) -> u64 {
        self.received
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}
