//! Drives one capture through a pipeline into a block file

use crate::config::SourceConfig;
use crate::error::{FlowrecError, Result};
use crate::ingest::exporter::{ExporterInfo, ExporterStats, ExporterStore};
use crate::ingest::pipeline::{PcapdPipeline, PipelineOptions};
use crate::ingest::PacketContext;
use crate::metrics::StatRecord;
use crate::replay::CaptureReader;
use crate::storage::{FlushingBlock, OutputBlock, OutputSink};
use flowrec_common::ByteWriter;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::net::IpAddr;
use std::time::SystemTime;
use tracing::{info, warn};

/// Summary of one ingested source
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub ident: String,
    pub packets: u64,
    pub dropped: u64,
    pub records: u64,
    pub blocks: u64,
    pub stats: StatRecord,
    pub exporters: Vec<ExporterStats>,
}

/// Pipeline, output block and block file of one source
pub struct FlowSource<W: Write> {
    ident: String,
    address: IpAddr,
    pipeline: PcapdPipeline<ExporterStore>,
    block: OutputBlock,
    out: W,
    packets: u64,
    dropped: u64,
    records: u64,
    blocks: u64,
}

impl<W: Write> FlowSource<W> {
    pub fn new(
        ident: impl Into<String>,
        address: IpAddr,
        block_capacity: usize,
        options: PipelineOptions,
        out: W,
    ) -> Self {
        Self {
            ident: ident.into(),
            address,
            pipeline: PcapdPipeline::with_options(ExporterStore::new(), options),
            block: OutputBlock::new(block_capacity),
            out,
            packets: 0,
            dropped: 0,
            records: 0,
            blocks: 0,
        }
    }

    pub fn pipeline(&self) -> &PcapdPipeline<ExporterStore> {
        &self.pipeline
    }

    /// Ingest one packet, writing out the block whenever the next record does not fit.
    ///
    /// Failed packets are dropped and counted; records they already appended stay.
    pub fn process(&mut self, packet: &[u8], received: SystemTime) -> Result<()> {
        self.packets += 1;
        let ctx = PacketContext::new(self.address, received);

        let mut sink = FlushingBlock::new(&mut self.block, &mut self.out);
        let result = self.pipeline.process_packet(&ctx, packet, &mut sink);
        self.blocks += sink.finish()?;

        match result {
            Ok(summary) => self.records += u64::from(summary.records),
            Err(e) => {
                self.records += u64::from(e.appended());
                self.dropped += 1;
            }
        }
        Ok(())
    }

    /// Write the current block to the output if it holds anything
    pub fn flush(&mut self) -> Result<()> {
        if self.block.write_to(&mut self.out)? > 0 {
            self.blocks += 1;
        }
        Ok(())
    }

    /// Append the exporter records, flush and report
    pub fn finish(mut self) -> Result<SourceReport> {
        let infos: Vec<ExporterInfo> = self.pipeline.persistence().records().to_vec();
        let mut sink = FlushingBlock::new(&mut self.block, &mut self.out);
        for info in &infos {
            if sink.ensure_space(ExporterInfo::SIZE) < ExporterInfo::SIZE {
                sink.finish()?;
                return Err(FlowrecError::BlockFile(format!(
                    "No room for a {} byte exporter record",
                    ExporterInfo::SIZE
                )));
            }
            info.write(&mut ByteWriter::new(sink.cursor()))
                .map_err(|e| FlowrecError::BlockFile(e.to_string()))?;
            sink.commit(ExporterInfo::SIZE);
        }
        self.blocks += sink.finish()?;
        self.flush()?;
        self.out.flush()?;

        info!(
            "[{}] Ingested {} packets ({} dropped), {} records in {} blocks",
            self.ident, self.packets, self.dropped, self.records, self.blocks
        );

        Ok(SourceReport {
            exporters: self.pipeline.registry().snapshot(),
            stats: self.block.stats().clone(),
            ident: self.ident,
            packets: self.packets,
            dropped: self.dropped,
            records: self.records,
            blocks: self.blocks,
        })
    }
}

/// Replay the capture of `config` into its block file
pub fn run_source(
    config: &SourceConfig,
    block_capacity: usize,
    options: PipelineOptions,
) -> Result<SourceReport> {
    info!(
        "[{}] Replaying {} from {}",
        config.ident,
        config.capture.display(),
        config.address
    );

    let capture = CaptureReader::open(&config.capture)?;
    let out = BufWriter::new(File::create(&config.output)?);
    let mut source = FlowSource::new(
        config.ident.clone(),
        config.address,
        block_capacity,
        options,
        out,
    );

    for packet in capture {
        match packet {
            Ok(packet) => source.process(&packet, SystemTime::now())?,
            Err(e) => {
                warn!("[{}] {}", config.ident, e);
                break;
            }
        }
    }

    source.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::parse_blocks;
    use bytes::Bytes;
    use flowrec_common::{Extension, GenericFlow, PcapdPacketBuilder, RecordHeader};

    fn packet(records: usize) -> Vec<u8> {
        let mut builder = PcapdPacketBuilder::new();
        for _ in 0..records {
            builder = builder
                .record(
                    RecordHeader::v3(),
                    &[Extension::GenericFlow(GenericFlow {
                        proto: 17,
                        in_packets: 1,
                        in_bytes: 100,
                        ..Default::default()
                    })],
                )
                .unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_small_block_is_flushed_between_packets() {
        let mut out = Vec::new();
        let mut source = FlowSource::new(
            "edge",
            "192.0.2.1".parse().unwrap(),
            1024,
            PipelineOptions::default(),
            &mut out,
        );
        for _ in 0..10 {
            source.process(&packet(4), SystemTime::now()).unwrap();
        }
        let report = source.finish().unwrap();

        assert_eq!(report.packets, 10);
        assert_eq!(report.dropped, 0);
        assert_eq!(report.records, 40);
        assert!(report.blocks > 1);
        assert_eq!(report.stats.udp.flows, 40);
        assert_eq!(report.exporters.len(), 1);
        assert_eq!(report.exporters[0].flows, 40);

        let blocks = parse_blocks(Bytes::from(out)).unwrap();
        let stored: u32 = blocks.iter().map(|b| b.header.num_records).sum();
        // 40 flow records and one exporter record
        assert_eq!(stored, 41);
    }

    #[test]
    fn test_malformed_packet_is_dropped() {
        let mut out = Vec::new();
        let mut source = FlowSource::new(
            "edge",
            "192.0.2.1".parse().unwrap(),
            4096,
            PipelineOptions::default(),
            &mut out,
        );
        source.process(&[0u8; 10], SystemTime::now()).unwrap();
        source.process(&packet(1), SystemTime::now()).unwrap();
        let report = source.finish().unwrap();

        assert_eq!(report.packets, 2);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.records, 1);
    }

    #[test]
    fn test_packet_larger_than_block_is_split_across_blocks() {
        let mut out = Vec::new();
        let mut source = FlowSource::new(
            "edge",
            "192.0.2.1".parse().unwrap(),
            1024,
            PipelineOptions::default(),
            &mut out,
        );
        // 16 records of 72 bytes once extended
        source.process(&packet(16), SystemTime::now()).unwrap();
        let report = source.finish().unwrap();

        assert_eq!(report.dropped, 0);
        assert_eq!(report.records, 16);
        assert_eq!(report.stats.udp.flows, 16);
        assert_eq!(report.blocks, 2);

        let blocks = parse_blocks(Bytes::from(out)).unwrap();
        let stored: Vec<u32> = blocks.iter().map(|b| b.header.num_records).collect();
        // 14 records fill the first block, the last two share one with the exporter record
        assert_eq!(stored, vec![14, 3]);
    }
}
