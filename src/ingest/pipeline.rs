//! pcapd packet ingestion.
//!
//! Each record of a packet is copied to the output sink with an extra received-IP
//! extension naming the exporter, receive-time stamped, ICMP-normalized and accounted
//! in the sink's statistics. Records already committed when a packet fails stay
//! committed.

use crate::error::IngestError;
use crate::ingest::exporter::{Exporter, ExporterKey, ExporterPersistence, ExporterRegistry};
use crate::ingest::PacketContext;
use crate::render::render_record;
use crate::storage::OutputSink;
use flowrec_common::{
    build_index, protocol, ByteCursor, ByteWriter, EncodeError, Extension, ExtensionType,
    GenericFlow, Layout, PcapdHeader, RecordHeader, RecordWriter,
};
use tracing::{debug, info, warn};

/// Smallest packet that can carry a record
pub const MIN_PACKET_SIZE: usize = PcapdHeader::SIZE + RecordHeader::SIZE;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Log every forwarded record in readable form
    pub print_records: bool,
}

/// Outcome of a fully processed packet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketSummary {
    /// Records appended to the sink
    pub records: u32,
    /// Record count announced in the pcapd header
    pub declared: u32,
    /// Bytes left at the end of the packet, too short for a record
    pub leftover: usize,
    pub exporter_created: bool,
}

/// Turns pcapd packets into enriched records for an [`OutputSink`]
pub struct PcapdPipeline<P: ExporterPersistence> {
    registry: ExporterRegistry,
    persistence: P,
    options: PipelineOptions,
}

impl<P: ExporterPersistence> PcapdPipeline<P> {
    pub fn new(persistence: P) -> Self {
        Self::with_options(persistence, PipelineOptions::default())
    }

    pub fn with_options(persistence: P, options: PipelineOptions) -> Self {
        Self {
            registry: ExporterRegistry::new(),
            persistence,
            options,
        }
    }

    pub fn registry(&self) -> &ExporterRegistry {
        &self.registry
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Ingest one pcapd packet.
    ///
    /// On error, `IngestError::appended` tells how many records of this packet were
    /// already committed to `sink`.
    pub fn process_packet<S>(
        &mut self,
        ctx: &PacketContext,
        data: &[u8],
        sink: &mut S,
    ) -> Result<PacketSummary, IngestError>
    where
        S: OutputSink + ?Sized,
    {
        let result = self.ingest(ctx, data, sink);
        if let Err(e) = &result {
            warn!("Dropping pcapd packet from {}: {}", ctx.source, e);
        }
        result
    }

    fn ingest<S>(
        &mut self,
        ctx: &PacketContext,
        data: &[u8],
        sink: &mut S,
    ) -> Result<PacketSummary, IngestError>
    where
        S: OutputSink + ?Sized,
    {
        let short = IngestError::ShortPacket {
            len: data.len(),
            needed: MIN_PACKET_SIZE,
        };
        if data.len() < PcapdHeader::SIZE {
            return Err(short);
        }
        let header = PcapdHeader::parse(data).map_err(|_| short.clone())?;

        let key = ExporterKey::new(header.version, ctx.source);
        let (exporter, exporter_created) =
            self.registry.lookup_or_create(key, &mut self.persistence);

        if data.len() < MIN_PACKET_SIZE {
            return Err(short);
        }
        exporter.packets += 1;

        debug!(
            "pcapd packet from {}: {} bytes, {} records declared, sequence {}",
            ctx.source,
            data.len(),
            header.num_record,
            header.last_sequence
        );

        let mut input = ByteCursor::new(&data[PcapdHeader::SIZE..]);
        let received = Extension::received(ctx.source);
        let received_ms = ctx.received_ms();
        let mut records = 0u32;

        loop {
            forward_record(
                &mut input,
                &received,
                received_ms,
                exporter,
                sink,
                self.options.print_records,
            )
            .map_err(|e| e.with_appended(records))?;
            records += 1;

            if input.remaining() <= RecordHeader::SIZE {
                break;
            }
        }

        let leftover = input.remaining();
        if leftover > 0 {
            info!(
                "Processed pcapd packet from {}: {} bytes left over",
                ctx.source, leftover
            );
        }
        if records != header.num_record {
            info!(
                "Processed {} records from {}, header declared {}",
                records, ctx.source, header.num_record
            );
        }

        Ok(PacketSummary {
            records,
            declared: header.num_record,
            leftover,
            exporter_created,
        })
    }
}

/// Copy the record at the front of `input` to `sink` and consume it.
fn forward_record<S>(
    input: &mut ByteCursor<'_>,
    received: &Extension,
    received_ms: u64,
    exporter: &mut Exporter,
    sink: &mut S,
    print_records: bool,
) -> Result<(), IngestError>
where
    S: OutputSink + ?Sized,
{
    let remaining = input.remaining();
    let record = input.rest();
    let header = RecordHeader::parse(record).map_err(|_| IngestError::RecordOverrun {
        size: RecordHeader::SIZE,
        remaining,
        appended: 0,
    })?;
    let size = usize::from(header.size);
    let needed = size + received.element_len();

    if sink.ensure_space(needed) < needed {
        return Err(IngestError::OutputFull {
            needed,
            appended: 0,
        });
    }
    if size > remaining {
        return Err(IngestError::RecordOverrun {
            size,
            remaining,
            appended: 0,
        });
    }
    if size < RecordHeader::SIZE {
        return Err(IngestError::InvalidRecord {
            reason: "record size smaller than its header",
            appended: 0,
        });
    }

    let written = extend_record(&record[..size], &header, received, sink.cursor())
        .map_err(|e| match e {
            EncodeError::BufferTooSmall { .. } => IngestError::OutputFull {
                needed,
                appended: 0,
            },
            EncodeError::RecordTooLarge { .. } => IngestError::InvalidRecord {
                reason: "extended record exceeds the 16 bit size field",
                appended: 0,
            },
            EncodeError::TooManyElements => IngestError::InvalidRecord {
                reason: "extended record exceeds the 16 bit element count",
                appended: 0,
            },
        })?;

    let output = &mut sink.cursor()[..written];
    if let Some(flow) = enrich_flow(output, received_ms) {
        sink.stats_mut().record_flow(&flow);
    }
    if print_records {
        match render_record(&sink.cursor()[..written]) {
            Ok(text) => info!("{}", text),
            Err(e) => debug!("Unable to render record: {}", e),
        }
    }

    sink.commit(written);
    exporter.flows += 1;
    input
        .skip(size)
        .map_err(|_| IngestError::RecordOverrun {
            size,
            remaining,
            appended: 0,
        })
}

/// Write `record` followed by `received` to `out`, returning the new record size
fn extend_record(
    record: &[u8],
    header: &RecordHeader,
    received: &Extension,
    out: &mut [u8],
) -> Result<usize, EncodeError> {
    let mut writer = RecordWriter::new(out, *header)?;
    writer.append_raw(&record[RecordHeader::SIZE..], header.num_elements)?;
    writer.push(received)?;
    writer.finish()
}

/// Stamp the receive time into the record's GenericFlow and move an ICMP type/code
/// carried in the source port over to the destination port.
///
/// Returns the updated flow, or `None` when the record has no usable GenericFlow.
fn enrich_flow(record: &mut [u8], received_ms: u64) -> Option<GenericFlow> {
    let index = match build_index(record) {
        Ok(index) => index,
        Err(e) if e.is_soft() => {
            info!("{}", e);
            e.salvage()?
        }
        Err(e) => {
            debug!("Record without usable extensions: {}", e);
            return None;
        }
    };

    let span = index.get(ExtensionType::GenericFlow)?;
    let payload = record.get_mut(span.range())?;
    let mut flow = match GenericFlow::decode(ExtensionType::GenericFlow, payload) {
        Ok(flow) => flow,
        Err(e) => {
            debug!("Invalid GenericFlow extension: {}", e);
            return None;
        }
    };

    flow.msec_received = received_ms;
    if flow.proto == protocol::ICMP && flow.src_port != 0 {
        flow.dst_port = flow.src_port;
        flow.src_port = 0;
    }

    flow.write(&mut ByteWriter::new(payload)).ok()?;
    Some(flow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::exporter::ExporterStore;
    use crate::storage::OutputBlock;
    use flowrec_common::PcapdPacketBuilder;
    use std::time::{Duration, SystemTime};

    fn ctx() -> PacketContext {
        PacketContext::new(
            "192.0.2.1".parse().unwrap(),
            SystemTime::UNIX_EPOCH + Duration::from_millis(1_700_000_000_000),
        )
    }

    fn flow_packet(count: usize) -> Vec<u8> {
        let mut builder = PcapdPacketBuilder::new();
        for i in 0..count {
            builder = builder
                .record(
                    RecordHeader::v3(),
                    &[Extension::GenericFlow(GenericFlow {
                        proto: 6,
                        in_packets: 1,
                        in_bytes: 40 + i as u64,
                        ..Default::default()
                    })],
                )
                .unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_short_packet_skips_exporter() {
        let mut pipeline = PcapdPipeline::new(ExporterStore::new());
        let mut block = OutputBlock::new(1024);

        let err = pipeline
            .process_packet(&ctx(), &[0u8; 15], &mut block)
            .unwrap_err();
        assert!(matches!(err, IngestError::ShortPacket { len: 15, .. }));
        assert!(pipeline.registry().is_empty());
    }

    #[test]
    fn test_header_only_packet_registers_exporter_without_counting() {
        let mut pipeline = PcapdPipeline::new(ExporterStore::new());
        let mut block = OutputBlock::new(1024);
        let packet = PcapdPacketBuilder::new().build().unwrap();

        let err = pipeline
            .process_packet(&ctx(), &packet, &mut block)
            .unwrap_err();
        assert!(matches!(err, IngestError::ShortPacket { .. }));

        let exporter = pipeline.registry().iter().next().unwrap();
        assert_eq!(exporter.packets, 0);
        assert_eq!(pipeline.persistence().len(), 1);
    }

    #[test]
    fn test_counters() {
        let mut pipeline = PcapdPipeline::new(ExporterStore::new());
        let mut block = OutputBlock::new(4096);

        let summary = pipeline
            .process_packet(&ctx(), &flow_packet(3), &mut block)
            .unwrap();
        assert_eq!(summary.records, 3);
        assert_eq!(summary.declared, 3);
        assert!(summary.exporter_created);

        let summary = pipeline
            .process_packet(&ctx(), &flow_packet(2), &mut block)
            .unwrap();
        assert!(!summary.exporter_created);

        let exporter = pipeline.registry().iter().next().unwrap();
        assert_eq!(exporter.packets, 2);
        assert_eq!(exporter.flows, 5);
        assert_eq!(block.num_records(), 5);
        assert_eq!(block.stats().tcp.flows, 5);
    }

    #[test]
    fn test_record_without_generic_flow_is_not_accounted() {
        let mut pipeline = PcapdPipeline::new(ExporterStore::new());
        let mut block = OutputBlock::new(1024);
        let packet = PcapdPacketBuilder::new()
            .record(RecordHeader::v3(), &[Extension::Vlan(Default::default())])
            .unwrap()
            .build()
            .unwrap();

        let summary = pipeline.process_packet(&ctx(), &packet, &mut block).unwrap();
        assert_eq!(summary.records, 1);
        assert_eq!(block.stats().total.flows, 0);
        assert_eq!(block.len(), 12 + 12 + 8);
    }

    #[test]
    fn test_undersized_record_is_invalid() {
        let mut pipeline = PcapdPipeline::new(ExporterStore::new());
        let mut block = OutputBlock::new(1024);
        let mut raw = [0u8; 12];
        raw[..2].copy_from_slice(&11u16.to_le_bytes());
        raw[2..4].copy_from_slice(&8u16.to_le_bytes());
        let packet = PcapdPacketBuilder::new().raw(&raw).build().unwrap();

        let err = pipeline
            .process_packet(&ctx(), &packet, &mut block)
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidRecord { appended: 0, .. }));
        assert!(block.is_empty());
    }

    #[test]
    fn test_hard_decode_error_still_forwards_record() {
        let mut pipeline = PcapdPipeline::new(ExporterStore::new());
        let mut block = OutputBlock::new(1024);
        // one element claiming zero length
        let mut raw = [0u8; 16];
        raw[..2].copy_from_slice(&11u16.to_le_bytes());
        raw[2..4].copy_from_slice(&16u16.to_le_bytes());
        raw[4..6].copy_from_slice(&1u16.to_le_bytes());
        raw[12..14].copy_from_slice(&1u16.to_le_bytes());
        let packet = PcapdPacketBuilder::new().raw(&raw).build().unwrap();

        let summary = pipeline.process_packet(&ctx(), &packet, &mut block).unwrap();
        assert_eq!(summary.records, 1);
        assert_eq!(block.len(), 16 + 8);
        assert_eq!(block.stats().total.flows, 0);
    }
}
