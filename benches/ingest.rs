use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use flowrec::ingest::{ExporterStore, PacketContext, PcapdPipeline};
use flowrec::storage::OutputBlock;
use flowrec_common::extension::Ipv4Flow;
use flowrec_common::{build_index, Extension, GenericFlow, PcapdPacketBuilder, RecordHeader};
use std::net::Ipv4Addr;

fn packet(records: usize) -> Vec<u8> {
    let mut builder = PcapdPacketBuilder::new();
    for i in 0..records {
        builder = builder
            .record(
                RecordHeader::v3(),
                &[
                    Extension::GenericFlow(GenericFlow {
                        proto: if i % 3 == 0 { 6 } else { 17 },
                        in_packets: 4,
                        in_bytes: 1200,
                        ..Default::default()
                    }),
                    Extension::Ipv4Flow(Ipv4Flow {
                        src_addr: Ipv4Addr::new(10, 0, 0, i as u8),
                        dst_addr: Ipv4Addr::new(10, 0, 1, 1),
                    }),
                ],
            )
            .expect("record fits");
    }
    builder.build().expect("packet fits")
}

fn bench_ingest(c: &mut Criterion) {
    let data = packet(20);
    let ctx = PacketContext::now("192.0.2.1".parse().expect("address"));

    let mut group = c.benchmark_group("ingest");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("process_packet_20_records", |b| {
        b.iter_batched(
            || {
                (
                    PcapdPipeline::new(ExporterStore::new()),
                    OutputBlock::new(64 * 1024),
                )
            },
            |(mut pipeline, mut block)| {
                pipeline
                    .process_packet(&ctx, black_box(&data), &mut block)
                    .expect("ingest")
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_index(c: &mut Criterion) {
    let data = packet(1);
    let record = &data[16..];

    c.bench_function("build_index", |b| {
        b.iter(|| build_index(black_box(record)).expect("index"))
    });
}

criterion_group!(benches, bench_ingest, bench_index);
criterion_main!(benches);
