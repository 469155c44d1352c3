use flowrec::cli::commands::format_reports;
use flowrec::config::{IngestConfig, StatsFormat};
use flowrec::error::{FlowrecError, IngestError};
use flowrec::ingest::{run_source, ExporterInfo, PipelineOptions};
use flowrec::render::render_record;
use flowrec::storage::read_block_file;
use flowrec_common::{Extension, GenericFlow, PcapdPacketBuilder, RecordHeader, V3_RECORD_TYPE};
use std::fs;

fn tcp_packet(records: usize) -> Vec<u8> {
    let mut builder = PcapdPacketBuilder::new();
    for i in 0..records {
        builder = builder
            .record(
                RecordHeader::v3(),
                &[Extension::GenericFlow(GenericFlow {
                    proto: 6,
                    src_port: 1024 + i as u16,
                    dst_port: 443,
                    in_packets: 10,
                    in_bytes: 1500,
                    ..Default::default()
                })],
            )
            .unwrap();
    }
    builder.build().unwrap()
}

#[test]
fn test_error_types() {
    let err = FlowrecError::from(IngestError::OutputFull {
        needed: 84,
        appended: 1,
    });
    assert!(err.to_string().contains("need 84 bytes"));

    let err = FlowrecError::Capture {
        offset: 32,
        reason: "truncated".to_string(),
    };
    assert!(err.to_string().contains("offset 32"));
}

#[test]
fn test_version_const() {
    assert!(!flowrec::VERSION.is_empty());
}

#[test]
fn test_capture_to_block_file() {
    let dir = tempfile::tempdir().unwrap();
    let capture = dir.path().join("edge.pcapd");
    let output = dir.path().join("edge.blocks");
    fs::write(&capture, [tcp_packet(3), tcp_packet(2)].concat()).unwrap();

    let yaml = format!(
        "block_capacity: 65535\nsources:\n  - ident: edge\n    address: 198.51.100.7\n    capture: {}\n    output: {}\n",
        capture.display(),
        output.display()
    );
    let config = IngestConfig::from_yaml(&yaml).unwrap();
    let report = run_source(
        &config.sources[0],
        config.block_capacity,
        PipelineOptions::default(),
    )
    .unwrap();

    assert_eq!(report.packets, 2);
    assert_eq!(report.records, 5);
    assert_eq!(report.stats.tcp.flows, 5);
    assert_eq!(report.stats.tcp.bytes, 7500);
    assert_eq!(report.exporters[0].packets, 2);

    let blocks = read_block_file(&output).unwrap();
    let mut flows = 0;
    let mut exporters = Vec::new();
    for block in &blocks {
        for record in block.records() {
            let record = record.unwrap();
            match record.record_type {
                V3_RECORD_TYPE => {
                    let text = render_record(record.bytes).unwrap();
                    assert!(text.contains("ip exporter  = 198.51.100.7"));
                    flows += 1;
                }
                ExporterInfo::RECORD_TYPE => {
                    exporters.push(ExporterInfo::parse(record.bytes).unwrap())
                }
                other => panic!("unexpected record type {}", other),
            }
        }
    }
    assert_eq!(flows, 5);
    assert_eq!(exporters.len(), 1);
    assert_eq!(exporters[0].sysid, 1);
    assert_eq!(exporters[0].ip, "198.51.100.7".parse::<std::net::IpAddr>().unwrap());

    let json = format_reports(&[report.clone()], StatsFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value[0]["ident"], "edge");
    assert_eq!(value[0]["stats"]["tcp"]["flows"], 5);

    let text = format_reports(&[report], StatsFormat::Prometheus).unwrap();
    assert!(text.contains("flowrec_bytes_total"));
}

#[test]
fn test_truncated_capture_keeps_complete_packets() {
    let dir = tempfile::tempdir().unwrap();
    let capture = dir.path().join("cut.pcapd");
    let output = dir.path().join("cut.blocks");
    let mut bytes = [tcp_packet(1), tcp_packet(1)].concat();
    bytes.truncate(bytes.len() - 5);
    fs::write(&capture, bytes).unwrap();

    let yaml = format!(
        "sources:\n  - ident: cut\n    address: 192.0.2.1\n    capture: {}\n    output: {}\n",
        capture.display(),
        output.display()
    );
    let config = IngestConfig::from_yaml(&yaml).unwrap();
    let report = run_source(&config.sources[0], config.block_capacity, PipelineOptions::default())
        .unwrap();

    assert_eq!(report.packets, 1);
    assert_eq!(report.records, 1);
}
