use crate::metrics::collector::StatRecord;
use crate::Result;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Publishes per-source traffic statistics in Prometheus text format
pub struct StatsExporter {
    registry: Registry,
    flows: IntCounterVec,
    packets: IntCounterVec,
    bytes: IntCounterVec,
}

impl StatsExporter {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let labels = ["source", "protocol"];

        let flows = IntCounterVec::new(
            Opts::new("flowrec_flows_total", "Flow records ingested"),
            &labels,
        )?;
        let packets = IntCounterVec::new(
            Opts::new("flowrec_packets_total", "Packets accounted by ingested flows"),
            &labels,
        )?;
        let bytes = IntCounterVec::new(
            Opts::new("flowrec_bytes_total", "Bytes accounted by ingested flows"),
            &labels,
        )?;

        registry.register(Box::new(flows.clone()))?;
        registry.register(Box::new(packets.clone()))?;
        registry.register(Box::new(bytes.clone()))?;

        Ok(Self {
            registry,
            flows,
            packets,
            bytes,
        })
    }

    /// Add the buckets of `stats` under the `source` label
    pub fn observe(&self, source: &str, stats: &StatRecord) {
        for (protocol, bucket) in stats.buckets() {
            let labels = [source, protocol];
            self.flows.with_label_values(&labels).inc_by(bucket.flows);
            self.packets.with_label_values(&labels).inc_by(bucket.packets);
            self.bytes.with_label_values(&labels).inc_by(bucket.bytes);
        }
    }

    pub fn encode(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf)
            .map_err(|e| prometheus::Error::Msg(format!("Non UTF-8 metrics output: {}", e)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowrec_common::GenericFlow;

    #[test]
    fn test_encode_labels_by_source_and_protocol() {
        let mut stats = StatRecord::new();
        for _ in 0..2 {
            stats.record_flow(&GenericFlow {
                proto: 17,
                in_packets: 5,
                in_bytes: 500,
                ..Default::default()
            });
        }

        let exporter = StatsExporter::new().unwrap();
        exporter.observe("edge", &stats);
        let text = exporter.encode().unwrap();

        assert!(text.contains("# TYPE flowrec_flows_total counter"));
        let udp_flows = text
            .lines()
            .find(|line| {
                line.starts_with("flowrec_flows_total")
                    && line.contains("protocol=\"udp\"")
                    && line.contains("source=\"edge\"")
            })
            .expect("udp flow counter");
        assert!(udp_flows.ends_with(" 2"));

        let udp_bytes = text
            .lines()
            .find(|line| line.starts_with("flowrec_bytes_total") && line.contains("\"udp\""))
            .expect("udp byte counter");
        assert!(udp_bytes.ends_with(" 1000"));
    }

    #[test]
    fn test_sources_do_not_mix() {
        let mut stats = StatRecord::new();
        stats.record_flow(&GenericFlow {
            proto: 6,
            in_packets: 1,
            in_bytes: 60,
            ..Default::default()
        });

        let exporter = StatsExporter::new().unwrap();
        exporter.observe("a", &stats);
        exporter.observe("b", &stats);
        let text = exporter.encode().unwrap();

        let tcp_lines = text
            .lines()
            .filter(|line| line.starts_with("flowrec_flows_total") && line.contains("\"tcp\""))
            .count();
        assert_eq!(tcp_lines, 2);
    }
}
