use flowrec_common::{protocol, GenericFlow};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    Other(u8),
}

impl Protocol {
    pub fn from_number(proto: u8) -> Self {
        match proto {
            protocol::TCP => Protocol::Tcp,
            protocol::UDP => Protocol::Udp,
            protocol::ICMP => Protocol::Icmp,
            other => Protocol::Other(other),
        }
    }

    /// Label used for metrics
    pub fn label(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
            Protocol::Other(_) => "other",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
            Protocol::Icmp => write!(f, "ICMP"),
            Protocol::Other(proto) => write!(f, "Protocol({})", proto),
        }
    }
}

/// Flow, packet and byte counts of one protocol class.
///
/// Counters wrap around; packet and byte counts come straight off the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProtocolBucket {
    pub flows: u64,
    pub packets: u64,
    pub bytes: u64,
}

impl ProtocolBucket {
    fn add(&mut self, packets: u64, bytes: u64) {
        self.flows = self.flows.wrapping_add(1);
        self.packets = self.packets.wrapping_add(packets);
        self.bytes = self.bytes.wrapping_add(bytes);
    }
}

/// Traffic statistics of everything written to one output.
///
/// ICMPv6 lands in `other`; only protocol 1 counts as ICMP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatRecord {
    pub total: ProtocolBucket,
    pub icmp: ProtocolBucket,
    pub tcp: ProtocolBucket,
    pub udp: ProtocolBucket,
    pub other: ProtocolBucket,
    pub first_seen_ms: Option<u64>,
    pub last_seen_ms: Option<u64>,
}

impl StatRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account one flow record
    pub fn record_flow(&mut self, flow: &GenericFlow) {
        let packets = flow.in_packets;
        let bytes = flow.in_bytes;

        self.bucket_mut(Protocol::from_number(flow.proto))
            .add(packets, bytes);
        self.total.add(packets, bytes);

        self.first_seen_ms = Some(
            self.first_seen_ms
                .map_or(flow.msec_first, |seen| seen.min(flow.msec_first)),
        );
        self.last_seen_ms = Some(
            self.last_seen_ms
                .map_or(flow.msec_last, |seen| seen.max(flow.msec_last)),
        );
    }

    pub fn bucket(&self, protocol: Protocol) -> &ProtocolBucket {
        match protocol {
            Protocol::Tcp => &self.tcp,
            Protocol::Udp => &self.udp,
            Protocol::Icmp => &self.icmp,
            Protocol::Other(_) => &self.other,
        }
    }

    fn bucket_mut(&mut self, protocol: Protocol) -> &mut ProtocolBucket {
        match protocol {
            Protocol::Tcp => &mut self.tcp,
            Protocol::Udp => &mut self.udp,
            Protocol::Icmp => &mut self.icmp,
            Protocol::Other(_) => &mut self.other,
        }
    }

    /// Per-protocol buckets in a fixed order
    pub fn buckets(&self) -> [(&'static str, &ProtocolBucket); 4] {
        [
            ("icmp", &self.icmp),
            ("tcp", &self.tcp),
            ("udp", &self.udp),
            ("other", &self.other),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(proto: u8, packets: u64, bytes: u64, first: u64, last: u64) -> GenericFlow {
        GenericFlow {
            proto,
            in_packets: packets,
            in_bytes: bytes,
            msec_first: first,
            msec_last: last,
            ..Default::default()
        }
    }

    #[test]
    fn test_protocol_classification() {
        assert_eq!(Protocol::from_number(6), Protocol::Tcp);
        assert_eq!(Protocol::from_number(17), Protocol::Udp);
        assert_eq!(Protocol::from_number(1), Protocol::Icmp);
        assert_eq!(Protocol::from_number(58), Protocol::Other(58));
        assert_eq!(Protocol::Other(47).to_string(), "Protocol(47)");
    }

    #[test]
    fn test_record_flow_updates_bucket_and_total() {
        let mut stats = StatRecord::new();
        stats.record_flow(&flow(17, 3, 300, 2000, 2500));
        stats.record_flow(&flow(6, 1, 40, 1000, 1500));
        stats.record_flow(&flow(58, 2, 96, 3000, 3100));

        assert_eq!(
            stats.udp,
            ProtocolBucket {
                flows: 1,
                packets: 3,
                bytes: 300
            }
        );
        assert_eq!(stats.tcp.flows, 1);
        assert_eq!(stats.other.bytes, 96);
        assert_eq!(stats.icmp, ProtocolBucket::default());
        assert_eq!(
            stats.total,
            ProtocolBucket {
                flows: 3,
                packets: 6,
                bytes: 436
            }
        );
        assert_eq!(stats.first_seen_ms, Some(1000));
        assert_eq!(stats.last_seen_ms, Some(3100));
    }

    #[test]
    fn test_empty_stats_have_no_seen_range() {
        let stats = StatRecord::default();
        assert_eq!(stats.first_seen_ms, None);
        assert_eq!(stats.bucket(Protocol::Icmp).flows, 0);
    }

    #[test]
    fn test_counters_wrap_on_overflow() {
        let mut stats = StatRecord::new();
        stats.record_flow(&flow(17, u64::MAX, u64::MAX, 0, 0));
        stats.record_flow(&flow(17, 2, 1, 0, 0));

        assert_eq!(stats.udp.flows, 2);
        assert_eq!(stats.udp.packets, 1);
        assert_eq!(stats.udp.bytes, 0);
        assert_eq!(stats.total.bytes, 0);
    }
}
