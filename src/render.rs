//! Human readable rendering of V3 records

use chrono::{DateTime, Utc};
use flowrec_common::extension::{MacAddr, U32Pair};
use flowrec_common::{
    decode_record, protocol, DecodeError, DecodedRecord, ExportFlavor, Extension,
};
use std::fmt::{self, Display, Formatter};

/// Displays one decoded record, one field per line
pub struct RecordDisplay<'a> {
    record: DecodedRecord<'a>,
}

impl<'a> RecordDisplay<'a> {
    pub fn new(record: DecodedRecord<'a>) -> Self {
        Self { record }
    }
}

/// Render the record at the start of `bytes`
pub fn render_record(bytes: &[u8]) -> Result<String, DecodeError> {
    decode_record(bytes).map(|record| RecordDisplay::new(record).to_string())
}

pub fn format_timestamp(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_mac(mac: u64) -> String {
    let bytes = mac.to_be_bytes();
    bytes[2..]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

impl Display for RecordDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let header = &self.record.header;
        let sampling = if header.is_sampled() {
            "Sampled"
        } else {
            "Unsampled"
        };

        let flavor = header.flavor();
        let version = match flavor {
            ExportFlavor::Event | ExportFlavor::Legacy => String::new(),
            _ => format!(" v{}", header.protocol_version()),
        };
        let present: Vec<String> = self
            .record
            .index
            .present()
            .map(|ext_type| ext_type.id().to_string())
            .collect();

        writeln!(f, "Flow Record:")?;
        write!(
            f,
            "  Flags        = 0x{:02x} {}{}, {}",
            header.flags, flavor, version, sampling
        )?;
        if header.is_anonymized() {
            write!(f, ", Anonymized")?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "  Elements     = {}: {}",
            header.num_elements,
            present.join(" ")
        )?;
        writeln!(f, "  size         = {}", header.size)?;
        writeln!(f, "  engine type  = {}", header.engine_type)?;
        writeln!(f, "  engine ID    = {}", header.engine_id)?;
        writeln!(f, "  export sysid = {}", header.exporter_id)?;

        for ext_type in self.record.index.present() {
            match self.record.extension(ext_type) {
                Some(Ok(ext)) => render_extension(f, &ext)?,
                Some(Err(err)) => writeln!(f, "  [{}] undecodable: {}", ext_type, err)?,
                None => {}
            }
        }
        Ok(())
    }
}

fn render_extension(f: &mut Formatter<'_>, ext: &Extension) -> fmt::Result {
    match ext {
        Extension::GenericFlow(flow) => {
            writeln!(
                f,
                "  first        = {} [{}]",
                flow.msec_first,
                format_timestamp(flow.msec_first)
            )?;
            writeln!(
                f,
                "  last         = {} [{}]",
                flow.msec_last,
                format_timestamp(flow.msec_last)
            )?;
            writeln!(
                f,
                "  received at  = {} [{}]",
                flow.msec_received,
                format_timestamp(flow.msec_received)
            )?;
            writeln!(f, "  proto        = {}", flow.proto)?;
            writeln!(f, "  tcp flags    = 0x{:02x}", flow.tcp_flags)?;
            if flow.proto == protocol::ICMP || flow.proto == protocol::ICMPV6 {
                writeln!(f, "  ICMP         = {}.{}", flow.icmp_type(), flow.icmp_code())?;
            } else {
                writeln!(f, "  src port     = {}", flow.src_port)?;
                writeln!(f, "  dst port     = {}", flow.dst_port)?;
            }
            writeln!(f, "  fwd status   = {}", flow.fwd_status)?;
            writeln!(f, "  src tos      = {}", flow.src_tos)?;
            writeln!(f, "  in packets   = {}", flow.in_packets)?;
            writeln!(f, "  in bytes     = {}", flow.in_bytes)
        }
        Extension::Ipv4Flow(flow) => {
            writeln!(f, "  src addr     = {}", flow.src_addr)?;
            writeln!(f, "  dst addr     = {}", flow.dst_addr)
        }
        Extension::Ipv6Flow(flow) => {
            writeln!(f, "  src addr     = {}", flow.src_addr)?;
            writeln!(f, "  dst addr     = {}", flow.dst_addr)
        }
        Extension::FlowMisc(misc) => {
            writeln!(f, "  input        = {}", misc.input)?;
            writeln!(f, "  output       = {}", misc.output)?;
            writeln!(f, "  src mask     = {}", misc.src_mask)?;
            writeln!(f, "  dst mask     = {}", misc.dst_mask)?;
            writeln!(f, "  direction    = {}", misc.dir)?;
            writeln!(f, "  dst tos      = {}", misc.dst_tos)?;
            writeln!(f, "  biFlow dir   = {}", misc.bi_flow_dir)?;
            writeln!(f, "  end reason   = {}", misc.flow_end_reason)
        }
        Extension::CntFlow(cnt) => {
            writeln!(f, "  out packets  = {}", cnt.out_packets)?;
            writeln!(f, "  out bytes    = {}", cnt.out_bytes)?;
            writeln!(f, "  aggr flows   = {}", cnt.flows)
        }
        Extension::Vlan(U32Pair { first, second }) => {
            writeln!(f, "  src vlan     = {}", first)?;
            writeln!(f, "  dst vlan     = {}", second)
        }
        Extension::AsRouting(U32Pair { first, second }) => {
            writeln!(f, "  src as       = {}", first)?;
            writeln!(f, "  dst as       = {}", second)
        }
        Extension::AsAdjacent(U32Pair { first, second }) => {
            writeln!(f, "  next as      = {}", first)?;
            writeln!(f, "  prev as      = {}", second)
        }
        Extension::BgpNextHopV4(addr) => writeln!(f, "  bgp next hop = {}", addr),
        Extension::BgpNextHopV6(addr) => writeln!(f, "  bgp next hop = {}", addr),
        Extension::IpNextHopV4(addr) => writeln!(f, "  ip next hop  = {}", addr),
        Extension::IpNextHopV6(addr) => writeln!(f, "  ip next hop  = {}", addr),
        Extension::IpReceivedV4(addr) => writeln!(f, "  ip exporter  = {}", addr),
        Extension::IpReceivedV6(addr) => writeln!(f, "  ip exporter  = {}", addr),
        Extension::MplsLabel(mpls) => {
            for (i, label) in mpls.labels.iter().enumerate() {
                writeln!(
                    f,
                    "  MPLS Lbl {:<3} = {}-{}-{}",
                    i + 1,
                    label >> 4,
                    (label & 0xF) >> 1,
                    label & 1
                )?;
            }
            Ok(())
        }
        Extension::MacAddr(MacAddr {
            in_src_mac,
            out_dst_mac,
            in_dst_mac,
            out_src_mac,
        }) => {
            writeln!(f, "  in src mac   = {}", format_mac(*in_src_mac))?;
            writeln!(f, "  out dst mac  = {}", format_mac(*out_dst_mac))?;
            writeln!(f, "  in dst mac   = {}", format_mac(*in_dst_mac))?;
            writeln!(f, "  out src mac  = {}", format_mac(*out_src_mac))
        }
        Extension::Latency(latency) => {
            writeln!(
                f,
                "  cli latency  = {} us",
                latency.usec_client_nw_delay
            )?;
            writeln!(
                f,
                "  srv latency  = {} us",
                latency.usec_server_nw_delay
            )?;
            writeln!(f, "  app latency  = {} us", latency.usec_appl_latency)
        }
        Extension::InPayload(payload) => writeln!(f, "  in payload   = {} bytes", payload.len()),
        Extension::OutPayload(payload) => writeln!(f, "  out payload  = {} bytes", payload.len()),
        Extension::TunIpv4(tun) => {
            writeln!(f, "  tun proto    = {}", tun.proto)?;
            writeln!(f, "  tun src addr = {}", tun.src_addr)?;
            writeln!(f, "  tun dst addr = {}", tun.dst_addr)
        }
        Extension::TunIpv6(tun) => {
            writeln!(f, "  tun proto    = {}", tun.proto)?;
            writeln!(f, "  tun src addr = {}", tun.src_addr)?;
            writeln!(f, "  tun dst addr = {}", tun.dst_addr)
        }
        Extension::Unrecognized { id, payload } => {
            writeln!(f, "  [{}] unknown extension, {} bytes", id, payload.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowrec_common::extension::Ipv4Flow;
    use flowrec_common::{GenericFlow, RecordHeader, RecordWriter};
    use std::net::Ipv4Addr;

    fn record(extensions: &[Extension]) -> Vec<u8> {
        let header = RecordHeader {
            nfversion: 0x41,
            flags: 0x02,
            ..RecordHeader::v3()
        };
        record_with(header, extensions)
    }

    fn record_with(header: RecordHeader, extensions: &[Extension]) -> Vec<u8> {
        let mut buf = vec![0u8; 256];
        let mut writer = RecordWriter::new(&mut buf, header).unwrap();
        for ext in extensions {
            writer.push(ext).unwrap();
        }
        let size = writer.finish().unwrap();
        buf.truncate(size);
        buf
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00.000");
        assert_eq!(format_timestamp(1_700_000_000_123), "2023-11-14 22:13:20.123");
        assert_eq!(format_timestamp(u64::MAX), "-");
    }

    #[test]
    fn test_render_header_and_extensions() {
        let bytes = record(&[
            Extension::GenericFlow(GenericFlow {
                proto: 17,
                src_port: 5353,
                dst_port: 53,
                in_packets: 2,
                in_bytes: 140,
                ..Default::default()
            }),
            Extension::Ipv4Flow(Ipv4Flow {
                src_addr: Ipv4Addr::new(10, 0, 0, 1),
                dst_addr: Ipv4Addr::new(10, 0, 0, 2),
            }),
            Extension::IpReceivedV4(Ipv4Addr::new(192, 0, 2, 9)),
        ]);

        let text = render_record(&bytes).unwrap();
        assert!(text.contains("PCAP v1, Sampled"));
        assert!(text.contains("Elements     = 3: 1 2 12\n"));
        assert!(text.contains("src port     = 5353"));
        assert!(text.contains("dst addr     = 10.0.0.2"));
        assert!(text.contains("ip exporter  = 192.0.2.9"));
    }

    #[test]
    fn test_event_and_legacy_records_have_no_version() {
        let flow = [Extension::GenericFlow(GenericFlow::default())];
        let event = RecordHeader {
            nfversion: 0x09,
            flags: 0x01,
            ..RecordHeader::v3()
        };

        let text = render_record(&record_with(event, &flow)).unwrap();
        assert!(text.contains("0x01 EVENT, Unsampled"));

        let text = render_record(&record_with(RecordHeader::v3(), &flow)).unwrap();
        assert!(text.contains("0x00 FLOW, Unsampled"));
        assert!(text.contains("Elements     = 1: 1\n"));
    }

    #[test]
    fn test_render_icmp_type_and_code() {
        let bytes = record(&[Extension::GenericFlow(GenericFlow {
            proto: 1,
            dst_port: 0x0803,
            ..Default::default()
        })]);

        let text = render_record(&bytes).unwrap();
        assert!(text.contains("ICMP         = 8.3"));
        assert!(!text.contains("src port"));
    }

    #[test]
    fn test_mac_format() {
        assert_eq!(format_mac(0x0000_0011_2233_4455), "00:11:22:33:44:55");
    }
}
