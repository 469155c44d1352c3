//! Typed views of extension payloads
//!
//! Integer fields are little-endian, address fields are in network byte order.

use crate::catalog::ExtensionType;
use crate::cursor::{ByteCursor, ByteWriter};
use crate::error::{DecodeError, EncodeError};
use crate::header::ElementHeader;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Fixed-size payload layout
pub trait Layout: Sized {
    const SIZE: usize;

    fn read(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError>;

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), EncodeError>;

    /// Decode from a payload slice. Trailing bytes beyond the layout are ignored.
    fn decode(ext_type: ExtensionType, payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < Self::SIZE {
            return Err(DecodeError::PayloadSize {
                ext_type: ext_type.id(),
                expected: Self::SIZE,
                actual: payload.len(),
            });
        }
        Self::read(&mut ByteCursor::new(payload))
    }
}

impl Layout for Ipv4Addr {
    const SIZE: usize = 4;

    fn read(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        cursor.read_ipv4()
    }

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), EncodeError> {
        writer.put_ipv4(*self)
    }
}

impl Layout for Ipv6Addr {
    const SIZE: usize = 16;

    fn read(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        cursor.read_ipv6()
    }

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), EncodeError> {
        writer.put_ipv6(*self)
    }
}

/// Timing, counters, ports and protocol of a flow
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GenericFlow {
    pub msec_first: u64,
    pub msec_last: u64,
    pub msec_received: u64,
    pub in_packets: u64,
    pub in_bytes: u64,
    pub src_port: u16,
    /// For ICMP this carries type (high byte) and code (low byte)
    pub dst_port: u16,
    pub proto: u8,
    pub tcp_flags: u8,
    pub fwd_status: u8,
    pub src_tos: u8,
}

impl GenericFlow {
    pub fn icmp_type(&self) -> u8 {
        (self.dst_port >> 8) as u8
    }

    pub fn icmp_code(&self) -> u8 {
        (self.dst_port & 0xFF) as u8
    }
}

impl Layout for GenericFlow {
    const SIZE: usize = 48;

    fn read(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            msec_first: cursor.read_u64_le()?,
            msec_last: cursor.read_u64_le()?,
            msec_received: cursor.read_u64_le()?,
            in_packets: cursor.read_u64_le()?,
            in_bytes: cursor.read_u64_le()?,
            src_port: cursor.read_u16_le()?,
            dst_port: cursor.read_u16_le()?,
            proto: cursor.read_u8()?,
            tcp_flags: cursor.read_u8()?,
            fwd_status: cursor.read_u8()?,
            src_tos: cursor.read_u8()?,
        })
    }

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), EncodeError> {
        writer.put_u64_le(self.msec_first)?;
        writer.put_u64_le(self.msec_last)?;
        writer.put_u64_le(self.msec_received)?;
        writer.put_u64_le(self.in_packets)?;
        writer.put_u64_le(self.in_bytes)?;
        writer.put_u16_le(self.src_port)?;
        writer.put_u16_le(self.dst_port)?;
        writer.put_u8(self.proto)?;
        writer.put_u8(self.tcp_flags)?;
        writer.put_u8(self.fwd_status)?;
        writer.put_u8(self.src_tos)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv4Flow {
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
}

impl Layout for Ipv4Flow {
    const SIZE: usize = 8;

    fn read(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            src_addr: cursor.read_ipv4()?,
            dst_addr: cursor.read_ipv4()?,
        })
    }

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), EncodeError> {
        writer.put_ipv4(self.src_addr)?;
        writer.put_ipv4(self.dst_addr)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv6Flow {
    pub src_addr: Ipv6Addr,
    pub dst_addr: Ipv6Addr,
}

impl Layout for Ipv6Flow {
    const SIZE: usize = 32;

    fn read(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            src_addr: cursor.read_ipv6()?,
            dst_addr: cursor.read_ipv6()?,
        })
    }

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), EncodeError> {
        writer.put_ipv6(self.src_addr)?;
        writer.put_ipv6(self.dst_addr)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlowMisc {
    pub input: u32,
    pub output: u32,
    pub src_mask: u8,
    pub dst_mask: u8,
    pub dir: u8,
    pub dst_tos: u8,
    pub bi_flow_dir: u8,
    pub flow_end_reason: u8,
    pub rev_tcp_flags: u8,
}

impl Layout for FlowMisc {
    const SIZE: usize = 16;

    fn read(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        let misc = Self {
            input: cursor.read_u32_le()?,
            output: cursor.read_u32_le()?,
            src_mask: cursor.read_u8()?,
            dst_mask: cursor.read_u8()?,
            dir: cursor.read_u8()?,
            dst_tos: cursor.read_u8()?,
            bi_flow_dir: cursor.read_u8()?,
            flow_end_reason: cursor.read_u8()?,
            rev_tcp_flags: cursor.read_u8()?,
        };
        cursor.skip(1)?;
        Ok(misc)
    }

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), EncodeError> {
        writer.put_u32_le(self.input)?;
        writer.put_u32_le(self.output)?;
        writer.put_u8(self.src_mask)?;
        writer.put_u8(self.dst_mask)?;
        writer.put_u8(self.dir)?;
        writer.put_u8(self.dst_tos)?;
        writer.put_u8(self.bi_flow_dir)?;
        writer.put_u8(self.flow_end_reason)?;
        writer.put_u8(self.rev_tcp_flags)?;
        writer.put_zeros(1)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CntFlow {
    pub flows: u64,
    pub out_packets: u64,
    pub out_bytes: u64,
}

impl Layout for CntFlow {
    const SIZE: usize = 24;

    fn read(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            flows: cursor.read_u64_le()?,
            out_packets: cursor.read_u64_le()?,
            out_bytes: cursor.read_u64_le()?,
        })
    }

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), EncodeError> {
        writer.put_u64_le(self.flows)?;
        writer.put_u64_le(self.out_packets)?;
        writer.put_u64_le(self.out_bytes)
    }
}

/// Two u32 values, shared by VLAN, AS routing and adjacent AS layouts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct U32Pair {
    pub first: u32,
    pub second: u32,
}

impl Layout for U32Pair {
    const SIZE: usize = 8;

    fn read(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            first: cursor.read_u32_le()?,
            second: cursor.read_u32_le()?,
        })
    }

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), EncodeError> {
        writer.put_u32_le(self.first)?;
        writer.put_u32_le(self.second)
    }
}

pub const MPLS_LABELS: usize = 10;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MplsLabel {
    pub labels: [u32; MPLS_LABELS],
}

impl Layout for MplsLabel {
    const SIZE: usize = 40;

    fn read(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        let mut labels = [0u32; MPLS_LABELS];
        for label in labels.iter_mut() {
            *label = cursor.read_u32_le()?;
        }
        Ok(Self { labels })
    }

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), EncodeError> {
        self.labels
            .iter()
            .try_for_each(|label| writer.put_u32_le(*label))
    }
}

/// MAC addresses in the low 48 bits of each word
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MacAddr {
    pub in_src_mac: u64,
    pub out_dst_mac: u64,
    pub in_dst_mac: u64,
    pub out_src_mac: u64,
}

impl Layout for MacAddr {
    const SIZE: usize = 32;

    fn read(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            in_src_mac: cursor.read_u64_le()?,
            out_dst_mac: cursor.read_u64_le()?,
            in_dst_mac: cursor.read_u64_le()?,
            out_src_mac: cursor.read_u64_le()?,
        })
    }

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), EncodeError> {
        writer.put_u64_le(self.in_src_mac)?;
        writer.put_u64_le(self.out_dst_mac)?;
        writer.put_u64_le(self.in_dst_mac)?;
        writer.put_u64_le(self.out_src_mac)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Latency {
    pub usec_client_nw_delay: u64,
    pub usec_server_nw_delay: u64,
    pub usec_appl_latency: u64,
}

impl Layout for Latency {
    const SIZE: usize = 24;

    fn read(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            usec_client_nw_delay: cursor.read_u64_le()?,
            usec_server_nw_delay: cursor.read_u64_le()?,
            usec_appl_latency: cursor.read_u64_le()?,
        })
    }

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), EncodeError> {
        writer.put_u64_le(self.usec_client_nw_delay)?;
        writer.put_u64_le(self.usec_server_nw_delay)?;
        writer.put_u64_le(self.usec_appl_latency)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TunnelV4 {
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
    pub proto: u8,
}

impl Layout for TunnelV4 {
    const SIZE: usize = 12;

    fn read(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        let tunnel = Self {
            src_addr: cursor.read_ipv4()?,
            dst_addr: cursor.read_ipv4()?,
            proto: cursor.read_u8()?,
        };
        cursor.skip(3)?;
        Ok(tunnel)
    }

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), EncodeError> {
        writer.put_ipv4(self.src_addr)?;
        writer.put_ipv4(self.dst_addr)?;
        writer.put_u8(self.proto)?;
        writer.put_zeros(3)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TunnelV6 {
    pub src_addr: Ipv6Addr,
    pub dst_addr: Ipv6Addr,
    pub proto: u8,
}

impl Layout for TunnelV6 {
    const SIZE: usize = 40;

    fn read(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        let tunnel = Self {
            src_addr: cursor.read_ipv6()?,
            dst_addr: cursor.read_ipv6()?,
            proto: cursor.read_u8()?,
        };
        cursor.skip(7)?;
        Ok(tunnel)
    }

    fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), EncodeError> {
        writer.put_ipv6(self.src_addr)?;
        writer.put_ipv6(self.dst_addr)?;
        writer.put_u8(self.proto)?;
        writer.put_zeros(7)
    }
}

/// One decoded extension
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Extension {
    GenericFlow(GenericFlow),
    Ipv4Flow(Ipv4Flow),
    Ipv6Flow(Ipv6Flow),
    FlowMisc(FlowMisc),
    CntFlow(CntFlow),
    /// src / dst VLAN
    Vlan(U32Pair),
    /// src / dst AS
    AsRouting(U32Pair),
    BgpNextHopV4(Ipv4Addr),
    BgpNextHopV6(Ipv6Addr),
    IpNextHopV4(Ipv4Addr),
    IpNextHopV6(Ipv6Addr),
    IpReceivedV4(Ipv4Addr),
    IpReceivedV6(Ipv6Addr),
    MplsLabel(MplsLabel),
    MacAddr(MacAddr),
    /// next / previous adjacent AS
    AsAdjacent(U32Pair),
    Latency(Latency),
    InPayload(Vec<u8>),
    OutPayload(Vec<u8>),
    TunIpv4(TunnelV4),
    TunIpv6(TunnelV6),
    Unrecognized { id: u16, payload: Vec<u8> },
}

impl Extension {
    /// Received-IP extension for an exporter address, v4 or v6 by address family
    pub fn received(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => Extension::IpReceivedV4(v4),
            IpAddr::V6(v6) => Extension::IpReceivedV6(v6),
        }
    }

    pub fn decode(ext_type: ExtensionType, payload: &[u8]) -> Result<Self, DecodeError> {
        let ext = match ext_type {
            ExtensionType::GenericFlow => {
                Extension::GenericFlow(Layout::decode(ext_type, payload)?)
            }
            ExtensionType::Ipv4Flow => Extension::Ipv4Flow(Layout::decode(ext_type, payload)?),
            ExtensionType::Ipv6Flow => Extension::Ipv6Flow(Layout::decode(ext_type, payload)?),
            ExtensionType::FlowMisc => Extension::FlowMisc(Layout::decode(ext_type, payload)?),
            ExtensionType::CntFlow => Extension::CntFlow(Layout::decode(ext_type, payload)?),
            ExtensionType::Vlan => Extension::Vlan(Layout::decode(ext_type, payload)?),
            ExtensionType::AsRouting => Extension::AsRouting(Layout::decode(ext_type, payload)?),
            ExtensionType::BgpNextHopV4 => {
                Extension::BgpNextHopV4(Layout::decode(ext_type, payload)?)
            }
            ExtensionType::BgpNextHopV6 => {
                Extension::BgpNextHopV6(Layout::decode(ext_type, payload)?)
            }
            ExtensionType::IpNextHopV4 => {
                Extension::IpNextHopV4(Layout::decode(ext_type, payload)?)
            }
            ExtensionType::IpNextHopV6 => {
                Extension::IpNextHopV6(Layout::decode(ext_type, payload)?)
            }
            ExtensionType::IpReceivedV4 => {
                Extension::IpReceivedV4(Layout::decode(ext_type, payload)?)
            }
            ExtensionType::IpReceivedV6 => {
                Extension::IpReceivedV6(Layout::decode(ext_type, payload)?)
            }
            ExtensionType::MplsLabel => Extension::MplsLabel(Layout::decode(ext_type, payload)?),
            ExtensionType::MacAddr => Extension::MacAddr(Layout::decode(ext_type, payload)?),
            ExtensionType::AsAdjacent => {
                Extension::AsAdjacent(Layout::decode(ext_type, payload)?)
            }
            ExtensionType::Latency => Extension::Latency(Layout::decode(ext_type, payload)?),
            ExtensionType::InPayload => Extension::InPayload(payload.to_vec()),
            ExtensionType::OutPayload => Extension::OutPayload(payload.to_vec()),
            ExtensionType::TunIpv4 => Extension::TunIpv4(Layout::decode(ext_type, payload)?),
            ExtensionType::TunIpv6 => Extension::TunIpv6(Layout::decode(ext_type, payload)?),
            ExtensionType::Unrecognized(id) => Extension::Unrecognized {
                id,
                payload: payload.to_vec(),
            },
        };
        Ok(ext)
    }

    pub fn ext_type(&self) -> ExtensionType {
        match self {
            Extension::GenericFlow(_) => ExtensionType::GenericFlow,
            Extension::Ipv4Flow(_) => ExtensionType::Ipv4Flow,
            Extension::Ipv6Flow(_) => ExtensionType::Ipv6Flow,
            Extension::FlowMisc(_) => ExtensionType::FlowMisc,
            Extension::CntFlow(_) => ExtensionType::CntFlow,
            Extension::Vlan(_) => ExtensionType::Vlan,
            Extension::AsRouting(_) => ExtensionType::AsRouting,
            Extension::BgpNextHopV4(_) => ExtensionType::BgpNextHopV4,
            Extension::BgpNextHopV6(_) => ExtensionType::BgpNextHopV6,
            Extension::IpNextHopV4(_) => ExtensionType::IpNextHopV4,
            Extension::IpNextHopV6(_) => ExtensionType::IpNextHopV6,
            Extension::IpReceivedV4(_) => ExtensionType::IpReceivedV4,
            Extension::IpReceivedV6(_) => ExtensionType::IpReceivedV6,
            Extension::MplsLabel(_) => ExtensionType::MplsLabel,
            Extension::MacAddr(_) => ExtensionType::MacAddr,
            Extension::AsAdjacent(_) => ExtensionType::AsAdjacent,
            Extension::Latency(_) => ExtensionType::Latency,
            Extension::InPayload(_) => ExtensionType::InPayload,
            Extension::OutPayload(_) => ExtensionType::OutPayload,
            Extension::TunIpv4(_) => ExtensionType::TunIpv4,
            Extension::TunIpv6(_) => ExtensionType::TunIpv6,
            Extension::Unrecognized { id, .. } => ExtensionType::Unrecognized(*id),
        }
    }

    pub fn payload_len(&self) -> usize {
        match self {
            Extension::InPayload(bytes) | Extension::OutPayload(bytes) => bytes.len(),
            Extension::Unrecognized { payload, .. } => payload.len(),
            fixed => fixed.ext_type().fixed_size(),
        }
    }

    /// Encoded size including the element header
    pub fn element_len(&self) -> usize {
        self.payload_len() + ElementHeader::SIZE
    }

    /// Write element header and payload
    pub fn write_element(&self, writer: &mut ByteWriter<'_>) -> Result<(), EncodeError> {
        let length = u16::try_from(self.element_len()).map_err(|_| EncodeError::RecordTooLarge {
            size: self.element_len(),
        })?;
        if self.element_len() > writer.remaining() {
            return Err(EncodeError::BufferTooSmall {
                needed: self.element_len(),
                available: writer.remaining(),
            });
        }
        ElementHeader {
            ext_type: self.ext_type().id(),
            length,
        }
        .write(writer)?;

        match self {
            Extension::GenericFlow(v) => v.write(writer),
            Extension::Ipv4Flow(v) => v.write(writer),
            Extension::Ipv6Flow(v) => v.write(writer),
            Extension::FlowMisc(v) => v.write(writer),
            Extension::CntFlow(v) => v.write(writer),
            Extension::Vlan(v) | Extension::AsRouting(v) | Extension::AsAdjacent(v) => {
                v.write(writer)
            }
            Extension::BgpNextHopV4(v) | Extension::IpNextHopV4(v) | Extension::IpReceivedV4(v) => {
                v.write(writer)
            }
            Extension::BgpNextHopV6(v) | Extension::IpNextHopV6(v) | Extension::IpReceivedV6(v) => {
                v.write(writer)
            }
            Extension::MplsLabel(v) => v.write(writer),
            Extension::MacAddr(v) => v.write(writer),
            Extension::Latency(v) => v.write(writer),
            Extension::InPayload(bytes) | Extension::OutPayload(bytes) => writer.put_slice(bytes),
            Extension::Unrecognized { payload, .. } => writer.put_slice(payload),
            Extension::TunIpv4(v) => v.write(writer),
            Extension::TunIpv6(v) => v.write(writer),
        }
    }
}
