//! Extensible V3 flow record format
//!
//! A record is a [`RecordHeader`] followed by a chain of typed, variable-length
//! extension elements. This crate holds everything needed to read and write that
//! format:
//! - `catalog`: extension type ids and their fixed payload sizes
//! - `decoder`: element chain walking and the per-record extension index
//! - `extension`: typed payload layouts
//! - `record`: building records with recomputed headers
//! - `pcapd`: header of pcapd export packets that carry V3 records
//!
//! All reads and writes go through the bounds-checked cursors in `cursor`.

pub mod catalog;
pub mod cursor;
pub mod decoder;
pub mod error;
pub mod extension;
pub mod header;
pub mod pcapd;
pub mod record;

pub use catalog::{ExtensionType, PayloadSize, MAX_ELEMENTS};
pub use cursor::{ByteCursor, ByteWriter};
pub use decoder::{build_index, decode_record, DecodedRecord, ElementSpan, ExtensionIndex};
pub use error::{DecodeError, EncodeError};
pub use extension::{Extension, GenericFlow, Layout};
pub use header::{ElementHeader, ExportFlavor, RecordHeader, V3_RECORD_TYPE};
pub use pcapd::{PcapdHeader, PcapdPacketBuilder, PCAPD_VERSION};
pub use record::RecordWriter;

/// IP protocol constants
pub mod protocol {
    pub const ICMP: u8 = 1;
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
    pub const ICMPV6: u8 = 58;
}

// Typed layouts must agree with the catalog
const _: () = {
    use extension::*;

    assert!(
        ExtensionType::GenericFlow.fixed_size() == GenericFlow::SIZE,
        "GenericFlow layout must match the catalog"
    );
    assert!(ExtensionType::Ipv4Flow.fixed_size() == Ipv4Flow::SIZE);
    assert!(ExtensionType::Ipv6Flow.fixed_size() == Ipv6Flow::SIZE);
    assert!(ExtensionType::FlowMisc.fixed_size() == FlowMisc::SIZE);
    assert!(ExtensionType::CntFlow.fixed_size() == CntFlow::SIZE);
    assert!(ExtensionType::Vlan.fixed_size() == U32Pair::SIZE);
    assert!(ExtensionType::AsRouting.fixed_size() == U32Pair::SIZE);
    assert!(ExtensionType::AsAdjacent.fixed_size() == U32Pair::SIZE);
    assert!(ExtensionType::BgpNextHopV4.fixed_size() == <std::net::Ipv4Addr as Layout>::SIZE);
    assert!(ExtensionType::BgpNextHopV6.fixed_size() == <std::net::Ipv6Addr as Layout>::SIZE);
    assert!(ExtensionType::IpReceivedV4.fixed_size() == <std::net::Ipv4Addr as Layout>::SIZE);
    assert!(ExtensionType::IpReceivedV6.fixed_size() == <std::net::Ipv6Addr as Layout>::SIZE);
    assert!(ExtensionType::MplsLabel.fixed_size() == MplsLabel::SIZE);
    assert!(ExtensionType::MacAddr.fixed_size() == MacAddr::SIZE);
    assert!(ExtensionType::Latency.fixed_size() == Latency::SIZE);
    assert!(ExtensionType::TunIpv4.fixed_size() == TunnelV4::SIZE);
    assert!(ExtensionType::TunIpv6.fixed_size() == TunnelV6::SIZE);
};
