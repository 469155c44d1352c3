//! Extension catalog
//!
//! Maps extension type ids to their fixed payload layout. Type ids are part of the
//! stored format and must never be renumbered. Ids without an entry stay representable
//! as [`ExtensionType::Unrecognized`] since newer exporters may send them.

use crate::header::ElementHeader;

/// Number of type slots in an extension index
pub const MAX_ELEMENTS: usize = 33;

/// Payload size of a recognized extension
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadSize {
    Fixed(usize),
    /// Payload length is given by the element header alone
    Variable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExtensionType {
    GenericFlow,
    Ipv4Flow,
    Ipv6Flow,
    FlowMisc,
    CntFlow,
    Vlan,
    AsRouting,
    BgpNextHopV4,
    BgpNextHopV6,
    IpNextHopV4,
    IpNextHopV6,
    IpReceivedV4,
    IpReceivedV6,
    MplsLabel,
    MacAddr,
    AsAdjacent,
    Latency,
    InPayload,
    OutPayload,
    TunIpv4,
    TunIpv6,
    Unrecognized(u16),
}

impl ExtensionType {
    /// All recognized types in id order
    pub const RECOGNIZED: [ExtensionType; 21] = [
        ExtensionType::GenericFlow,
        ExtensionType::Ipv4Flow,
        ExtensionType::Ipv6Flow,
        ExtensionType::FlowMisc,
        ExtensionType::CntFlow,
        ExtensionType::Vlan,
        ExtensionType::AsRouting,
        ExtensionType::BgpNextHopV4,
        ExtensionType::BgpNextHopV6,
        ExtensionType::IpNextHopV4,
        ExtensionType::IpNextHopV6,
        ExtensionType::IpReceivedV4,
        ExtensionType::IpReceivedV6,
        ExtensionType::MplsLabel,
        ExtensionType::MacAddr,
        ExtensionType::AsAdjacent,
        ExtensionType::Latency,
        ExtensionType::InPayload,
        ExtensionType::OutPayload,
        ExtensionType::TunIpv4,
        ExtensionType::TunIpv6,
    ];

    pub const fn from_id(id: u16) -> Self {
        match id {
            1 => ExtensionType::GenericFlow,
            2 => ExtensionType::Ipv4Flow,
            3 => ExtensionType::Ipv6Flow,
            4 => ExtensionType::FlowMisc,
            5 => ExtensionType::CntFlow,
            6 => ExtensionType::Vlan,
            7 => ExtensionType::AsRouting,
            8 => ExtensionType::BgpNextHopV4,
            9 => ExtensionType::BgpNextHopV6,
            10 => ExtensionType::IpNextHopV4,
            11 => ExtensionType::IpNextHopV6,
            12 => ExtensionType::IpReceivedV4,
            13 => ExtensionType::IpReceivedV6,
            14 => ExtensionType::MplsLabel,
            15 => ExtensionType::MacAddr,
            16 => ExtensionType::AsAdjacent,
            17 => ExtensionType::Latency,
            29 => ExtensionType::InPayload,
            30 => ExtensionType::OutPayload,
            31 => ExtensionType::TunIpv4,
            32 => ExtensionType::TunIpv6,
            other => ExtensionType::Unrecognized(other),
        }
    }

    pub const fn id(self) -> u16 {
        match self {
            ExtensionType::GenericFlow => 1,
            ExtensionType::Ipv4Flow => 2,
            ExtensionType::Ipv6Flow => 3,
            ExtensionType::FlowMisc => 4,
            ExtensionType::CntFlow => 5,
            ExtensionType::Vlan => 6,
            ExtensionType::AsRouting => 7,
            ExtensionType::BgpNextHopV4 => 8,
            ExtensionType::BgpNextHopV6 => 9,
            ExtensionType::IpNextHopV4 => 10,
            ExtensionType::IpNextHopV6 => 11,
            ExtensionType::IpReceivedV4 => 12,
            ExtensionType::IpReceivedV6 => 13,
            ExtensionType::MplsLabel => 14,
            ExtensionType::MacAddr => 15,
            ExtensionType::AsAdjacent => 16,
            ExtensionType::Latency => 17,
            ExtensionType::InPayload => 29,
            ExtensionType::OutPayload => 30,
            ExtensionType::TunIpv4 => 31,
            ExtensionType::TunIpv6 => 32,
            ExtensionType::Unrecognized(id) => id,
        }
    }

    /// Payload size, or `None` for unrecognized types
    pub const fn payload_size(self) -> Option<PayloadSize> {
        let size = match self {
            ExtensionType::GenericFlow => 48,
            ExtensionType::Ipv4Flow => 8,
            ExtensionType::Ipv6Flow => 32,
            ExtensionType::FlowMisc => 16,
            ExtensionType::CntFlow => 24,
            ExtensionType::Vlan => 8,
            ExtensionType::AsRouting => 8,
            ExtensionType::BgpNextHopV4 => 4,
            ExtensionType::BgpNextHopV6 => 16,
            ExtensionType::IpNextHopV4 => 4,
            ExtensionType::IpNextHopV6 => 16,
            ExtensionType::IpReceivedV4 => 4,
            ExtensionType::IpReceivedV6 => 16,
            ExtensionType::MplsLabel => 40,
            ExtensionType::MacAddr => 32,
            ExtensionType::AsAdjacent => 8,
            ExtensionType::Latency => 24,
            ExtensionType::TunIpv4 => 12,
            ExtensionType::TunIpv6 => 40,
            ExtensionType::InPayload | ExtensionType::OutPayload => {
                return Some(PayloadSize::Variable)
            }
            ExtensionType::Unrecognized(_) => return None,
        };
        Some(PayloadSize::Fixed(size))
    }

    pub const fn is_recognized(self) -> bool {
        !matches!(self, ExtensionType::Unrecognized(_))
    }

    /// Fixed payload size, 0 for variable or unrecognized types
    pub const fn fixed_size(self) -> usize {
        match self.payload_size() {
            Some(PayloadSize::Fixed(size)) => size,
            _ => 0,
        }
    }

    /// Size of a fixed-layout element including its element header
    pub const fn element_size(self) -> Option<usize> {
        match self.payload_size() {
            Some(PayloadSize::Fixed(size)) => Some(size + ElementHeader::SIZE),
            _ => None,
        }
    }

    /// Slot of this type in an extension index, if it has one
    pub const fn slot(self) -> Option<usize> {
        let id = self.id() as usize;
        if id < MAX_ELEMENTS {
            Some(id)
        } else {
            None
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ExtensionType::GenericFlow => "genericFlow",
            ExtensionType::Ipv4Flow => "ipv4Flow",
            ExtensionType::Ipv6Flow => "ipv6Flow",
            ExtensionType::FlowMisc => "flowMisc",
            ExtensionType::CntFlow => "cntFlow",
            ExtensionType::Vlan => "vLan",
            ExtensionType::AsRouting => "asRouting",
            ExtensionType::BgpNextHopV4 => "bgpNextHopV4",
            ExtensionType::BgpNextHopV6 => "bgpNextHopV6",
            ExtensionType::IpNextHopV4 => "ipNextHopV4",
            ExtensionType::IpNextHopV6 => "ipNextHopV6",
            ExtensionType::IpReceivedV4 => "ipReceivedV4",
            ExtensionType::IpReceivedV6 => "ipReceivedV6",
            ExtensionType::MplsLabel => "mplsLabel",
            ExtensionType::MacAddr => "macAddr",
            ExtensionType::AsAdjacent => "asAdjacent",
            ExtensionType::Latency => "latency",
            ExtensionType::InPayload => "inPayload",
            ExtensionType::OutPayload => "outPayload",
            ExtensionType::TunIpv4 => "tunIPv4",
            ExtensionType::TunIpv6 => "tunIPv6",
            ExtensionType::Unrecognized(_) => "unrecognized",
        }
    }
}

impl std::fmt::Display for ExtensionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtensionType::Unrecognized(id) => write!(f, "unrecognized({})", id),
            known => write!(f, "{}", known.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_round_trip_for_all_recognized() {
        for ty in ExtensionType::RECOGNIZED {
            assert_eq!(ExtensionType::from_id(ty.id()), ty);
            assert!(ty.is_recognized());
            assert!(ty.slot().is_some());
        }
    }

    #[test]
    fn test_unknown_ids_are_representable() {
        assert_eq!(ExtensionType::from_id(0), ExtensionType::Unrecognized(0));
        assert_eq!(ExtensionType::from_id(18), ExtensionType::Unrecognized(18));
        assert_eq!(ExtensionType::from_id(500).payload_size(), None);
        assert_eq!(ExtensionType::from_id(500).slot(), None);
        assert!(!ExtensionType::from_id(18).is_recognized());
    }

    #[test]
    fn test_received_ip_element_sizes() {
        assert_eq!(ExtensionType::IpReceivedV4.element_size(), Some(8));
        assert_eq!(ExtensionType::IpReceivedV6.element_size(), Some(20));
        assert_eq!(
            ExtensionType::InPayload.payload_size(),
            Some(PayloadSize::Variable)
        );
        assert_eq!(ExtensionType::InPayload.element_size(), None);
    }
}
