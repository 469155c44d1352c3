//! Registry of exporters that sent data to this process
//!
//! An exporter is identified by the pcapd version it speaks together with the address
//! family and address it sends from. The first packet from a new identity creates an
//! entry and persists a summary of it through [`ExporterPersistence`].

use flowrec_common::{ByteCursor, ByteWriter, DecodeError, EncodeError};
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::info;

/// Address family of an exporter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Inet,
    Inet6,
}

impl AddressFamily {
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::Inet,
            IpAddr::V6(_) => AddressFamily::Inet6,
        }
    }

    /// Socket address family number stored in exporter records
    pub const fn sa_family(self) -> u16 {
        match self {
            AddressFamily::Inet => 2,
            AddressFamily::Inet6 => 10,
        }
    }

    pub fn from_sa_family(family: u16) -> Option<Self> {
        match family {
            2 => Some(AddressFamily::Inet),
            10 => Some(AddressFamily::Inet6),
            _ => None,
        }
    }
}

/// Identity of an exporter.
///
/// The address is kept as two 64 bit words; an IPv4 address occupies the low 32 bits
/// of the second word. The family is part of the key, so `1.2.3.4` and `::1.2.3.4`
/// are different exporters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExporterKey {
    pub version: u16,
    pub family: AddressFamily,
    pub addr: [u64; 2],
}

impl ExporterKey {
    pub fn new(version: u16, source: IpAddr) -> Self {
        let addr = match source {
            IpAddr::V4(v4) => [0, u64::from(u32::from(v4))],
            IpAddr::V6(v6) => {
                let bits = u128::from(v6);
                [(bits >> 64) as u64, bits as u64]
            }
        };
        Self {
            version,
            family: AddressFamily::of(&source),
            addr,
        }
    }

    /// Address the key was built from
    pub fn ip(&self) -> IpAddr {
        match self.family {
            AddressFamily::Inet => IpAddr::V4(Ipv4Addr::from(self.addr[1] as u32)),
            AddressFamily::Inet6 => {
                let bits = (u128::from(self.addr[0]) << 64) | u128::from(self.addr[1]);
                IpAddr::V6(Ipv6Addr::from(bits))
            }
        }
    }
}

/// Persisted summary of an exporter.
///
/// Stored as a 32 byte little-endian record of type 7; the address is 16 octets in
/// network order with an IPv4 address in the last four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExporterInfo {
    pub version: u32,
    pub ip: IpAddr,
    pub family: AddressFamily,
    pub sysid: u16,
    pub id: u32,
}

impl ExporterInfo {
    pub const RECORD_TYPE: u16 = 7;
    pub const SIZE: usize = 32;

    pub fn for_key(key: &ExporterKey) -> Self {
        Self {
            version: u32::from(key.version),
            ip: key.ip(),
            family: key.family,
            sysid: 0,
            id: 0,
        }
    }

    pub fn write(&self, writer: &mut ByteWriter<'_>) -> Result<(), EncodeError> {
        writer.put_u16_le(Self::RECORD_TYPE)?;
        writer.put_u16_le(Self::SIZE as u16)?;
        writer.put_u32_le(self.version)?;
        match self.ip {
            IpAddr::V4(v4) => {
                writer.put_zeros(12)?;
                writer.put_ipv4(v4)?;
            }
            IpAddr::V6(v6) => writer.put_ipv6(v6)?,
        }
        writer.put_u16_le(self.family.sa_family())?;
        writer.put_u16_le(self.sysid)?;
        writer.put_u32_le(self.id)
    }

    pub fn parse(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = ByteCursor::new(buf);
        let record_type = cursor.read_u16_le()?;
        let size = cursor.read_u16_le()?;
        if record_type != Self::RECORD_TYPE || usize::from(size) != Self::SIZE {
            return Err(DecodeError::PayloadSize {
                ext_type: record_type,
                expected: Self::SIZE,
                actual: usize::from(size),
            });
        }

        let version = cursor.read_u32_le()?;
        let octets = cursor.read_ipv6()?;
        let raw_family = cursor.read_u16_le()?;
        let family = AddressFamily::from_sa_family(raw_family).ok_or(DecodeError::PayloadSize {
            ext_type: record_type,
            expected: Self::SIZE,
            actual: usize::from(size),
        })?;
        let ip = match family {
            AddressFamily::Inet => {
                let o = octets.octets();
                IpAddr::V4(Ipv4Addr::new(o[12], o[13], o[14], o[15]))
            }
            AddressFamily::Inet6 => IpAddr::V6(octets),
        };

        Ok(Self {
            version,
            ip,
            family,
            sysid: cursor.read_u16_le()?,
            id: cursor.read_u32_le()?,
        })
    }
}

/// Sink for exporter summaries
pub trait ExporterPersistence {
    /// Persist the summary of a newly seen exporter and return the system id assigned
    /// to it. Called exactly once per exporter.
    fn flush_exporter_info(&mut self, info: &ExporterInfo) -> u16;
}

/// Keeps exporter summaries in memory and hands out system ids from 1 upwards
#[derive(Debug, Default)]
pub struct ExporterStore {
    records: Vec<ExporterInfo>,
}

impl ExporterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Summaries in the order they were flushed
    pub fn records(&self) -> &[ExporterInfo] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ExporterPersistence for ExporterStore {
    fn flush_exporter_info(&mut self, info: &ExporterInfo) -> u16 {
        let sysid = u16::try_from(self.records.len() + 1).unwrap_or(u16::MAX);
        self.records.push(ExporterInfo { sysid, ..*info });
        sysid
    }
}

/// State of one exporter
#[derive(Debug, Clone)]
pub struct Exporter {
    key: ExporterKey,
    pub info: ExporterInfo,
    /// Packets accepted from this exporter
    pub packets: u64,
    /// Records forwarded to the output
    pub flows: u64,
    pub sequence_failure: u32,
    pub padding_errors: u32,
}

impl Exporter {
    fn new(key: ExporterKey) -> Self {
        Self {
            key,
            info: ExporterInfo::for_key(&key),
            packets: 0,
            flows: 0,
            sequence_failure: 0,
            padding_errors: 0,
        }
    }

    pub fn key(&self) -> &ExporterKey {
        &self.key
    }

    pub fn snapshot(&self) -> ExporterStats {
        ExporterStats {
            address: self.info.ip,
            family: self.info.family,
            version: self.key.version,
            sysid: self.info.sysid,
            packets: self.packets,
            flows: self.flows,
            sequence_failure: self.sequence_failure,
            padding_errors: self.padding_errors,
        }
    }
}

/// Serializable view of an exporter's counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExporterStats {
    pub address: IpAddr,
    pub family: AddressFamily,
    pub version: u16,
    pub sysid: u16,
    pub packets: u64,
    pub flows: u64,
    pub sequence_failure: u32,
    pub padding_errors: u32,
}

/// Exporters seen by one ingest source, in creation order
#[derive(Debug, Default)]
pub struct ExporterRegistry {
    exporters: Vec<Exporter>,
}

impl ExporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the exporter for `key`, creating and persisting it on first sight.
    ///
    /// Returns the exporter and whether it was just created.
    pub fn lookup_or_create<P>(
        &mut self,
        key: ExporterKey,
        persistence: &mut P,
    ) -> (&mut Exporter, bool)
    where
        P: ExporterPersistence + ?Sized,
    {
        if let Some(pos) = self.exporters.iter().position(|e| e.key == key) {
            return (&mut self.exporters[pos], false);
        }

        let mut exporter = Exporter::new(key);
        exporter.info.sysid = persistence.flush_exporter_info(&exporter.info);
        info!(
            "New exporter: SysID: {}, version: {}, IP: {}",
            exporter.info.sysid,
            key.version,
            key.ip()
        );

        let pos = self.exporters.len();
        self.exporters.push(exporter);
        (&mut self.exporters[pos], true)
    }

    pub fn get(&self, key: &ExporterKey) -> Option<&Exporter> {
        self.exporters.iter().find(|e| e.key == *key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Exporter> {
        self.exporters.iter()
    }

    pub fn len(&self) -> usize {
        self.exporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exporters.is_empty()
    }

    pub fn snapshot(&self) -> Vec<ExporterStats> {
        self.exporters.iter().map(Exporter::snapshot).collect()
    }
}
