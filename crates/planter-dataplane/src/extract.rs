//! Runtime feature extraction
//!
//! Parses the L3/L4 fields a feature can be read from out of a raw Ethernet
//! frame, then slices each feature's bits the way the switch parser does.

use crate::error::{DataplaneError, Result};
use planter_compiler::{Extraction, FeatureId, FeatureSet, FieldSource};

const ETH_HLEN: usize = 14;
const ETH_P_IP: u16 = 0x0800;
const ETH_P_IPV6: u16 = 0x86DD;
const IPPROTO_TCP: u8 = 6;
const IPPROTO_UDP: u8 = 17;

/// Header fields of one packet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketFields {
    /// IPv4 TTL or IPv6 hop limit
    pub ttl: u8,
    /// IPv4 total length or IPv6 payload length
    pub ip_length: u16,
    /// IP protocol or IPv6 next header
    pub protocol: u8,
    /// TCP/UDP source port, 0 for other protocols
    pub src_port: u16,
    /// TCP/UDP destination port, 0 for other protocols
    pub dst_port: u16,
}

impl PacketFields {
    /// Parse from raw packet (Ethernet frame)
    #[inline]
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < ETH_HLEN {
            return None;
        }
        let eth_type = u16::from_be_bytes([data[12], data[13]]);
        match eth_type {
            ETH_P_IP => Self::parse_ipv4(&data[ETH_HLEN..]),
            ETH_P_IPV6 => Self::parse_ipv6(&data[ETH_HLEN..]),
            _ => None,
        }
    }

    fn parse_ipv4(data: &[u8]) -> Option<Self> {
        if data.len() < 20 {
            return None;
        }
        let ihl = usize::from(data[0] & 0x0f) * 4;
        if ihl < 20 || data.len() < ihl {
            return None;
        }
        let protocol = data[9];
        let (src_port, dst_port) = Self::ports(protocol, &data[ihl..]);
        Some(Self {
            ttl: data[8],
            ip_length: u16::from_be_bytes([data[2], data[3]]),
            protocol,
            src_port,
            dst_port,
        })
    }

    fn parse_ipv6(data: &[u8]) -> Option<Self> {
        if data.len() < 40 {
            return None;
        }
        // Next header only; extension headers are not walked
        let protocol = data[6];
        let (src_port, dst_port) = Self::ports(protocol, &data[40..]);
        Some(Self {
            ttl: data[7],
            ip_length: u16::from_be_bytes([data[4], data[5]]),
            protocol,
            src_port,
            dst_port,
        })
    }

    fn ports(protocol: u8, l4: &[u8]) -> (u16, u16) {
        match protocol {
            IPPROTO_TCP | IPPROTO_UDP if l4.len() >= 4 => (
                u16::from_be_bytes([l4[0], l4[1]]),
                u16::from_be_bytes([l4[2], l4[3]]),
            ),
            _ => (0, 0),
        }
    }

    /// Raw value of `source` before slicing
    pub fn raw(&self, source: FieldSource, counters: &FlowCounters) -> u32 {
        match source {
            FieldSource::IpTtl => u32::from(self.ttl),
            FieldSource::IpLength => u32::from(self.ip_length),
            FieldSource::IpProtocol => u32::from(self.protocol),
            FieldSource::SrcPort => u32::from(self.src_port),
            FieldSource::DstPort => u32::from(self.dst_port),
            FieldSource::SrcBytes => counters.src_bytes,
            FieldSource::DstBytes => counters.dst_bytes,
        }
    }
}

/// Per-flow byte counters kept in switch registers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowCounters {
    /// Bytes seen source to destination
    pub src_bytes: u32,
    /// Bytes seen destination to source
    pub dst_bytes: u32,
}

impl FlowCounters {
    /// Account a packet of `len` bytes; registers saturate
    pub fn record(&mut self, len: u16, from_source: bool) {
        let counter = if from_source {
            &mut self.src_bytes
        } else {
            &mut self.dst_bytes
        };
        *counter = counter.saturating_add(u32::from(len));
    }
}

/// Apply a bit slice: `(raw >> shift) & ((1 << bits) - 1)`
#[inline]
pub fn extract(rule: &Extraction, raw: u32) -> u32 {
    let shifted = raw.checked_shr(u32::from(rule.shift)).unwrap_or(0);
    if rule.bits >= 32 {
        shifted
    } else {
        shifted & ((1u32 << rule.bits) - 1)
    }
}

/// Extraction rules of a feature set, in descriptor order
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    rules: Vec<(FeatureId, Extraction)>,
}

impl FeatureExtractor {
    /// Fails if any feature lacks an extraction rule
    pub fn new(features: &FeatureSet) -> Result<Self> {
        let rules = features
            .iter()
            .map(|f| {
                f.extraction
                    .map(|rule| (f.id, rule))
                    .ok_or(DataplaneError::NoExtraction(f.id))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Number of features extracted
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no feature is extracted
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Feature vector for already-parsed fields
    pub fn extract(&self, fields: &PacketFields, counters: &FlowCounters) -> Vec<u32> {
        self.rules
            .iter()
            .map(|(_, rule)| extract(rule, fields.raw(rule.source, counters)))
            .collect()
    }

    /// Parse `frame` and extract its feature vector
    pub fn extract_frame(&self, frame: &[u8], counters: &FlowCounters) -> Result<Vec<u32>> {
        let fields = PacketFields::parse(frame).ok_or(DataplaneError::Frame(frame.len()))?;
        Ok(self.extract(&fields, counters))
    }
}
