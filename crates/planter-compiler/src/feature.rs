//! Feature descriptors
//!
//! The fixed feature set the trainer and the compiler agree on. Each feature
//! declares the integer domain the switch matches against, i.e. the value
//! after any truncation the data plane applies while extracting it.

use crate::error::{CompileError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Feature identifier as used by tree split nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(pub u32);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Packet field or counter a feature is read from at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    /// IPv4 TTL / IPv6 hop limit (8 bits)
    IpTtl,
    /// IPv4 total length / IPv6 payload length (16 bits)
    IpLength,
    /// IP protocol / next header (8 bits)
    IpProtocol,
    /// TCP/UDP source port (16 bits)
    SrcPort,
    /// TCP/UDP destination port (16 bits)
    DstPort,
    /// Flow byte counter, source to destination (32 bits)
    SrcBytes,
    /// Flow byte counter, destination to source (32 bits)
    DstBytes,
}

impl FieldSource {
    /// Width of the raw field in bits
    pub const fn width(&self) -> u8 {
        match self {
            Self::IpTtl | Self::IpProtocol => 8,
            Self::IpLength | Self::SrcPort | Self::DstPort => 16,
            Self::SrcBytes | Self::DstBytes => 32,
        }
    }
}

/// Bit slice taken from a field: `(raw >> shift) & ((1 << bits) - 1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub source: FieldSource,
    #[serde(default)]
    pub shift: u8,
    pub bits: u8,
}

impl Extraction {
    /// Take the low `bits` bits of a field
    pub const fn low_bits(source: FieldSource, bits: u8) -> Self {
        Self { source, shift: 0, bits }
    }

    /// Take a field whole
    pub const fn full(source: FieldSource) -> Self {
        Self::low_bits(source, source.width())
    }
}

/// One feature of the fixed feature set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    /// Human-readable name (`sttl`, `dsport`, ...)
    #[serde(default)]
    pub name: String,
    /// Width of the match key in the range table
    pub bit_width: u8,
    #[serde(rename = "min")]
    pub domain_min: u32,
    #[serde(rename = "max")]
    pub domain_max: u32,
    /// How the data plane derives the value, if declared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction: Option<Extraction>,
}

impl Feature {
    /// Feature covering the whole `bit_width` domain
    pub fn new(id: u32, name: impl Into<String>, bit_width: u8) -> Self {
        let max = if bit_width >= 32 {
            u32::MAX
        } else {
            (1u32 << bit_width) - 1
        };
        Self {
            id: FeatureId(id),
            name: name.into(),
            bit_width,
            domain_min: 0,
            domain_max: max,
            extraction: None,
        }
    }

    /// Override the domain bounds
    pub fn with_domain(mut self, min: u32, max: u32) -> Self {
        self.domain_min = min;
        self.domain_max = max;
        self
    }

    /// Attach the runtime extraction rule
    pub fn with_extraction(mut self, extraction: Extraction) -> Self {
        self.extraction = Some(extraction);
        self
    }

    /// Largest value representable in `bit_width` bits
    pub fn width_max(&self) -> u64 {
        (1u64 << self.bit_width.min(32)) - 1
    }

    /// Number of values in the domain
    pub fn domain_size(&self) -> u64 {
        u64::from(self.domain_max) - u64::from(self.domain_min) + 1
    }

    /// Whether `value` lies inside the domain
    #[inline]
    pub fn contains(&self, value: i64) -> bool {
        value >= i64::from(self.domain_min) && value <= i64::from(self.domain_max)
    }

    /// Label used in logs and summaries
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            format!("f{}", self.id)
        } else {
            self.name.clone()
        }
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: String| CompileError::InvalidFeature {
            feature: self.id,
            reason,
        };
        if self.bit_width == 0 || self.bit_width > 32 {
            return Err(invalid(format!("bit width {} not in 1..=32", self.bit_width)));
        }
        if self.domain_min > self.domain_max {
            return Err(invalid(format!(
                "domain min {} above max {}",
                self.domain_min, self.domain_max
            )));
        }
        if u64::from(self.domain_max) > self.width_max() {
            return Err(invalid(format!(
                "domain max {} does not fit in {} bits",
                self.domain_max, self.bit_width
            )));
        }
        Ok(())
    }
}

/// Ordered fixed feature set
///
/// Descriptor order defines the stage order of the range tables and the
/// position of each code inside a [`CodeTuple`](crate::CodeTuple).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet {
    features: Vec<Feature>,
}

impl FeatureSet {
    /// Build and validate a feature set
    pub fn new(features: Vec<Feature>) -> Result<Self> {
        let mut seen = HashSet::new();
        for feature in &features {
            feature.validate()?;
            if !seen.insert(feature.id) {
                return Err(CompileError::InvalidFeature {
                    feature: feature.id,
                    reason: "declared more than once".into(),
                });
            }
        }
        Ok(Self { features })
    }

    /// Position of a feature in descriptor order
    pub fn index_of(&self, id: FeatureId) -> Option<usize> {
        self.features.iter().position(|f| f.id == id)
    }

    /// Look up a feature by id
    pub fn get(&self, id: FeatureId) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id)
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Iterate in descriptor order
    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    /// Features as a slice
    pub fn as_slice(&self) -> &[Feature] {
        &self.features
    }
}

impl<'a> IntoIterator for &'a FeatureSet {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}
