//! Extraction contract
//!
//! The compiler quantizes against each feature's declared domain; the switch
//! matches whatever its parser extracts. The two agree only if the declared
//! bit slice produces exactly the domain's key width and every value the
//! domain names can actually be extracted.

use planter_compiler::{Feature, FeatureId, FeatureSet};
use serde::Serialize;
use std::fmt;

/// How a feature's extraction rule disagrees with its descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// No extraction rule declared
    Missing,
    /// Slice reads past the end of the field
    OutsideField { shift: u8, bits: u8, field_width: u8 },
    /// Slice width differs from the table key width
    WidthMismatch { bits: u8, bit_width: u8 },
    /// Domain names values the slice can never produce
    DomainUnreachable { domain_max: u32, slice_max: u64 },
    /// Slice produces values outside the domain, which miss the range table
    DomainNarrowerThanSlice {
        domain_min: u32,
        domain_max: u32,
        slice_max: u64,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "no extraction rule"),
            Self::OutsideField {
                shift,
                bits,
                field_width,
            } => write!(
                f,
                "slice >> {} of {} bits leaves the {}-bit field",
                shift, bits, field_width
            ),
            Self::WidthMismatch { bits, bit_width } => write!(
                f,
                "extracts {} bits into a {}-bit match key",
                bits, bit_width
            ),
            Self::DomainUnreachable {
                domain_max,
                slice_max,
            } => write!(
                f,
                "domain reaches {} but the slice tops out at {}",
                domain_max, slice_max
            ),
            Self::DomainNarrowerThanSlice {
                domain_min,
                domain_max,
                slice_max,
            } => write!(
                f,
                "slice yields 0..={} but the domain is {}..={}",
                slice_max, domain_min, domain_max
            ),
        }
    }
}

/// One violation of one feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractViolation {
    pub feature: FeatureId,
    pub name: String,
    pub violation: Violation,
}

/// Result of checking a feature set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContractReport {
    pub checked: usize,
    pub violations: Vec<ContractViolation>,
}

impl ContractReport {
    /// Whether every feature honours the contract
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

fn check_feature(feature: &Feature) -> Vec<Violation> {
    let Some(rule) = feature.extraction else {
        return vec![Violation::Missing];
    };

    let mut found = Vec::new();
    let field_width = rule.source.width();
    if u16::from(rule.shift) + u16::from(rule.bits) > u16::from(field_width) {
        found.push(Violation::OutsideField {
            shift: rule.shift,
            bits: rule.bits,
            field_width,
        });
    }
    if rule.bits != feature.bit_width {
        found.push(Violation::WidthMismatch {
            bits: rule.bits,
            bit_width: feature.bit_width,
        });
    }

    // Bits available after the shift, capped by the slice itself
    let produced = rule
        .bits
        .min(field_width.saturating_sub(rule.shift))
        .min(32);
    let slice_max = (1u64 << produced) - 1;
    if u64::from(feature.domain_max) > slice_max {
        found.push(Violation::DomainUnreachable {
            domain_max: feature.domain_max,
            slice_max,
        });
    }
    if feature.domain_min > 0 || u64::from(feature.domain_max) < slice_max {
        found.push(Violation::DomainNarrowerThanSlice {
            domain_min: feature.domain_min,
            domain_max: feature.domain_max,
            slice_max,
        });
    }
    found
}

/// Check every feature's extraction rule against its descriptor
pub fn check(features: &FeatureSet) -> ContractReport {
    let mut report = ContractReport::default();
    for feature in features {
        report.checked += 1;
        for violation in check_feature(feature) {
            tracing::warn!(
                feature = %feature.label(),
                violation = %violation,
                "Extraction contract violated"
            );
            report.violations.push(ContractViolation {
                feature: feature.id,
                name: feature.label(),
                violation,
            });
        }
    }
    report
}
