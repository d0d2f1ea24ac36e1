//! Feature Quantizer
//!
//! Turns every threshold the tree uses on a feature into a range edge,
//! producing disjoint integer ranges that cover the whole feature domain.
//! Each range gets a dense code in ascending order; the codes are what the
//! per-feature range tables hand to the classification table.

use crate::config::Budget;
use crate::error::{CompileError, QuantizationFault, Result};
use crate::feature::{Feature, FeatureId, FeatureSet};
use crate::model::{DecisionTree, NodeId};
use serde::Serialize;
use std::ops::RangeInclusive;

/// Range code, dense from 0 per feature
pub type Code = u16;

/// Inclusive value range of one feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Range {
    pub feature: FeatureId,
    pub lower: u32,
    pub upper: u32,
    pub code: Code,
}

impl Range {
    /// Whether `value` falls into this range
    #[inline]
    pub fn contains(&self, value: u32) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Sorted, disjoint, exhaustive ranges of a single feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureRanges {
    feature: FeatureId,
    ranges: Vec<Range>,
}

impl FeatureRanges {
    /// Build ranges from the sorted, deduplicated in-domain thresholds of `feature`.
    ///
    /// `[min, t1], (t1, t2], ..., (tn, max]`. A threshold equal to `max`
    /// adds no trailing range since `(max, max]` is empty.
    fn from_thresholds(feature: &Feature, thresholds: &[u32]) -> Self {
        let mut ranges = Vec::with_capacity(thresholds.len() + 1);
        let mut lower = feature.domain_min;

        for &t in thresholds {
            ranges.push(Range {
                feature: feature.id,
                lower,
                upper: t,
                code: ranges.len() as Code,
            });
            if t == feature.domain_max {
                return Self {
                    feature: feature.id,
                    ranges,
                };
            }
            lower = t + 1;
        }

        ranges.push(Range {
            feature: feature.id,
            lower,
            upper: feature.domain_max,
            code: ranges.len() as Code,
        });

        Self {
            feature: feature.id,
            ranges,
        }
    }

    /// Feature these ranges belong to
    pub fn feature(&self) -> FeatureId {
        self.feature
    }

    /// Ranges sorted by lower bound
    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    /// Number of codes
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Always false for a quantized feature
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Code of the range containing `value`, by binary search
    pub fn lookup(&self, value: u32) -> Option<Code> {
        let idx = self.ranges.partition_point(|r| r.upper < value);
        self.ranges
            .get(idx)
            .filter(|r| r.contains(value))
            .map(|r| r.code)
    }

    /// Codes exactly covering the inclusive interval `[lower, upper]`.
    ///
    /// Returns `None` for an empty interval. Both endpoints must sit on range
    /// edges; path intervals always do, since they are bounded by the same
    /// thresholds the ranges were cut from.
    pub fn codes_covering(&self, lower: i64, upper: i64) -> Result<Option<RangeInclusive<Code>>> {
        if lower > upper {
            return Ok(None);
        }
        let misaligned = || CompileError::Quantization {
            feature: self.feature,
            fault: QuantizationFault::MisalignedInterval { lower, upper },
        };

        let first = u32::try_from(lower)
            .ok()
            .and_then(|v| self.lookup(v))
            .ok_or_else(misaligned)?;
        let last = u32::try_from(upper)
            .ok()
            .and_then(|v| self.lookup(v))
            .ok_or_else(misaligned)?;

        if i64::from(self.ranges[first as usize].lower) != lower
            || i64::from(self.ranges[last as usize].upper) != upper
        {
            return Err(misaligned());
        }
        Ok(Some(first..=last))
    }
}

/// Range tables for the whole feature set, in descriptor order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quantization {
    tables: Vec<FeatureRanges>,
}

impl Quantization {
    /// Per-feature ranges in descriptor order
    pub fn tables(&self) -> &[FeatureRanges] {
        &self.tables
    }

    /// Ranges of the feature at descriptor position `index`
    pub fn table(&self, index: usize) -> &FeatureRanges {
        &self.tables[index]
    }

    /// Code count per feature
    pub fn code_counts(&self) -> Vec<usize> {
        self.tables.iter().map(FeatureRanges::len).collect()
    }

    /// Size of the full code cross product
    pub fn cross_product(&self) -> u64 {
        self.tables
            .iter()
            .fold(1u64, |acc, t| acc.saturating_mul(t.len() as u64))
    }
}

/// Quantize every feature of `features` against the thresholds in `tree`.
///
/// Fails on a split over an undeclared feature, a threshold outside its
/// feature's domain, or a feature needing more ranges than the budget allows.
pub fn quantize(tree: &DecisionTree, features: &FeatureSet, budget: &Budget) -> Result<Quantization> {
    let mut thresholds: Vec<Vec<(i64, NodeId)>> = vec![Vec::new(); features.len()];

    for (node, feature, threshold) in tree.splits() {
        let index = features
            .index_of(feature)
            .ok_or(CompileError::UnknownFeature { feature, node })?;
        thresholds[index].push((threshold, node));
    }

    let mut tables = Vec::with_capacity(features.len());
    for (feature, mut used) in features.iter().zip(thresholds) {
        if let Some(&(threshold, node)) = used.iter().find(|(t, _)| !feature.contains(*t)) {
            return Err(CompileError::Quantization {
                feature: feature.id,
                fault: QuantizationFault::ThresholdOutOfDomain {
                    node,
                    threshold,
                    min: feature.domain_min,
                    max: feature.domain_max,
                },
            });
        }

        used.sort_unstable();
        // Domain check above guarantees every threshold fits in u32.
        let mut edges: Vec<u32> = used.iter().map(|(t, _)| *t as u32).collect();
        edges.dedup();

        let table = FeatureRanges::from_thresholds(feature, &edges);
        if table.len() > budget.max_ranges_per_feature {
            return Err(CompileError::Quantization {
                feature: feature.id,
                fault: QuantizationFault::TooManyRanges {
                    count: table.len(),
                    budget: budget.max_ranges_per_feature,
                },
            });
        }

        tracing::debug!(
            feature = %feature.label(),
            thresholds = edges.len(),
            ranges = table.len(),
            "Quantized feature"
        );
        tables.push(table);
    }

    Ok(Quantization { tables })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Class, TreeBuilder};

    fn features() -> FeatureSet {
        FeatureSet::new(vec![
            Feature::new(0, "sttl", 8),
            Feature::new(1, "sport", 16),
            Feature::new(2, "dsport", 16),
        ])
        .unwrap()
    }

    /// Two splits on sttl, one on dsport, none on sport
    fn tree() -> DecisionTree {
        let mut b = TreeBuilder::new();
        let a = b.leaf(Class::Normal);
        let c = b.leaf(Class::Attack);
        let d = b.leaf(Class::Normal);
        let e = b.leaf(Class::Attack);
        let low = b.split(0, 32, a, c);
        let high = b.split(2, 1023, d, e);
        let root = b.split(0, 64, low, high);
        b.build(root)
    }

    #[test]
    fn test_thresholds_become_edges() {
        let q = quantize(&tree(), &features(), &Budget::default()).unwrap();
        let sttl = q.table(0).ranges();
        assert_eq!(sttl.len(), 3);
        assert_eq!((sttl[0].lower, sttl[0].upper, sttl[0].code), (0, 32, 0));
        assert_eq!((sttl[1].lower, sttl[1].upper, sttl[1].code), (33, 64, 1));
        assert_eq!((sttl[2].lower, sttl[2].upper, sttl[2].code), (65, 255, 2));

        let dsport = q.table(2).ranges();
        assert_eq!(dsport.len(), 2);
        assert_eq!((dsport[1].lower, dsport[1].upper), (1024, 65535));
    }

    #[test]
    fn test_unsplit_feature_is_dont_care() {
        let q = quantize(&tree(), &features(), &Budget::default()).unwrap();
        let sport = q.table(1).ranges();
        assert_eq!(sport.len(), 1);
        assert_eq!((sport[0].lower, sport[0].upper, sport[0].code), (0, 65535, 0));
        assert_eq!(q.code_counts(), vec![3, 1, 2]);
        assert_eq!(q.cross_product(), 6);
    }

    #[test]
    fn test_lookup() {
        let q = quantize(&tree(), &features(), &Budget::default()).unwrap();
        let sttl = q.table(0);
        assert_eq!(sttl.lookup(0), Some(0));
        assert_eq!(sttl.lookup(32), Some(0));
        assert_eq!(sttl.lookup(33), Some(1));
        assert_eq!(sttl.lookup(64), Some(1));
        assert_eq!(sttl.lookup(65), Some(2));
        assert_eq!(sttl.lookup(255), Some(2));
        assert_eq!(sttl.lookup(256), None);
    }

    #[test]
    fn test_threshold_at_domain_edges() {
        let mut b = TreeBuilder::new();
        let l = b.leaf(Class::Normal);
        let r = b.leaf(Class::Attack);
        let inner = b.split(0, 0, l, r);
        let r2 = b.leaf(Class::Attack);
        let root = b.split(0, 255, inner, r2);
        let tree = b.build(root);

        let q = quantize(&tree, &features(), &Budget::default()).unwrap();
        let sttl = q.table(0).ranges();
        assert_eq!(sttl.len(), 2);
        assert_eq!((sttl[0].lower, sttl[0].upper), (0, 0));
        assert_eq!((sttl[1].lower, sttl[1].upper), (1, 255));
    }

    #[test]
    fn test_threshold_out_of_domain() {
        let mut b = TreeBuilder::new();
        let l = b.leaf(Class::Normal);
        let r = b.leaf(Class::Attack);
        let root = b.split(0, 300, l, r);
        let err = quantize(&b.build(root), &features(), &Budget::default()).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Quantization {
                fault: QuantizationFault::ThresholdOutOfDomain { threshold: 300, .. },
                ..
            }
        ));

        let mut b = TreeBuilder::new();
        let l = b.leaf(Class::Normal);
        let r = b.leaf(Class::Attack);
        let root = b.split(0, -1, l, r);
        let err = quantize(&b.build(root), &features(), &Budget::default()).unwrap_err();
        assert_eq!(err.kind(), "QuantizationError");
    }

    #[test]
    fn test_range_budget() {
        let budget = Budget {
            max_ranges_per_feature: 2,
            ..Budget::default()
        };
        let err = quantize(&tree(), &features(), &budget).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Quantization {
                fault: QuantizationFault::TooManyRanges { count: 3, budget: 2 },
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_feature() {
        let mut b = TreeBuilder::new();
        let l = b.leaf(Class::Normal);
        let r = b.leaf(Class::Attack);
        let root = b.split(9, 10, l, r);
        let err = quantize(&b.build(root), &features(), &Budget::default()).unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnknownFeature {
                feature: FeatureId(9),
                node: 0
            }
        ));
    }

    #[test]
    fn test_codes_covering() {
        let q = quantize(&tree(), &features(), &Budget::default()).unwrap();
        let sttl = q.table(0);
        assert_eq!(sttl.codes_covering(0, 255).unwrap(), Some(0..=2));
        assert_eq!(sttl.codes_covering(33, 255).unwrap(), Some(1..=2));
        assert_eq!(sttl.codes_covering(65, 64).unwrap(), None);
        assert!(sttl.codes_covering(10, 64).is_err());
    }

    #[test]
    fn test_deterministic_regardless_of_node_order() {
        let mut b = TreeBuilder::new();
        let a = b.leaf(Class::Normal);
        let c = b.leaf(Class::Attack);
        let d = b.leaf(Class::Normal);
        let e = b.leaf(Class::Attack);
        let high = b.split(0, 64, d, e);
        let low = b.split(2, 1023, a, c);
        let root = b.split(0, 32, low, high);
        let mirrored = b.build(root);

        let q1 = quantize(&tree(), &features(), &Budget::default()).unwrap();
        let q2 = quantize(&mirrored, &features(), &Budget::default()).unwrap();
        assert_eq!(q1, q2);
    }
}
