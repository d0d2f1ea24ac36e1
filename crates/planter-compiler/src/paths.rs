//! Path Enumerator
//!
//! Depth-first walk over the tree arena that yields one [`Path`] per leaf.
//! Constraints on the same feature are narrowed to a single interval per
//! feature as the walk descends.

use crate::error::{CompileError, Result};
use crate::feature::{FeatureId, FeatureSet};
use crate::model::{Class, DecisionTree, Node, NodeId, ROOT};
use serde::Serialize;
use std::fmt;

/// Split direction taken along a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Comparator {
    /// Left branch
    LessEq,
    /// Right branch
    Greater,
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LessEq => write!(f, "<="),
            Self::Greater => write!(f, ">"),
        }
    }
}

/// One split decision along a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Constraint {
    pub feature: FeatureId,
    pub comparator: Comparator,
    pub threshold: i64,
}

/// Inclusive interval of feature values; empty when `lower > upper`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interval {
    pub lower: i64,
    pub upper: i64,
}

impl Interval {
    /// Whether the interval holds no value
    pub fn is_empty(&self) -> bool {
        self.lower > self.upper
    }

    fn narrow(&mut self, comparator: Comparator, threshold: i64) {
        match comparator {
            Comparator::LessEq => self.upper = self.upper.min(threshold),
            Comparator::Greater => self.lower = self.lower.max(threshold.saturating_add(1)),
        }
    }
}

/// Root-to-leaf path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Path {
    /// Leaf this path ends in
    pub leaf: NodeId,
    /// Leaf class
    pub class: Class,
    /// Split decisions from the root down
    pub constraints: Vec<Constraint>,
    /// Intersected interval per feature, in descriptor order
    pub intervals: Vec<Interval>,
    /// Descriptor positions of the features this path tests
    pub constrained: Vec<usize>,
}

impl Path {
    /// Whether some input reaches this leaf
    pub fn is_feasible(&self) -> bool {
        self.intervals.iter().all(|i| !i.is_empty())
    }

    /// Whether the feature at descriptor position `index` is tested on this path
    pub fn constrains(&self, index: usize) -> bool {
        self.constrained.contains(&index)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.constraints.iter().enumerate() {
            if i > 0 {
                write!(f, " && ")?;
            }
            write!(f, "f{} {} {}", c.feature, c.comparator, c.threshold)?;
        }
        if self.constraints.is_empty() {
            write!(f, "true")?;
        }
        write!(f, " => {}", self.class)
    }
}

/// Enumerate every root-to-leaf path, left subtree first.
///
/// The tree must have passed [`DecisionTree::validate`].
pub fn enumerate_paths(tree: &DecisionTree, features: &FeatureSet) -> Result<Vec<Path>> {
    let full: Vec<Interval> = features
        .iter()
        .map(|f| Interval {
            lower: i64::from(f.domain_min),
            upper: i64::from(f.domain_max),
        })
        .collect();

    let mut paths = Vec::new();
    let mut stack: Vec<(NodeId, Vec<Constraint>)> = vec![(ROOT, Vec::new())];

    while let Some((id, constraints)) = stack.pop() {
        let node = tree.node(id).ok_or_else(|| CompileError::MalformedTree {
            node: id,
            reason: "dangling child reference".into(),
        })?;

        match *node {
            Node::Leaf { class } => {
                let mut intervals = full.clone();
                let mut constrained = Vec::new();
                for c in &constraints {
                    let index = features
                        .index_of(c.feature)
                        .ok_or(CompileError::UnknownFeature {
                            feature: c.feature,
                            node: id,
                        })?;
                    intervals[index].narrow(c.comparator, c.threshold);
                    if !constrained.contains(&index) {
                        constrained.push(index);
                    }
                }
                constrained.sort_unstable();
                paths.push(Path {
                    leaf: id,
                    class,
                    constraints,
                    intervals,
                    constrained,
                });
            }
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                let mut right_path = constraints.clone();
                right_path.push(Constraint {
                    feature,
                    comparator: Comparator::Greater,
                    threshold,
                });
                let mut left_path = constraints;
                left_path.push(Constraint {
                    feature,
                    comparator: Comparator::LessEq,
                    threshold,
                });
                stack.push((right, right_path));
                stack.push((left, left_path));
            }
        }
    }

    let infeasible = paths.iter().filter(|p| !p.is_feasible()).count();
    if infeasible > 0 {
        tracing::debug!(infeasible, "Paths with empty intervals contribute no rows");
    }

    Ok(paths)
}
