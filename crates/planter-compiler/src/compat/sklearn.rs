//! scikit-learn tree import
//!
//! Reads the parallel arrays of a fitted `DecisionTreeClassifier.tree_`:
//! `children_left`, `children_right`, `feature`, `threshold` and `value`.
//! Leaves have both children set to `-1`.

use crate::error::{CompileError, Result};
use crate::feature::FeatureId;
use crate::model::{Class, DecisionTree, Node, NodeId};
use serde::{Deserialize, Serialize};

/// Child marker for leaves
pub const TREE_LEAF: i64 = -1;

/// Per-node class counts, with or without the outputs axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeValue {
    /// Shape `(n_outputs, n_classes)`; only the first output is read
    Outputs(Vec<Vec<f64>>),
    /// Shape `(n_classes,)`
    Classes(Vec<f64>),
}

impl NodeValue {
    fn counts(&self) -> &[f64] {
        match self {
            Self::Outputs(outputs) => outputs.first().map(Vec::as_slice).unwrap_or(&[]),
            Self::Classes(counts) => counts,
        }
    }
}

/// Array export of a scikit-learn tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SklearnTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<NodeValue>,
}

/// Largest integer `v` with `x <= t` equivalent to `x <= v` for integer `x`
fn integer_threshold(node: usize, t: f64) -> Result<i64> {
    if !t.is_finite() || t.abs() > 1e15 {
        return Err(CompileError::Artifact(format!(
            "node {}: threshold {} is not a usable integer split",
            node, t
        )));
    }
    Ok(t.floor() as i64)
}

/// Class with the highest count; index 0 is Normal, 1 is Attack, ties go to Normal
fn leaf_class(node: usize, value: &NodeValue) -> Result<Class> {
    let counts = value.counts();
    match counts {
        [normal, attack] => Ok(if attack > normal {
            Class::Attack
        } else {
            Class::Normal
        }),
        _ => Err(CompileError::Artifact(format!(
            "node {}: expected 2 class counts, found {}",
            node,
            counts.len()
        ))),
    }
}

fn child(node: usize, id: i64, len: usize) -> Result<NodeId> {
    if id < 0 || id as usize >= len {
        return Err(CompileError::MalformedTree {
            node: node as NodeId,
            reason: format!("child {} out of bounds ({} nodes)", id, len),
        });
    }
    Ok(id as NodeId)
}

impl SklearnTree {
    /// Convert to the native arena, keeping node ids
    pub fn into_tree(self) -> Result<DecisionTree> {
        let len = self.children_left.len();
        if [
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
            self.value.len(),
        ]
        .iter()
        .any(|&n| n != len)
        {
            return Err(CompileError::Artifact(
                "scikit-learn arrays have different lengths".into(),
            ));
        }

        let mut nodes = Vec::with_capacity(len);
        for i in 0..len {
            let (left, right) = (self.children_left[i], self.children_right[i]);
            let node = if left == TREE_LEAF && right == TREE_LEAF {
                Node::Leaf {
                    class: leaf_class(i, &self.value[i])?,
                }
            } else {
                let feature = u32::try_from(self.feature[i]).map_err(|_| {
                    CompileError::MalformedTree {
                        node: i as NodeId,
                        reason: format!("split on feature index {}", self.feature[i]),
                    }
                })?;
                Node::Split {
                    feature: FeatureId(feature),
                    threshold: integer_threshold(i, self.threshold[i])?,
                    left: child(i, left, len)?,
                    right: child(i, right, len)?,
                }
            };
            nodes.push(node);
        }

        Ok(DecisionTree::from_nodes(nodes))
    }
}
