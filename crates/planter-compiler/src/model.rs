//! Decision tree model
//!
//! Arena representation of a trained binary decision tree. Nodes are indexed
//! by integer id with explicit child indices; the root is node 0.

use crate::error::{CompileError, Result};
use crate::feature::FeatureId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Node index into the tree arena
pub type NodeId = u32;

/// Root node index
pub const ROOT: NodeId = 0;

/// Output class of the binary classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Class {
    /// Benign traffic (also the default action)
    #[default]
    Normal = 0,
    /// Attack traffic
    Attack = 1,
}

impl Class {
    /// Action parameter written to the classification table
    pub const fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Class from its table parameter
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Normal),
            1 => Some(Self::Attack),
            _ => None,
        }
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Attack => write!(f, "attack"),
        }
    }
}

/// Tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Axis-aligned split: `value <= threshold` goes left, otherwise right
    Split {
        feature: FeatureId,
        threshold: i64,
        left: NodeId,
        right: NodeId,
    },
    /// Terminal node
    Leaf { class: Class },
}

impl Node {
    /// Whether this node is a leaf
    pub const fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }
}

/// Trained binary decision tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

/// Shape facts collected by [`DecisionTree::validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeShape {
    /// Longest root-to-leaf path, in edges
    pub depth: usize,
    /// Number of leaves
    pub leaves: usize,
    /// Number of split nodes
    pub splits: usize,
}

impl DecisionTree {
    /// Wrap an arena, root at index 0. Structure is checked by [`validate`](Self::validate).
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Single-leaf tree
    pub fn constant(class: Class) -> Self {
        Self {
            nodes: vec![Node::Leaf { class }],
        }
    }

    /// Node by id
    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id as usize)
    }

    /// All nodes in arena order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check the arena is a rooted binary tree and measure it.
    ///
    /// Every child id must be in bounds, every node except the root must have
    /// exactly one parent, and every node must be reachable from the root.
    pub fn validate(&self) -> Result<TreeShape> {
        if self.nodes.is_empty() {
            return Err(CompileError::MalformedTree {
                node: ROOT,
                reason: "tree has no nodes".into(),
            });
        }

        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![(ROOT, 0usize)];
        let mut shape = TreeShape {
            depth: 0,
            leaves: 0,
            splits: 0,
        };

        while let Some((id, depth)) = stack.pop() {
            let slot = &mut visited[id as usize];
            if *slot {
                return Err(CompileError::MalformedTree {
                    node: id,
                    reason: "node reached twice (shared child or cycle)".into(),
                });
            }
            *slot = true;

            match self.nodes[id as usize] {
                Node::Leaf { .. } => {
                    shape.leaves += 1;
                    shape.depth = shape.depth.max(depth);
                }
                Node::Split { left, right, .. } => {
                    shape.splits += 1;
                    for child in [right, left] {
                        if child as usize >= self.nodes.len() {
                            return Err(CompileError::MalformedTree {
                                node: id,
                                reason: format!(
                                    "child {} out of bounds ({} nodes)",
                                    child,
                                    self.nodes.len()
                                ),
                            });
                        }
                        if child == ROOT {
                            return Err(CompileError::MalformedTree {
                                node: id,
                                reason: "root used as a child".into(),
                            });
                        }
                        stack.push((child, depth + 1));
                    }
                }
            }
        }

        if let Some(orphan) = visited.iter().position(|v| !v) {
            return Err(CompileError::MalformedTree {
                node: orphan as NodeId,
                reason: "unreachable from root".into(),
            });
        }

        Ok(shape)
    }

    /// Classify a sample by walking the tree.
    ///
    /// `value_of` returns the sample's value for a feature. The arena must
    /// have passed [`validate`](Self::validate).
    pub fn evaluate<F>(&self, value_of: F) -> Class
    where
        F: Fn(FeatureId) -> u32,
    {
        let mut id = ROOT;
        loop {
            match self.nodes[id as usize] {
                Node::Leaf { class } => return class,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if i64::from(value_of(feature)) <= threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    /// Split nodes with their ids
    pub fn splits(&self) -> impl Iterator<Item = (NodeId, FeatureId, i64)> + '_ {
        self.nodes.iter().enumerate().filter_map(|(id, node)| match *node {
            Node::Split {
                feature, threshold, ..
            } => Some((id as NodeId, feature, threshold)),
            Node::Leaf { .. } => None,
        })
    }
}

/// Bottom-up tree construction
///
/// Children are created before their parent; [`build`](TreeBuilder::build)
/// renumbers the arena in preorder so the chosen root becomes node 0.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    nodes: Vec<Node>,
}

impl TreeBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a leaf
    pub fn leaf(&mut self, class: Class) -> NodeId {
        self.push(Node::Leaf { class })
    }

    /// Add a split over two existing nodes
    pub fn split(&mut self, feature: u32, threshold: i64, left: NodeId, right: NodeId) -> NodeId {
        self.push(Node::Split {
            feature: FeatureId(feature),
            threshold,
            left,
            right,
        })
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        (self.nodes.len() - 1) as NodeId
    }

    /// Finish with `root` as the tree root.
    ///
    /// Ids that name no node, and nodes reached a second time, are not
    /// followed. They are kept as references in the arena so that
    /// [`DecisionTree::validate`] reports them as a malformed tree.
    pub fn build(self, root: NodeId) -> DecisionTree {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(slot) = seen.get_mut(id as usize) else {
                continue;
            };
            if *slot {
                continue;
            }
            *slot = true;
            order.push(id);
            if let Node::Split { left, right, .. } = self.nodes[id as usize] {
                stack.push(right);
                stack.push(left);
            }
        }

        let mut remap = vec![NodeId::MAX; self.nodes.len()];
        for (new_id, old_id) in order.iter().enumerate() {
            remap[*old_id as usize] = new_id as NodeId;
        }
        let renumber = |old: NodeId| remap.get(old as usize).copied().unwrap_or(NodeId::MAX);

        let nodes = order
            .iter()
            .map(|old_id| match self.nodes[*old_id as usize] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => Node::Split {
                    feature,
                    threshold,
                    left: renumber(left),
                    right: renumber(right),
                },
                leaf => leaf,
            })
            .collect();

        DecisionTree { nodes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// sttl <= 64 -> Normal, else (dsport <= 1023 -> Attack, else Normal)
    fn reference_tree() -> DecisionTree {
        let mut b = TreeBuilder::new();
        let normal = b.leaf(Class::Normal);
        let attack = b.leaf(Class::Attack);
        let normal_hi = b.leaf(Class::Normal);
        let ports = b.split(2, 1023, attack, normal_hi);
        let root = b.split(0, 64, normal, ports);
        b.build(root)
    }

    #[test]
    fn test_builder_puts_root_first() {
        let tree = reference_tree();
        assert!(matches!(
            tree.node(ROOT),
            Some(Node::Split { threshold: 64, .. })
        ));
        let shape = tree.validate().unwrap();
        assert_eq!(shape.depth, 2);
        assert_eq!(shape.leaves, 3);
        assert_eq!(shape.splits, 2);
    }

    #[test]
    fn test_evaluate() {
        let tree = reference_tree();
        let eval = |sttl: u32, dsport: u32| {
            tree.evaluate(|f| match f.0 {
                0 => sttl,
                2 => dsport,
                _ => 0,
            })
        };
        assert_eq!(eval(64, 80), Class::Normal);
        assert_eq!(eval(65, 80), Class::Attack);
        assert_eq!(eval(65, 1023), Class::Attack);
        assert_eq!(eval(200, 1024), Class::Normal);
    }

    #[test]
    fn test_validate_rejects_shared_child() {
        let tree = DecisionTree::from_nodes(vec![
            Node::Split {
                feature: FeatureId(0),
                threshold: 1,
                left: 1,
                right: 1,
            },
            Node::Leaf {
                class: Class::Normal,
            },
        ]);
        let err = tree.validate().unwrap_err();
        assert_eq!(err.kind(), "MalformedTreeError");
    }

    #[test]
    fn test_validate_rejects_out_of_bounds_and_orphans() {
        let oob = DecisionTree::from_nodes(vec![Node::Split {
            feature: FeatureId(0),
            threshold: 1,
            left: 1,
            right: 5,
        }]);
        assert!(oob.validate().is_err());

        let orphan = DecisionTree::from_nodes(vec![
            Node::Leaf {
                class: Class::Attack,
            },
            Node::Leaf {
                class: Class::Normal,
            },
        ]);
        let err = orphan.validate().unwrap_err();
        assert!(matches!(err, CompileError::MalformedTree { node: 1, .. }));

        assert!(DecisionTree::from_nodes(vec![]).validate().is_err());
    }

    #[test]
    fn test_builder_with_bad_ids_yields_malformed_tree() {
        let mut b = TreeBuilder::new();
        let leaf = b.leaf(Class::Normal);
        let root = b.split(0, 10, leaf, 42);
        let err = b.build(root).validate().unwrap_err();
        assert!(matches!(err, CompileError::MalformedTree { node: 0, .. }));

        let mut b = TreeBuilder::new();
        b.leaf(Class::Attack);
        assert!(b.build(7).validate().is_err());

        // Node 0 and node 1 point at each other
        let mut b = TreeBuilder::new();
        let first = b.split(0, 1, 1, 1);
        b.split(0, 2, first, first);
        let tree = b.build(first);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.validate().unwrap_err().kind(), "MalformedTreeError");
    }

    #[test]
    fn test_json_shape() {
        let tree = reference_tree();
        let json = serde_json::to_string(&tree).unwrap();
        assert!(json.contains(r#""kind":"split""#));
        assert!(json.contains(r#""class":"attack""#));
        let back: DecisionTree = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn test_class_params() {
        assert_eq!(Class::default(), Class::Normal);
        assert_eq!(Class::Attack.as_u8(), 1);
        assert_eq!(Class::from_u8(0), Some(Class::Normal));
        assert_eq!(Class::from_u8(2), None);
    }
}
