//! Trainer artifact formats
//!
//! A tree artifact is either the native arena JSON or a scikit-learn
//! `tree_` array export; [`parse_tree`] accepts both.

pub mod sklearn;

use crate::error::{CompileError, Result};
use crate::model::DecisionTree;
use serde::Deserialize;
use std::path::Path;

pub use sklearn::SklearnTree;

/// Any supported tree encoding
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TreeArtifact {
    Native(DecisionTree),
    Sklearn(SklearnTree),
}

/// Decode a tree artifact from JSON text
pub fn parse_tree(content: &str) -> Result<DecisionTree> {
    let artifact: TreeArtifact = serde_json::from_str(content).map_err(|e| {
        CompileError::Artifact(format!("not a native or scikit-learn tree artifact: {}", e))
    })?;
    match artifact {
        TreeArtifact::Native(tree) => Ok(tree),
        TreeArtifact::Sklearn(tree) => tree.into_tree(),
    }
}

/// Load a tree artifact file
pub fn load_tree(path: impl AsRef<Path>) -> Result<DecisionTree> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let tree = parse_tree(&content)?;
    tracing::debug!(path = %path.display(), nodes = tree.len(), "Loaded tree artifact");
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Class, Node};

    #[test]
    fn test_parse_native() {
        let tree = parse_tree(
            r#"{"nodes": [
                {"kind": "split", "feature": 0, "threshold": 64, "left": 1, "right": 2},
                {"kind": "leaf", "class": "normal"},
                {"kind": "leaf", "class": "attack"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.node(2), Some(&Node::Leaf { class: Class::Attack }));
    }

    #[test]
    fn test_parse_sklearn() {
        let tree = parse_tree(
            r#"{
                "children_left": [1, -1, -1],
                "children_right": [2, -1, -1],
                "feature": [0, -2, -2],
                "threshold": [64.5, -2.0, -2.0],
                "value": [[[10, 10]], [[9, 1]], [[1, 9]]]
            }"#,
        )
        .unwrap();
        assert!(matches!(tree.node(0), Some(Node::Split { threshold: 64, .. })));
    }

    #[test]
    fn test_parse_garbage() {
        let err = parse_tree(r#"{"layers": []}"#).unwrap_err();
        assert_eq!(err.kind(), "ArtifactError");
    }
}
