//! CLI Commands

pub mod classify;
pub mod compile;
pub mod contract;
pub mod inspect;

use anyhow::Context;
use planter_compiler::{load_tree, DecisionTree, FeatureSet, Manifest, TreeCompiler};
use std::path::Path;

/// Manifest plus its validated feature set
pub fn load_manifest(path: &Path) -> anyhow::Result<(Manifest, FeatureSet)> {
    let manifest =
        Manifest::load(path).with_context(|| format!("loading manifest {}", path.display()))?;
    let features = manifest
        .feature_set()
        .with_context(|| format!("validating features of {}", path.display()))?;
    Ok((manifest, features))
}

/// Tree artifact, manifest features and a compiler configured from the manifest
pub fn load_inputs(
    tree: &Path,
    features: &Path,
) -> anyhow::Result<(DecisionTree, FeatureSet, TreeCompiler)> {
    let (manifest, feature_set) = load_manifest(features)?;
    let tree = load_tree(tree).with_context(|| format!("loading tree {}", tree.display()))?;
    Ok((tree, feature_set, TreeCompiler::new(manifest.config())))
}
