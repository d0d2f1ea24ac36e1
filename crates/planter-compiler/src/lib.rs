//! Planter Tree Compiler
//!
//! Compiles a trained binary decision tree into a static match-action table
//! program for a programmable switch, so flows are classified Normal/Attack
//! at line rate without software inference.
//!
//! ## Pipeline
//!
//! ```text
//! DecisionTree ──► quantize ──► enumerate_paths ──► assemble ──► TableProgram ──► emit
//!                  (ranges)     (intervals)         (code tuples)  (stages)        (commands)
//! ```
//!
//! - **Quantizer**: every threshold on a feature becomes a range edge; each
//!   range gets a dense code
//! - **Path Enumerator**: one interval per feature for every root-to-leaf path
//! - **Table Assembler**: explicit wildcard expansion into exact-match rows,
//!   checked against the entry budget
//! - **Emitter**: `table_set_default` / `table_add` command text
//!
//! Compilation is a pure transform of one tree and one feature set. The
//! first error aborts it; nothing is truncated or resolved silently.

#![warn(clippy::all)]

pub mod assemble;
pub mod compat;
pub mod config;
pub mod emit;
pub mod error;
pub mod feature;
pub mod model;
pub mod paths;
pub mod program;
pub mod quantize;

pub use assemble::{assemble, ClassificationTable, CodeTuple, TableRow};
pub use compat::{load_tree, parse_tree};
pub use config::{Budget, CompilerConfig, Manifest, TableNaming};
pub use emit::{emit, write_artifact};
pub use error::{CompileError, QuantizationFault, Result};
pub use feature::{Extraction, Feature, FeatureId, FeatureSet, FieldSource};
pub use model::{Class, DecisionTree, Node, NodeId, TreeBuilder};
pub use paths::{enumerate_paths, Path};
pub use program::{ProgramSummary, TableProgram};
pub use quantize::{quantize, Code, FeatureRanges, Quantization, Range};

use rayon::prelude::*;
use std::time::Instant;

/// Compilation statistics
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct CompilerStats {
    pub tree_nodes: usize,
    pub tree_depth: usize,
    pub leaves: usize,
    pub paths: usize,
    pub infeasible_paths: usize,
    pub range_entries: usize,
    pub table_rows: usize,
    pub stages: usize,
    pub compile_time_us: u64,
}

/// Result of a successful compilation
#[derive(Debug, Clone)]
pub struct Compilation {
    pub program: TableProgram,
    pub quantization: Quantization,
    pub paths: Vec<Path>,
    pub stats: CompilerStats,
}

impl Compilation {
    /// Command text of the compiled program
    pub fn emit(&self) -> String {
        emit::emit(&self.program)
    }
}

/// Decision tree compiler
#[derive(Debug, Clone, Default)]
pub struct TreeCompiler {
    config: CompilerConfig,
}

impl TreeCompiler {
    /// Create a compiler with the given budgets and naming
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile `tree` against the fixed feature set
    pub fn compile(&self, tree: &DecisionTree, features: &FeatureSet) -> Result<Compilation> {
        let start = Instant::now();
        let budget = &self.config.budget;

        let shape = tree.validate()?;
        if shape.depth > budget.max_stages {
            return Err(CompileError::DepthExceeded {
                depth: shape.depth,
                budget: budget.max_stages,
            });
        }

        let quantization = quantize(tree, features, budget)?;
        let paths = enumerate_paths(tree, features)?;
        let table = assemble(&paths, &quantization, budget)?;
        let program = TableProgram::new(features, &quantization, table, &self.config)?;

        let stats = CompilerStats {
            tree_nodes: tree.len(),
            tree_depth: shape.depth,
            leaves: shape.leaves,
            paths: paths.len(),
            infeasible_paths: paths.iter().filter(|p| !p.is_feasible()).count(),
            range_entries: quantization.tables().iter().map(FeatureRanges::len).sum(),
            table_rows: program.classify_table().rows().len(),
            stages: program.stages(),
            compile_time_us: start.elapsed().as_micros() as u64,
        };

        tracing::info!(
            nodes = stats.tree_nodes,
            depth = stats.tree_depth,
            paths = stats.paths,
            range_entries = stats.range_entries,
            rows = stats.table_rows,
            stages = stats.stages,
            time_us = stats.compile_time_us,
            "Tree compilation complete"
        );

        Ok(Compilation {
            program,
            quantization,
            paths,
            stats,
        })
    }

    /// Compile independent trees in parallel, results in input order
    pub fn compile_batch(&self, trees: &[DecisionTree], features: &FeatureSet) -> Vec<Result<Compilation>> {
        trees
            .par_iter()
            .map(|tree| self.compile(tree, features))
            .collect()
    }
}

/// Compile with an explicit configuration
pub fn compile(tree: &DecisionTree, features: &FeatureSet, config: &CompilerConfig) -> Result<Compilation> {
    TreeCompiler::new(config.clone()).compile(tree, features)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> FeatureSet {
        FeatureSet::new(vec![
            Feature::new(0, "sttl", 8),
            Feature::new(1, "sport", 16),
            Feature::new(2, "dsport", 16),
        ])
        .unwrap()
    }

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
    fn test_compile_stats() {
        let compilation = TreeCompiler::default()
            .compile(&reference_tree(), &features())
            .unwrap();
        let stats = &compilation.stats;
        assert_eq!(stats.tree_nodes, 5);
        assert_eq!(stats.tree_depth, 2);
        assert_eq!(stats.paths, 3);
        assert_eq!(stats.infeasible_paths, 0);
        assert_eq!(stats.range_entries, 2 + 1 + 2);
        assert_eq!(stats.table_rows, 4);
        assert_eq!(stats.stages, 4);
    }

    #[test]
    fn test_depth_budget() {
        let mut b = TreeBuilder::new();
        let mut node = b.leaf(Class::Normal);
        for t in 0..9 {
            let leaf = b.leaf(Class::Attack);
            node = b.split(0, t * 10, node, leaf);
        }
        let err = TreeCompiler::default()
            .compile(&b.build(node), &features())
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::DepthExceeded { depth: 9, budget: 8 }
        ));
    }

    #[test]
    fn test_batch_keeps_order_and_isolates_failures() {
        let mut b = TreeBuilder::new();
        let l = b.leaf(Class::Normal);
        let r = b.leaf(Class::Attack);
        let root = b.split(5, 1, l, r);
        let unknown = b.build(root);

        let trees = vec![reference_tree(), unknown, DecisionTree::constant(Class::Normal)];
        let results = TreeCompiler::default().compile_batch(&trees, &features());
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().stats.table_rows, 4);
        assert_eq!(results[1].as_ref().unwrap_err().kind(), "UnknownFeatureError");
        assert_eq!(results[2].as_ref().unwrap().stats.table_rows, 1);
    }

    #[test]
    fn test_compile_fn_matches_compiler() {
        let a = compile(&reference_tree(), &features(), &CompilerConfig::default()).unwrap();
        let b = TreeCompiler::default().compile(&reference_tree(), &features()).unwrap();
        assert_eq!(a.emit(), b.emit());
    }
}
