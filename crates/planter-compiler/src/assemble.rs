//! Table Assembler
//!
//! Expands every path into concrete code tuples for the exact-match
//! classification table. The table has no wildcard or range matching of its
//! own, so a feature a path does not test expands to every code of that
//! feature. Row growth is checked against the entry budget before any row
//! of the offending path is materialized.

use crate::config::Budget;
use crate::error::{CompileError, Result};
use crate::model::Class;
use crate::paths::Path;
use crate::quantize::{Code, Quantization};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::ops::RangeInclusive;

/// One code per feature, in descriptor order
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CodeTuple(pub Vec<Code>);

impl CodeTuple {
    /// Codes as a slice
    pub fn codes(&self) -> &[Code] {
        &self.0
    }
}

impl fmt::Display for CodeTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, code) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", code)?;
        }
        Ok(())
    }
}

/// Classification table row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRow {
    pub codes: CodeTuple,
    pub class: Class,
    /// Index of the path that produced the row
    pub path: usize,
}

/// Exact-match classification table: code tuple to class
#[derive(Debug, Clone)]
pub struct ClassificationTable {
    rows: Vec<TableRow>,
    index: HashMap<CodeTuple, usize>,
}

impl ClassificationTable {
    /// Rows in path order, each path expanded in ascending code order
    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Exact-match lookup
    pub fn lookup(&self, codes: &CodeTuple) -> Option<Class> {
        self.index.get(codes).map(|&i| self.rows[i].class)
    }
}

/// Per-feature code runs a path expands over
fn code_runs(path: &Path, quantization: &Quantization) -> Result<Option<Vec<RangeInclusive<Code>>>> {
    let mut runs = Vec::with_capacity(path.intervals.len());
    for (index, interval) in path.intervals.iter().enumerate() {
        let table = quantization.table(index);
        let run = if path.constrains(index) {
            match table.codes_covering(interval.lower, interval.upper)? {
                Some(run) => run,
                None => return Ok(None),
            }
        } else {
            // Wildcard: every code of the feature
            0..=(table.len() - 1) as Code
        };
        runs.push(run);
    }
    Ok(Some(runs))
}

fn run_len(run: &RangeInclusive<Code>) -> u64 {
    u64::from(*run.end() - *run.start()) + 1
}

/// Expand `paths` into the classification table.
///
/// Fails with [`CompileError::TableOverflow`] once the cumulative row count
/// passes `budget.max_table_entries`, and with [`CompileError::AmbiguousPath`]
/// if two paths produce the same code tuple.
pub fn assemble(paths: &[Path], quantization: &Quantization, budget: &Budget) -> Result<ClassificationTable> {
    let mut expansions = Vec::with_capacity(paths.len());
    let mut total: u64 = 0;

    for (path_idx, path) in paths.iter().enumerate() {
        let Some(runs) = code_runs(path, quantization)? else {
            continue;
        };

        let rows = runs.iter().map(run_len).fold(1u64, u64::saturating_mul);
        total = total.saturating_add(rows);
        if total > budget.max_table_entries as u64 {
            return Err(CompileError::TableOverflow {
                path: path_idx,
                rows: total,
                budget: budget.max_table_entries,
            });
        }
        expansions.push((path_idx, path.class, runs));
    }

    let mut rows: Vec<TableRow> = Vec::with_capacity(total as usize);
    let mut index: HashMap<CodeTuple, usize> = HashMap::with_capacity(total as usize);

    for (path_idx, class, runs) in expansions {
        let mut current: Vec<Code> = runs.iter().map(|r| *r.start()).collect();
        'expand: loop {
            let codes = CodeTuple(current.clone());
            if let Some(&existing) = index.get(&codes) {
                let first = &rows[existing];
                return Err(CompileError::AmbiguousPath {
                    tuple: codes,
                    first_path: first.path,
                    first_class: first.class,
                    second_path: path_idx,
                    second_class: class,
                });
            }
            index.insert(codes.clone(), rows.len());
            rows.push(TableRow {
                codes,
                class,
                path: path_idx,
            });

            // Odometer step, last feature fastest
            let mut pos = current.len();
            loop {
                if pos == 0 {
                    break 'expand;
                }
                pos -= 1;
                if current[pos] < *runs[pos].end() {
                    current[pos] += 1;
                    break;
                }
                current[pos] = *runs[pos].start();
            }
        }
    }

    tracing::debug!(rows = rows.len(), paths = paths.len(), "Assembled classification table");

    Ok(ClassificationTable { rows, index })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{Feature, FeatureSet};
    use crate::model::{DecisionTree, TreeBuilder};
    use crate::paths::enumerate_paths;
    use crate::quantize::quantize;

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

    fn build(tree: &DecisionTree, budget: &Budget) -> Result<ClassificationTable> {
        let features = features();
        let q = quantize(tree, &features, budget)?;
        let paths = enumerate_paths(tree, &features)?;
        assemble(&paths, &q, budget)
    }

    #[test]
    fn test_wildcard_expansion() {
        let table = build(&reference_tree(), &Budget::default()).unwrap();
        // sttl: 2 codes, sport: 1, dsport: 2 → 4 tuples
        assert_eq!(table.len(), 4);

        let rows: Vec<(String, Class)> = table
            .rows()
            .iter()
            .map(|r| (r.codes.to_string(), r.class))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("0 0 0".to_string(), Class::Normal),
                ("0 0 1".to_string(), Class::Normal),
                ("1 0 0".to_string(), Class::Attack),
                ("1 0 1".to_string(), Class::Normal),
            ]
        );
        assert_eq!(table.lookup(&CodeTuple(vec![1, 0, 0])), Some(Class::Attack));
        assert_eq!(table.lookup(&CodeTuple(vec![2, 0, 0])), None);
    }

    #[test]
    fn test_constrained_feature_spanning_several_codes() {
        // sttl <= 64 -> (sttl <= 32 -> N, else A), else dsport split
        let mut b = TreeBuilder::new();
        let a = b.leaf(Class::Normal);
        let c = b.leaf(Class::Attack);
        let d = b.leaf(Class::Attack);
        let e = b.leaf(Class::Normal);
        let low = b.split(0, 32, a, c);
        let high = b.split(2, 1023, d, e);
        let root = b.split(0, 64, low, high);
        let table = build(&b.build(root), &Budget::default()).unwrap();
        // sttl 3 codes x dsport 2 codes
        assert_eq!(table.len(), 6);
    }

    #[test]
    fn test_overflow_is_reported_not_truncated() {
        let budget = Budget {
            max_table_entries: 3,
            ..Budget::default()
        };
        let err = build(&reference_tree(), &budget).unwrap_err();
        assert!(matches!(
            err,
            CompileError::TableOverflow {
                path: 2,
                rows: 4,
                budget: 3
            }
        ));
        assert_eq!(err.kind(), "TableOverflowError");
    }

    #[test]
    fn test_duplicate_tuples_are_ambiguous() {
        let features = features();
        let tree = reference_tree();
        let q = quantize(&tree, &features, &Budget::default()).unwrap();
        let mut paths = enumerate_paths(&tree, &features).unwrap();
        // Re-adding a path breaks the partition
        let dup = paths[1].clone();
        paths.push(dup);
        let err = assemble(&paths, &q, &Budget::default()).unwrap_err();
        assert!(matches!(
            err,
            CompileError::AmbiguousPath {
                first_path: 1,
                second_path: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_infeasible_path_adds_nothing() {
        let mut b = TreeBuilder::new();
        let a = b.leaf(Class::Attack);
        let c = b.leaf(Class::Normal);
        let d = b.leaf(Class::Normal);
        let inner = b.split(0, 20, a, c);
        let root = b.split(0, 10, inner, d);
        let table = build(&b.build(root), &Budget::default()).unwrap();
        // sttl ranges: [0,10] [11,20] [21,255]; the (<=10, >20) leaf is empty
        assert_eq!(table.len(), 3);
        assert!(table.rows().iter().all(|r| r.path != 1));
    }

    #[test]
    fn test_constant_tree() {
        let table = build(&DecisionTree::constant(Class::Attack), &Budget::default()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].codes, CodeTuple(vec![0, 0, 0]));
        assert_eq!(table.rows()[0].class, Class::Attack);
    }
}
