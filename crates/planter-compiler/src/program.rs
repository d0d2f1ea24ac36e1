//! Table program
//!
//! The compiled artifact: one range table per feature followed by the
//! exact-match classification table, each with a declared default action.
//! A program is built once per compilation and never mutated.

use crate::assemble::{ClassificationTable, CodeTuple, TableRow};
use crate::config::CompilerConfig;
use crate::error::{CompileError, Result};
use crate::feature::{FeatureId, FeatureSet};
use crate::model::Class;
use crate::quantize::{Code, Quantization, Range};
use serde::Serialize;

/// Range-match table for one feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeTable {
    pub name: String,
    pub action: String,
    pub feature: FeatureId,
    pub feature_name: String,
    /// Match key width in bits
    pub bit_width: u8,
    pub entries: Vec<Range>,
    /// Code set when no entry matches
    pub default_code: Code,
}

impl RangeTable {
    /// Code for `value`, falling back to the default action on a miss
    pub fn apply(&self, value: u32) -> Code {
        let idx = self.entries.partition_point(|r| r.upper < value);
        self.entries
            .get(idx)
            .filter(|r| r.contains(value))
            .map(|r| r.code)
            .unwrap_or(self.default_code)
    }
}

/// Exact-match classification table
#[derive(Debug, Clone)]
pub struct ClassifyTable {
    pub name: String,
    pub action: String,
    /// Class set when no entry matches
    pub default_class: Class,
    table: ClassificationTable,
}

impl ClassifyTable {
    /// Table rows
    pub fn rows(&self) -> &[TableRow] {
        self.table.rows()
    }

    /// Class for a code tuple, falling back to the default action on a miss
    pub fn apply(&self, codes: &CodeTuple) -> Class {
        self.table.lookup(codes).unwrap_or(self.default_class)
    }
}

/// Compiled match-action program
#[derive(Debug, Clone)]
pub struct TableProgram {
    feature_tables: Vec<RangeTable>,
    classify: ClassifyTable,
}

impl TableProgram {
    /// Lay out the tables and check the pipeline stage budget.
    ///
    /// Range tables take one stage each, in descriptor order; the
    /// classification table takes one more.
    pub fn new(
        features: &FeatureSet,
        quantization: &Quantization,
        table: ClassificationTable,
        config: &CompilerConfig,
    ) -> Result<Self> {
        if features.len() > config.budget.max_stages {
            return Err(CompileError::StageBudgetExceeded {
                tables: features.len(),
                budget: config.budget.max_stages,
            });
        }

        let feature_tables = features
            .iter()
            .zip(quantization.tables())
            .enumerate()
            .map(|(index, (feature, ranges))| RangeTable {
                name: config.naming.feature_table(index),
                action: config.naming.feature_action(index),
                feature: feature.id,
                feature_name: feature.label(),
                bit_width: feature.bit_width,
                entries: ranges.ranges().to_vec(),
                default_code: 0,
            })
            .collect();

        Ok(Self {
            feature_tables,
            classify: ClassifyTable {
                name: config.naming.classify_table.clone(),
                action: config.naming.classify_action.clone(),
                default_class: Class::Normal,
                table,
            },
        })
    }

    /// Range tables in stage order
    pub fn feature_tables(&self) -> &[RangeTable] {
        &self.feature_tables
    }

    /// Classification table
    pub fn classify_table(&self) -> &ClassifyTable {
        &self.classify
    }

    /// Pipeline stages used, classification table included
    pub fn stages(&self) -> usize {
        self.feature_tables.len() + 1
    }

    /// Total entries across all tables
    pub fn total_entries(&self) -> usize {
        self.feature_tables
            .iter()
            .map(|t| t.entries.len())
            .sum::<usize>()
            + self.classify.rows().len()
    }

    /// Run feature values (descriptor order) through the range tables
    pub fn encode(&self, values: &[u32]) -> CodeTuple {
        CodeTuple(
            self.feature_tables
                .iter()
                .zip(values)
                .map(|(table, &value)| table.apply(value))
                .collect(),
        )
    }

    /// Classify feature values (descriptor order) the way the switch would
    pub fn classify(&self, values: &[u32]) -> Class {
        self.classify.apply(&self.encode(values))
    }

    /// Table sizes and stage usage
    pub fn summary(&self) -> ProgramSummary {
        let mut tables: Vec<TableSummary> = self
            .feature_tables
            .iter()
            .map(|t| TableSummary {
                name: t.name.clone(),
                feature: Some(t.feature_name.clone()),
                match_kind: MatchKind::Range,
                entries: t.entries.len(),
            })
            .collect();
        tables.push(TableSummary {
            name: self.classify.name.clone(),
            feature: None,
            match_kind: MatchKind::Exact,
            entries: self.classify.rows().len(),
        });

        let attack_rows = self
            .classify
            .rows()
            .iter()
            .filter(|r| r.class == Class::Attack)
            .count();

        ProgramSummary {
            stages: self.stages(),
            total_entries: self.total_entries(),
            attack_rows,
            tables,
        }
    }
}

/// Match kind of a table key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Range,
    Exact,
}

/// Per-table line of a [`ProgramSummary`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    pub match_kind: MatchKind,
    pub entries: usize,
}

/// Shape of a compiled program
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramSummary {
    pub stages: usize,
    pub total_entries: usize,
    /// Classification rows mapped to Attack
    pub attack_rows: usize,
    pub tables: Vec<TableSummary>,
}
