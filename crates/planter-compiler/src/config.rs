//! Compiler configuration
//!
//! Budgets and table naming, plus the TOML deployment manifest that carries
//! them together with the fixed feature set.

use crate::error::Result;
use crate::feature::{Feature, FeatureSet};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hardware budgets the compiled program must fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Budget {
    /// Pipeline stages available for range tables; also bounds tree depth
    pub max_stages: usize,
    /// Entries per feature range table
    pub max_ranges_per_feature: usize,
    /// Entries in the combinatorial classification table
    pub max_table_entries: usize,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_stages: 8,
            max_ranges_per_feature: 256,
            max_table_entries: 4096,
        }
    }
}

/// Table and action names used in the emitted commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNaming {
    /// Range table name prefix, suffixed with the feature position
    pub feature_table_prefix: String,
    /// Range table action prefix, suffixed with the feature position
    pub feature_action_prefix: String,
    /// Combinatorial table name
    pub classify_table: String,
    /// Combinatorial table action
    pub classify_action: String,
}

impl Default for TableNaming {
    fn default() -> Self {
        Self {
            feature_table_prefix: "ml_feature_".into(),
            feature_action_prefix: "set_code_".into(),
            classify_table: "ml_classify".into(),
            classify_action: "set_class".into(),
        }
    }
}

impl TableNaming {
    /// Range table name for the feature at `index`
    pub fn feature_table(&self, index: usize) -> String {
        format!("{}{}", self.feature_table_prefix, index)
    }

    /// Range table action for the feature at `index`
    pub fn feature_action(&self, index: usize) -> String {
        format!("{}{}", self.feature_action_prefix, index)
    }
}

/// Compiler configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub budget: Budget,
    pub naming: TableNaming,
}

/// Deployment manifest: configuration plus the fixed feature set
///
/// ```toml
/// [budget]
/// max_table_entries = 4096
///
/// [[features]]
/// id = 0
/// name = "sttl"
/// bit_width = 8
/// min = 0
/// max = 255
/// extraction = { source = "ip_ttl", bits = 8 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub budget: Budget,
    #[serde(default)]
    pub naming: TableNaming,
    pub features: Vec<Feature>,
}

impl Manifest {
    /// Parse a manifest from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a manifest file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Compiler configuration part
    pub fn config(&self) -> CompilerConfig {
        CompilerConfig {
            budget: self.budget,
            naming: self.naming.clone(),
        }
    }

    /// Validated feature set
    pub fn feature_set(&self) -> Result<FeatureSet> {
        FeatureSet::new(self.features.clone())
    }
}
