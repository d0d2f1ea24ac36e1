//! Error types for tree compilation
//!
//! Every variant is fatal to the compilation attempt that raised it. Nothing
//! is retried or downgraded; the first error aborts the whole compile.

use crate::assemble::CodeTuple;
use crate::feature::FeatureId;
use crate::model::{Class, NodeId};
use thiserror::Error;

/// Why a feature could not be quantized
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantizationFault {
    /// A split threshold lies outside the declared feature domain
    #[error("threshold {threshold} at node {node} outside domain [{min}, {max}]")]
    ThresholdOutOfDomain {
        node: NodeId,
        threshold: i64,
        min: u32,
        max: u32,
    },

    /// The feature needs more ranges than its table may hold
    #[error("{count} ranges exceed the per-feature budget of {budget}")]
    TooManyRanges { count: usize, budget: usize },

    /// A path interval does not start or end on a range edge
    #[error("interval [{lower}, {upper}] is not aligned to range edges")]
    MisalignedInterval { lower: i64, upper: i64 },
}

/// Tree compiler error
#[derive(Error, Debug)]
pub enum CompileError {
    /// Feature domain could not be turned into a valid range table
    #[error("quantization failed for feature {feature}: {fault}")]
    Quantization {
        feature: FeatureId,
        fault: QuantizationFault,
    },

    /// The tree splits on a feature the descriptor does not declare
    #[error("node {node} splits on undeclared feature {feature}")]
    UnknownFeature { feature: FeatureId, node: NodeId },

    /// Wildcard expansion produced more rows than the classification table holds
    #[error("path {path} brings the classification table to {rows} rows, budget is {budget}")]
    TableOverflow {
        path: usize,
        rows: u64,
        budget: usize,
    },

    /// Two paths expanded to the same code tuple
    #[error(
        "code tuple ({tuple}) produced by path {first_path} ({first_class}) \
         and path {second_path} ({second_class})"
    )]
    AmbiguousPath {
        tuple: CodeTuple,
        first_path: usize,
        first_class: Class,
        second_path: usize,
        second_class: Class,
    },

    /// Tree arena is not a well-formed rooted binary tree
    #[error("malformed tree at node {node}: {reason}")]
    MalformedTree { node: NodeId, reason: String },

    /// Tree is deeper than the pipeline allows
    #[error("tree depth {depth} exceeds the stage budget of {budget}")]
    DepthExceeded { depth: usize, budget: usize },

    /// More range tables than pipeline stages
    #[error("{tables} feature tables exceed the pipeline stage limit of {budget}")]
    StageBudgetExceeded { tables: usize, budget: usize },

    /// Feature descriptor is inconsistent
    #[error("invalid feature {feature}: {reason}")]
    InvalidFeature { feature: FeatureId, reason: String },

    /// Tree artifact or manifest could not be read or decoded
    #[error("artifact error: {0}")]
    Artifact(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML decoding error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CompileError {
    /// Stable error kind name printed by the CLI
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Quantization { .. } => "QuantizationError",
            Self::UnknownFeature { .. } => "UnknownFeatureError",
            Self::TableOverflow { .. } => "TableOverflowError",
            Self::AmbiguousPath { .. } => "AmbiguousPathError",
            Self::MalformedTree { .. } => "MalformedTreeError",
            Self::DepthExceeded { .. } => "DepthExceededError",
            Self::StageBudgetExceeded { .. } => "StageBudgetError",
            Self::InvalidFeature { .. } => "InvalidFeatureError",
            Self::Artifact(_) | Self::Io(_) | Self::Json(_) | Self::Toml(_) => "ArtifactError",
        }
    }

    /// Process exit code for this error kind
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Quantization { .. } => 10,
            Self::UnknownFeature { .. } => 11,
            Self::TableOverflow { .. } => 12,
            Self::AmbiguousPath { .. } => 13,
            Self::MalformedTree { .. } => 14,
            Self::DepthExceeded { .. } => 15,
            Self::StageBudgetExceeded { .. } => 16,
            Self::InvalidFeature { .. } => 17,
            Self::Artifact(_) | Self::Io(_) | Self::Json(_) | Self::Toml(_) => 2,
        }
    }
}

/// Result type for tree compilation
pub type Result<T> = std::result::Result<T, CompileError>;
