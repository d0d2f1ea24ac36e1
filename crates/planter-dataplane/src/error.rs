//! Dataplane errors

use planter_compiler::FeatureId;
use thiserror::Error;

/// Dataplane error
#[derive(Error, Debug)]
pub enum DataplaneError {
    /// Line of the command artifact could not be parsed
    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    /// Command names a table the program does not declare
    #[error("line {line}: unknown table {table}")]
    UnknownTable { line: usize, table: String },

    /// Entry added before the table's default action was set
    #[error("line {line}: entry for {table} precedes its default action")]
    MissingDefault { line: usize, table: String },

    /// Two entries of the classification table share a key
    #[error("line {line}: duplicate key ({key}) in {table}")]
    DuplicateKey {
        line: usize,
        table: String,
        key: String,
    },

    /// Artifact declares no classification table
    #[error("artifact has no classification table {0}")]
    MissingClassifyTable(String),

    /// Feature has no runtime extraction rule
    #[error("feature {0} declares no extraction rule")]
    NoExtraction(FeatureId),

    /// Frame is not an IPv4/IPv6 packet this parser understands
    #[error("unsupported or truncated frame ({0} bytes)")]
    Frame(usize),

    /// Feature vector does not match the pipeline width
    #[error("expected {expected} feature values, got {actual}")]
    Arity { expected: usize, actual: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for dataplane operations
pub type Result<T> = std::result::Result<T, DataplaneError>;
