//! Planter Data Plane Reference
//!
//! Software model of the switch side of a compiled tree program:
//!
//! ```text
//! frame ──► extract ──► range stages ──► classify stage ──► verdict
//!           (bit slices) (value → code)   (codes → class)
//! ```
//!
//! - **extract**: L3/L4 field parsing and per-feature bit slicing
//! - **contract**: extraction rules checked against feature descriptors
//! - **loader**: emitted `table_set_default` / `table_add` text back into tables
//! - **pipeline**: stage-by-stage match-action simulation with default actions

pub mod contract;
pub mod error;
pub mod extract;
pub mod loader;
pub mod pipeline;
pub mod stats;

pub use contract::{check, ContractReport, ContractViolation, Violation};
pub use error::{DataplaneError, Result};
pub use extract::{extract, FeatureExtractor, FlowCounters, PacketFields};
pub use loader::{load, load_file, LoadedProgram};
pub use pipeline::{PipelineContext, Stage, TablePipeline};
pub use stats::{PipelineStats, PipelineStatsSnapshot};
