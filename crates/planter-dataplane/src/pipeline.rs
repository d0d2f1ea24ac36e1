//! Table Pipeline
//!
//! Range stage per feature → exact-match classification stage
//!
//! A software model of the installed match-action program. Every stage
//! always produces a value: a table miss runs the table's default action.

use crate::error::{DataplaneError, Result};
use crate::extract::{FeatureExtractor, FlowCounters};
use crate::loader::{self, LoadedClassifyTable, LoadedProgram, LoadedRangeTable};
use crate::stats::PipelineStats;
use planter_compiler::{Class, Code, TableNaming};

/// Per-packet metadata carried between stages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineContext {
    /// Extracted feature values, descriptor order
    pub values: Vec<u32>,
    /// Codes written by the range stages
    pub codes: Vec<Code>,
    /// Verdict of the classification stage
    pub class: Class,
    /// Stages that fell back to their default action
    pub misses: Vec<&'static str>,
}

/// Pipeline stage trait
pub trait Stage: Send + Sync {
    fn process(&self, ctx: &mut PipelineContext, stats: &PipelineStats);
    fn name(&self) -> &str;
}

// ============================================================================
// Range stage: feature value → code
// ============================================================================

pub struct RangeStage {
    position: usize,
    table: LoadedRangeTable,
}

impl RangeStage {
    pub fn new(position: usize, table: LoadedRangeTable) -> Self {
        Self { position, table }
    }
}

impl Stage for RangeStage {
    fn process(&self, ctx: &mut PipelineContext, stats: &PipelineStats) {
        let value = ctx.values[self.position];
        let code = match self.table.lookup(value) {
            Some(entry) => entry.code,
            None => {
                stats.record_range_miss();
                ctx.misses.push("range");
                self.table.default_code
            }
        };
        ctx.codes.push(code);
    }

    fn name(&self) -> &str {
        &self.table.name
    }
}

// ============================================================================
// Classify stage: code tuple → class
// ============================================================================

pub struct ClassifyStage {
    table: LoadedClassifyTable,
}

impl ClassifyStage {
    pub fn new(table: LoadedClassifyTable) -> Self {
        Self { table }
    }
}

impl Stage for ClassifyStage {
    fn process(&self, ctx: &mut PipelineContext, stats: &PipelineStats) {
        ctx.class = match self.table.lookup(&ctx.codes) {
            Some(class) => class,
            None => {
                stats.record_classify_miss();
                ctx.misses.push("classify");
                self.table.default_class
            }
        };
    }

    fn name(&self) -> &str {
        &self.table.name
    }
}

/// Installed table pipeline
pub struct TablePipeline {
    stages: Vec<Box<dyn Stage>>,
    width: usize,
    stats: PipelineStats,
}

impl TablePipeline {
    /// Lay loaded tables out as stages
    pub fn new(program: LoadedProgram) -> Self {
        let width = program.range_tables.len();
        let mut stages: Vec<Box<dyn Stage>> = program
            .range_tables
            .into_iter()
            .enumerate()
            .map(|(position, table)| Box::new(RangeStage::new(position, table)) as Box<dyn Stage>)
            .collect();
        stages.push(Box::new(ClassifyStage::new(program.classify)));

        Self {
            stages,
            width,
            stats: PipelineStats::default(),
        }
    }

    /// Load a pipeline from emitted command text
    pub fn load(text: &str, naming: &TableNaming) -> Result<Self> {
        Ok(Self::new(loader::load(text, naming)?))
    }

    /// Run one feature vector through every stage
    #[inline]
    pub fn process(&self, values: &[u32]) -> Result<PipelineContext> {
        if values.len() != self.width {
            return Err(DataplaneError::Arity {
                expected: self.width,
                actual: values.len(),
            });
        }

        let mut ctx = PipelineContext {
            values: values.to_vec(),
            codes: Vec::with_capacity(self.width),
            ..PipelineContext::default()
        };
        self.stats.record_packet();
        for stage in &self.stages {
            stage.process(&mut ctx, &self.stats);
        }
        if ctx.class == Class::Attack {
            self.stats.record_attack();
        }
        Ok(ctx)
    }

    /// Verdict for one feature vector
    pub fn classify(&self, values: &[u32]) -> Result<Class> {
        Ok(self.process(values)?.class)
    }

    /// Extract features from a raw frame and classify it
    pub fn classify_frame(
        &self,
        extractor: &FeatureExtractor,
        frame: &[u8],
        counters: &FlowCounters,
    ) -> Result<Class> {
        let values = extractor.extract_frame(frame, counters)?;
        self.classify(&values)
    }

    /// Stage names in pipeline order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Feature values expected per packet
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }
}
