//! Inspect command

use super::load_inputs;
use crate::output::{print_json, print_table, OutputFormat};
use planter_compiler::program::MatchKind;
use planter_compiler::{CompilerStats, ProgramSummary};
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

#[derive(Tabled)]
struct TableLine {
    stage: usize,
    table: String,
    feature: String,
    #[tabled(rename = "match")]
    match_kind: &'static str,
    entries: usize,
}

#[derive(Debug, Serialize, Tabled)]
struct RangeLine {
    feature: String,
    code: u16,
    lower: u32,
    upper: u32,
}

#[derive(Serialize)]
struct InspectReport<'a> {
    summary: ProgramSummary,
    stats: &'a CompilerStats,
    ranges: Vec<RangeLine>,
    paths: Vec<String>,
}

pub fn handle(tree: &Path, features: &Path, format: OutputFormat) -> anyhow::Result<i32> {
    let (tree, features, compiler) = load_inputs(tree, features)?;
    let compilation = compiler.compile(&tree, &features)?;
    let program = &compilation.program;

    let ranges: Vec<RangeLine> = program
        .feature_tables()
        .iter()
        .flat_map(|table| {
            table.entries.iter().map(|r| RangeLine {
                feature: table.feature_name.clone(),
                code: r.code,
                lower: r.lower,
                upper: r.upper,
            })
        })
        .collect();

    let summary = program.summary();
    match format {
        OutputFormat::Json => print_json(&InspectReport {
            summary,
            stats: &compilation.stats,
            ranges,
            paths: compilation.paths.iter().map(ToString::to_string).collect(),
        }),
        OutputFormat::Table => {
            print_table(summary.tables.iter().enumerate().map(|(stage, t)| TableLine {
                stage,
                table: t.name.clone(),
                feature: t.feature.clone().unwrap_or_else(|| "-".to_string()),
                match_kind: match t.match_kind {
                    MatchKind::Range => "range",
                    MatchKind::Exact => "exact",
                },
                entries: t.entries,
            }));
            print_table(ranges);
            println!(
                "{} stages, {} entries, {} attack rows, {} paths ({} infeasible)",
                summary.stages,
                summary.total_entries,
                summary.attack_rows,
                compilation.stats.paths,
                compilation.stats.infeasible_paths
            );
        }
    }
    Ok(0)
}
