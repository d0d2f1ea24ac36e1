//! Extraction contract command

use super::load_manifest;
use crate::output::OutputFormat;
use colored::Colorize;
use planter_dataplane::check;
use std::path::Path;
use tabled::Tabled;

/// Exit code when a feature violates the contract
const VIOLATED: i32 = 4;

#[derive(Tabled)]
struct ViolationLine {
    feature: String,
    id: u32,
    violation: String,
}

pub fn handle(features: &Path, format: OutputFormat) -> anyhow::Result<i32> {
    let (_, feature_set) = load_manifest(features)?;
    let report = check(&feature_set);

    format.print(
        &report,
        report.violations.iter().map(|v| ViolationLine {
            feature: v.name.clone(),
            id: v.feature.0,
            violation: v.violation.to_string(),
        }),
    );

    if report.is_clean() {
        eprintln!("{} {} features honour their extraction rules", "ok".green(), report.checked);
        Ok(0)
    } else {
        eprintln!(
            "{} {} violations across {} features",
            "violated".red().bold(),
            report.violations.len(),
            report.checked
        );
        Ok(VIOLATED)
    }
}
