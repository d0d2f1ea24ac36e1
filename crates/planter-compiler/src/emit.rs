//! Emitter
//!
//! Serializes a [`TableProgram`] into line-oriented switch CLI commands:
//!
//! ```text
//! table_set_default ml_feature_0 set_code_0 0
//! table_add ml_feature_0 set_code_0 0->64 => 0 1
//! table_add ml_feature_0 set_code_0 65->255 => 1 2
//! table_set_default ml_classify set_class 0
//! table_add ml_classify set_class 0 0 => 0
//! ```
//!
//! Tables appear in stage order. Each table's default-action line precedes
//! its entries. Range entries carry a priority since range-match tables
//! require one; ranges are disjoint so its value never decides a match.

use crate::error::Result;
use crate::program::{ClassifyTable, RangeTable, TableProgram};
use std::fmt::Write as _;
use std::path::Path;

/// Command setting a table's default action
pub const SET_DEFAULT: &str = "table_set_default";

/// Command adding a table entry
pub const TABLE_ADD: &str = "table_add";

fn emit_range_table(out: &mut String, table: &RangeTable) {
    let _ = writeln!(
        out,
        "{} {} {} {}",
        SET_DEFAULT, table.name, table.action, table.default_code
    );
    for range in &table.entries {
        let _ = writeln!(
            out,
            "{} {} {} {}->{} => {} {}",
            TABLE_ADD,
            table.name,
            table.action,
            range.lower,
            range.upper,
            range.code,
            u32::from(range.code) + 1
        );
    }
}

fn emit_classify_table(out: &mut String, table: &ClassifyTable) {
    let _ = writeln!(
        out,
        "{} {} {} {}",
        SET_DEFAULT,
        table.name,
        table.action,
        table.default_class.as_u8()
    );
    for row in table.rows() {
        let _ = writeln!(
            out,
            "{} {} {} {} => {}",
            TABLE_ADD,
            table.name,
            table.action,
            row.codes,
            row.class.as_u8()
        );
    }
}

/// Render the whole program as command text
pub fn emit(program: &TableProgram) -> String {
    let mut out = String::new();
    for table in program.feature_tables() {
        emit_range_table(&mut out, table);
    }
    emit_classify_table(&mut out, program.classify_table());
    out
}

/// Write the command artifact to `path`, replacing any previous artifact
pub fn write_artifact(program: &TableProgram, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let text = emit(program);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &text)?;

    tracing::info!(
        path = %path.display(),
        lines = text.lines().count(),
        "Wrote table program"
    );
    Ok(())
}
