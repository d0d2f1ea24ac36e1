//! Output formatting

use clap::ValueEnum;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    /// Print `rows` as a table, or `data` as JSON
    pub fn print<T, R>(&self, data: &T, rows: impl IntoIterator<Item = R>)
    where
        T: Serialize,
        R: Tabled,
    {
        match self {
            OutputFormat::Json => print_json(data),
            OutputFormat::Table => print_table(rows),
        }
    }
}

pub fn print_json<T: Serialize>(data: &T) {
    println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
}

pub fn print_table<R: Tabled>(rows: impl IntoIterator<Item = R>) {
    println!("{}", Table::new(rows).with(Style::rounded()));
}
