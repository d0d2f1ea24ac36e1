//! Command artifact loader
//!
//! Reads the `table_set_default` / `table_add` text the compiler emits back
//! into tables, the way the switch CLI would install them. Range tables are
//! taken in the order their default action appears; that order is the stage
//! order.

use crate::error::{DataplaneError, Result};
use planter_compiler::emit::{SET_DEFAULT, TABLE_ADD};
use planter_compiler::{Class, Code, TableNaming};
use std::collections::HashMap;
use std::path::Path;

/// Range entry as installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeEntry {
    pub lower: u32,
    pub upper: u32,
    pub code: Code,
    pub priority: u32,
}

impl RangeEntry {
    /// Whether `value` falls in the entry's range
    #[inline]
    pub fn contains(&self, value: u32) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Installed range table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedRangeTable {
    pub name: String,
    pub action: String,
    pub default_code: Code,
    pub entries: Vec<RangeEntry>,
}

impl LoadedRangeTable {
    /// Matching entry with the lowest priority value, if any
    pub fn lookup(&self, value: u32) -> Option<&RangeEntry> {
        self.entries
            .iter()
            .filter(|e| e.contains(value))
            .min_by_key(|e| e.priority)
    }
}

/// Installed exact-match classification table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedClassifyTable {
    pub name: String,
    pub action: String,
    pub default_class: Class,
    entries: HashMap<Vec<Code>, Class>,
}

impl LoadedClassifyTable {
    /// Exact-match lookup
    pub fn lookup(&self, codes: &[Code]) -> Option<Class> {
        self.entries.get(codes).copied()
    }

    /// Number of installed entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry is installed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Every table of one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedProgram {
    pub range_tables: Vec<LoadedRangeTable>,
    pub classify: LoadedClassifyTable,
}

impl LoadedProgram {
    /// Entries across all tables
    pub fn total_entries(&self) -> usize {
        self.range_tables.iter().map(|t| t.entries.len()).sum::<usize>() + self.classify.len()
    }
}

fn syntax(line: usize, reason: impl Into<String>) -> DataplaneError {
    DataplaneError::Syntax {
        line,
        reason: reason.into(),
    }
}

fn number<T: std::str::FromStr>(line: usize, token: &str, what: &str) -> Result<T> {
    token
        .parse()
        .map_err(|_| syntax(line, format!("invalid {} '{}'", what, token)))
}

fn class(line: usize, token: &str) -> Result<Class> {
    let value: u8 = number(line, token, "class")?;
    Class::from_u8(value).ok_or_else(|| syntax(line, format!("unknown class {}", value)))
}

/// Split `table_add` arguments at `=>` into match keys and action params
fn split_entry<'a>(line: usize, args: &'a [&'a str]) -> Result<(&'a [&'a str], &'a [&'a str])> {
    let arrow = args
        .iter()
        .position(|t| *t == "=>")
        .ok_or_else(|| syntax(line, "missing '=>'"))?;
    Ok((&args[..arrow], &args[arrow + 1..]))
}

#[derive(Default)]
struct Builder {
    range_tables: Vec<LoadedRangeTable>,
    classify: Option<LoadedClassifyTable>,
}

impl Builder {
    fn range_table(&mut self, name: &str) -> Option<&mut LoadedRangeTable> {
        self.range_tables.iter_mut().find(|t| t.name == name)
    }

    fn set_default(&mut self, line: usize, naming: &TableNaming, args: &[&str]) -> Result<()> {
        let [table, action, param] = args else {
            return Err(syntax(line, "expected <table> <action> <param>"));
        };

        if *table == naming.classify_table {
            if self.classify.is_some() {
                return Err(syntax(line, format!("default for {} set twice", table)));
            }
            self.classify = Some(LoadedClassifyTable {
                name: table.to_string(),
                action: action.to_string(),
                default_class: class(line, param)?,
                entries: HashMap::new(),
            });
        } else if table.starts_with(&naming.feature_table_prefix) {
            if self.range_table(table).is_some() {
                return Err(syntax(line, format!("default for {} set twice", table)));
            }
            self.range_tables.push(LoadedRangeTable {
                name: table.to_string(),
                action: action.to_string(),
                default_code: number(line, param, "code")?,
                entries: Vec::new(),
            });
        } else {
            return Err(DataplaneError::UnknownTable {
                line,
                table: table.to_string(),
            });
        }
        Ok(())
    }

    fn add(&mut self, line: usize, naming: &TableNaming, args: &[&str]) -> Result<()> {
        let [table, action, rest @ ..] = args else {
            return Err(syntax(line, "expected <table> <action> <keys> => <params>"));
        };
        let (keys, params) = split_entry(line, rest)?;
        let key_width = self.range_tables.len();

        if *table == naming.classify_table {
            let classify = self.classify.as_mut().ok_or_else(|| DataplaneError::MissingDefault {
                line,
                table: table.to_string(),
            })?;
            if *action != classify.action {
                return Err(syntax(line, format!("action {} not bound to {}", action, table)));
            }
            if keys.len() != key_width {
                return Err(syntax(
                    line,
                    format!("{} keys for {} range tables", keys.len(), key_width),
                ));
            }
            let [param] = params else {
                return Err(syntax(line, "expected one class parameter"));
            };
            let codes = keys
                .iter()
                .map(|k| number::<Code>(line, k, "code"))
                .collect::<Result<Vec<_>>>()?;
            let class = class(line, param)?;
            if classify.entries.contains_key(&codes) {
                return Err(DataplaneError::DuplicateKey {
                    line,
                    table: table.to_string(),
                    key: keys.join(" "),
                });
            }
            classify.entries.insert(codes, class);
            return Ok(());
        }

        let Some(range_table) = self.range_table(table) else {
            return Err(if table.starts_with(&naming.feature_table_prefix) {
                DataplaneError::MissingDefault {
                    line,
                    table: table.to_string(),
                }
            } else {
                DataplaneError::UnknownTable {
                    line,
                    table: table.to_string(),
                }
            });
        };
        if *action != range_table.action {
            return Err(syntax(line, format!("action {} not bound to {}", action, table)));
        }
        let ([key], [code, priority]) = (keys, params) else {
            return Err(syntax(line, "expected <lo>-><hi> => <code> <priority>"));
        };
        let (lower, upper) = key
            .split_once("->")
            .ok_or_else(|| syntax(line, format!("range key '{}' missing '->'", key)))?;
        let entry = RangeEntry {
            lower: number(line, lower, "range bound")?,
            upper: number(line, upper, "range bound")?,
            code: number(line, code, "code")?,
            priority: number(line, priority, "priority")?,
        };
        if entry.lower > entry.upper {
            return Err(syntax(line, format!("empty range {}", key)));
        }
        range_table.entries.push(entry);
        Ok(())
    }
}

/// Parse command text into installed tables
pub fn load(text: &str, naming: &TableNaming) -> Result<LoadedProgram> {
    let mut builder = Builder::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        let Some((command, args)) = tokens.split_first() else {
            continue;
        };
        match *command {
            SET_DEFAULT => builder.set_default(line, naming, args)?,
            TABLE_ADD => builder.add(line, naming, args)?,
            other => return Err(syntax(line, format!("unknown command {}", other))),
        }
    }

    let classify = builder
        .classify
        .ok_or_else(|| DataplaneError::MissingClassifyTable(naming.classify_table.clone()))?;

    tracing::debug!(
        range_tables = builder.range_tables.len(),
        classify_entries = classify.len(),
        "Loaded table program"
    );

    Ok(LoadedProgram {
        range_tables: builder.range_tables,
        classify,
    })
}

/// Load a command artifact file
pub fn load_file(path: impl AsRef<Path>, naming: &TableNaming) -> Result<LoadedProgram> {
    let text = std::fs::read_to_string(path)?;
    load(&text, naming)
}
