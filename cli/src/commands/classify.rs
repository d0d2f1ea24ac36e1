//! Classify command

use super::load_inputs;
use anyhow::{bail, Context};
use colored::Colorize;
use planter_dataplane::TablePipeline;
use std::path::Path;

/// Exit code when the tree and a table path disagree
const MISMATCH: i32 = 3;

pub fn handle(
    tree: &Path,
    features: &Path,
    values: &[u32],
    artifact: Option<&Path>,
) -> anyhow::Result<i32> {
    let (tree, features, compiler) = load_inputs(tree, features)?;
    if values.len() != features.len() {
        bail!(
            "expected {} feature values ({}), got {}",
            features.len(),
            features.iter().map(|f| f.label()).collect::<Vec<_>>().join(","),
            values.len()
        );
    }
    let compilation = compiler.compile(&tree, &features)?;

    let expected = tree.evaluate(|id| {
        features
            .index_of(id)
            .map(|index| values[index])
            .unwrap_or_default()
    });
    let codes = compilation.program.encode(values);
    let compiled = compilation.program.classify(values);
    println!("tree:     {}", expected);
    println!("codes:    {}", codes);
    println!("compiled: {}", compiled);

    let mut agree = compiled == expected;
    if let Some(path) = artifact {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading artifact {}", path.display()))?;
        let pipeline = TablePipeline::load(&text, &compiler.config().naming)
            .with_context(|| format!("loading artifact {}", path.display()))?;
        let installed = pipeline.classify(values)?;
        println!("artifact: {}", installed);
        agree &= installed == expected;
    }

    if agree {
        println!("{}", "consistent".green().bold());
        Ok(0)
    } else {
        println!("{}", "MISMATCH".red().bold());
        Ok(MISMATCH)
    }
}
