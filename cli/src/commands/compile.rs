//! Compile commands

use super::{load_inputs, load_manifest};
use anyhow::Context;
use colored::Colorize;
use planter_compiler::{load_tree, write_artifact, TreeCompiler};
use std::path::{Path, PathBuf};

pub fn handle(tree: &Path, features: &Path, output: &Path) -> anyhow::Result<i32> {
    let (tree, features, compiler) = load_inputs(tree, features)?;
    let compilation = compiler.compile(&tree, &features)?;
    write_artifact(&compilation.program, output)?;

    let stats = &compilation.stats;
    println!(
        "{} {} ({} stages, {} range entries, {} classify rows, {}us)",
        "compiled".green().bold(),
        output.display(),
        stats.stages,
        stats.range_entries,
        stats.table_rows,
        stats.compile_time_us
    );
    Ok(0)
}

fn artifact_path(out_dir: &Path, tree: &Path) -> PathBuf {
    let stem = tree
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tree".to_string());
    out_dir.join(format!("{}.txt", stem))
}

/// Compile every tree; a failing tree does not stop the others
pub fn handle_batch(trees: &[PathBuf], features: &Path, out_dir: &Path) -> anyhow::Result<i32> {
    let (manifest, feature_set) = load_manifest(features)?;
    let compiler = TreeCompiler::new(manifest.config());

    let loaded = trees
        .iter()
        .map(|path| load_tree(path).with_context(|| format!("loading tree {}", path.display())))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let results = compiler.compile_batch(&loaded, &feature_set);

    let mut exit = 0;
    for (path, result) in trees.iter().zip(results) {
        match result {
            Ok(compilation) => {
                let output = artifact_path(out_dir, path);
                write_artifact(&compilation.program, &output)?;
                println!(
                    "{} {} -> {} ({} rows)",
                    "ok".green(),
                    path.display(),
                    output.display(),
                    compilation.stats.table_rows
                );
            }
            Err(e) => {
                println!("{} {}: [{}] {}", "failed".red(), path.display(), e.kind(), e);
                if exit == 0 {
                    exit = e.exit_code();
                }
            }
        }
    }
    Ok(exit)
}
