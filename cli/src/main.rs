//! Planter CLI
//!
//! Compiles a trained decision tree into switch table commands.
//!
//! # Usage
//!
//! ```bash
//! planter compile --tree tree.json --features features.toml --output tables.txt
//! planter batch --features features.toml --out-dir build/ trees/*.json
//! planter inspect --tree tree.json --features features.toml --format json
//! planter classify --tree tree.json --features features.toml --values 70,40000,443
//! planter check-contract --features features.toml
//! ```

use clap::{Parser, Subcommand};
use colored::Colorize;
use planter_compiler::CompileError;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "planter")]
#[command(version)]
#[command(about = "Decision tree to match-action table compiler", long_about = None)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile one tree into a command artifact
    Compile {
        /// Tree artifact (native or scikit-learn JSON)
        #[arg(long)]
        tree: PathBuf,
        /// Feature manifest (TOML)
        #[arg(long, env = "PLANTER_FEATURES")]
        features: PathBuf,
        /// Command artifact to write
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Compile several trees in parallel
    Batch {
        /// Feature manifest (TOML)
        #[arg(long, env = "PLANTER_FEATURES")]
        features: PathBuf,
        /// Directory receiving one `<tree>.txt` artifact per tree
        #[arg(long)]
        out_dir: PathBuf,
        /// Tree artifacts
        #[arg(required = true)]
        trees: Vec<PathBuf>,
    },
    /// Show the stage and entry layout of a compiled tree
    Inspect {
        #[arg(long)]
        tree: PathBuf,
        #[arg(long, env = "PLANTER_FEATURES")]
        features: PathBuf,
        /// Output format
        #[arg(long, short, default_value = "table")]
        format: output::OutputFormat,
    },
    /// Classify one feature vector through the tree and the compiled tables
    Classify {
        #[arg(long)]
        tree: PathBuf,
        #[arg(long, env = "PLANTER_FEATURES")]
        features: PathBuf,
        /// Feature values in manifest order
        #[arg(long, value_delimiter = ',', required = true)]
        values: Vec<u32>,
        /// Also run the values through a written command artifact
        #[arg(long)]
        artifact: Option<PathBuf>,
    },
    /// Check feature extraction rules against their declared domains
    CheckContract {
        #[arg(long, env = "PLANTER_FEATURES")]
        features: PathBuf,
        #[arg(long, short, default_value = "table")]
        format: output::OutputFormat,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Kind and exit code of a compiler error anywhere in the chain
fn classify_error(err: &anyhow::Error) -> Option<(&'static str, i32)> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<CompileError>())
        .map(|e| (e.kind(), e.exit_code()))
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Compile {
            tree,
            features,
            output,
        } => commands::compile::handle(&tree, &features, &output),
        Commands::Batch {
            features,
            out_dir,
            trees,
        } => commands::compile::handle_batch(&trees, &features, &out_dir),
        Commands::Inspect {
            tree,
            features,
            format,
        } => commands::inspect::handle(&tree, &features, format),
        Commands::Classify {
            tree,
            features,
            values,
            artifact,
        } => commands::classify::handle(&tree, &features, &values, artifact.as_deref()),
        Commands::CheckContract { features, format } => commands::contract::handle(&features, format),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let (kind, code) = classify_error(&e).unwrap_or(("Error", 1));
            eprintln!("{}: {:#}", format!("error[{}]", kind).red().bold(), e);
            std::process::exit(code);
        }
    }
}
