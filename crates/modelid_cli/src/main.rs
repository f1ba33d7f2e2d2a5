//! modelid CLI
//!
//! Command-line tools for modelid model files.
//!
//! # Commands
//!
//! - `merge` - Merge a binding description into a model file
//! - `inspect` - Display model entities, counters and retired UIDs
//! - `validate` - Check a model file's identity invariants

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// modelid command-line model tools.
#[derive(Parser)]
#[command(name = "modelid")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the model file
    #[arg(global = true, short, long)]
    model: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a binding description into the model
    Merge {
        /// Binding description (JSON)
        #[arg(short, long)]
        binding: PathBuf,

        /// Write the annotated binding here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Remove model entities the binding no longer declares
        #[arg(long)]
        prune: bool,

        /// Reconcile in memory only, leave the model file untouched
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Display model entities, counters and retired UIDs
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check the model's identity invariants
    Validate,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Merge {
            binding,
            out,
            prune,
            dry_run,
        } => {
            let model = cli.model.ok_or("Model path required for merge")?;
            commands::merge::run(&model, &binding, out.as_deref(), prune, dry_run)?;
        }
        Commands::Inspect { format } => {
            let model = cli.model.ok_or("Model path required for inspect")?;
            commands::inspect::run(&model, &format)?;
        }
        Commands::Validate => {
            let model = cli.model.ok_or("Model path required for validate")?;
            commands::validate::run(&model)?;
        }
        Commands::Version => {
            println!("modelid CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("modelid Core v{}", modelid_core::VERSION);
            println!("Model version {}", modelid_core::MODEL_VERSION);
        }
    }

    Ok(())
}
