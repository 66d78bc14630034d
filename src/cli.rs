//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI parser for `projsynth`.
#[derive(Debug, Parser)]
#[command(
    name = "projsynth",
    version,
    about = "Synthesize a complete multi-file project from a description"
)]
pub struct Cli {
    /// Log at debug level (overrides `RUST_LOG`).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full pipeline and print a JSON summary.
    Generate(GenerateArgs),
    /// Score the layout of an existing project directory (no model calls).
    CheckStructure {
        /// Project directory to inspect.
        dir: PathBuf,
        /// Root name used in the report (defaults to the directory name).
        #[arg(long)]
        name: Option<String>,
    },
    /// Align dependency manifests in an existing project with its imports.
    Reconcile {
        /// Project directory to reconcile in place.
        dir: PathBuf,
        /// Report what would change without writing.
        #[arg(long)]
        dry_run: bool,
    },
}

/// Arguments for `projsynth generate`.
#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Project name; also the root folder of the structure.
    #[arg(long)]
    pub name: String,

    /// Natural-language description of the project.
    #[arg(long, conflicts_with = "description_file", required_unless_present = "description_file")]
    pub description: Option<String>,

    /// Read the description from a file.
    #[arg(long)]
    pub description_file: Option<PathBuf>,

    /// Directory to write the project into.
    #[arg(long, short)]
    pub output: PathBuf,

    /// Config file (defaults to `projsynth.toml` when present).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Chat model override.
    #[arg(long)]
    pub model: Option<String>,

    /// Chat backend override (`anthropic` or `ollama`).
    #[arg(long)]
    pub provider: Option<String>,

    /// Senior review cycles, 1 to 3.
    #[arg(long)]
    pub max_review_attempts: Option<u32>,
}
