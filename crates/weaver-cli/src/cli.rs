use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command-line arguments for the weaver CLI
#[derive(Debug, Parser)]
#[command(name = "weaver")]
#[command(about = "Run tool workflows over a shared context", long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one workflow from a manifest
    #[command(about = "Run a workflow defined in a TOML manifest")]
    Run {
        /// Manifest declaring tools, tasks and workflows
        #[arg(short, long, help = "Path to the workflow manifest")]
        manifest: PathBuf,

        /// Workflow to run
        #[arg(short, long, help = "Name of the workflow to run")]
        workflow: String,

        /// Initial context as a JSON object
        #[arg(short, long, help = "Initial context as a JSON object, e.g. '{\"a\": 5}'")]
        context: Option<String>,

        /// Engine configuration file
        #[arg(long, help = "Engine config (defaults to ~/.weaver/config.toml)")]
        config: Option<PathBuf>,

        /// Write logs to this file instead of stderr
        #[arg(long, help = "Write logs to this file")]
        log_file: Option<PathBuf>,
    },
}
