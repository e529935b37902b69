//! Weaver worker - one isolated interpreter serving commands over stdio

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};
use weaver_core::InterpreterLimits;

/// Command-line arguments passed by the worker pool
#[derive(Debug, Parser)]
#[command(name = "weaver-worker")]
#[command(about = "Serve one weaver interpreter over stdin and stdout", long_about = None)]
struct Args {
    /// Worker id, used in log lines
    #[arg(long)]
    id: String,

    /// Maximum iterations of any single loop
    #[arg(long)]
    loop_iteration_limit: Option<u64>,

    /// Maximum call recursion depth
    #[arg(long, default_value_t = InterpreterLimits::default().recursion_limit)]
    recursion_limit: usize,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Stdout carries the protocol; logs go to stderr
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "weaver_runtime=warn".into());
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .init();

    let limits = InterpreterLimits {
        loop_iteration_limit: args.loop_iteration_limit,
        recursion_limit: args.recursion_limit,
    };
    match weaver_runtime::serve(&args.id, &limits, io::stdin().lock(), io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::warn!(worker_id = %args.id, "Worker stopped serving: {err}");
            ExitCode::FAILURE
        }
    }
}
