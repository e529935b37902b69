//! Weaver CLI - run tool workflows from a manifest

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser as _;
use weaver_cli::cli::{Cli, Commands};
use weaver_cli::handlers;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            manifest,
            workflow,
            context,
            config,
            log_file,
        } => {
            handlers::init_logging(log_file.as_deref())?;
            let succeeded = handlers::handle_run(manifest, workflow, context, config).await?;
            Ok(if succeeded {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
