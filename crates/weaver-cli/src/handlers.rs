//! Command handlers for CLI operations

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use serde_json::{Map, Value};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};
use weaver_core::{EngineConfig, SharedContext};
use weaver_engine::TaskDispatcher;
use weaver_runtime::WorkerPool;

use crate::builtins;
use crate::manifest::Manifest;

const DEFAULT_FILTER: &str = "weaver_engine=info,weaver_runtime=info";

/// Install the global tracing subscriber, writing to `log_file` or stderr
///
/// # Errors
/// Returns an error if the log file cannot be opened
pub fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        Registry::default()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false)
                    .with_target(true)
                    .with_level(true),
            )
            .init();
    } else {
        Registry::default()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .init();
    }
    Ok(())
}

/// Parse the `--context` argument into an initial shared context
///
/// # Errors
/// Returns an error if the text is not a JSON object
pub fn parse_context(text: Option<&str>) -> Result<SharedContext> {
    let Some(text) = text else {
        return Ok(SharedContext::new());
    };
    let vars: Map<String, Value> =
        serde_json::from_str(text).context("Initial context must be a JSON object")?;
    Ok(SharedContext::from(vars))
}

/// Handle `weaver run`: load the manifest, run the workflow and print the report
///
/// Returns whether the workflow succeeded.
///
/// # Errors
/// Returns an error if the manifest, config or context cannot be loaded, or
/// the workflow does not exist
pub async fn handle_run(
    manifest: PathBuf,
    workflow: String,
    context: Option<String>,
    config: Option<PathBuf>,
) -> Result<bool> {
    let config = EngineConfig::load_or_default(config.as_deref()).unwrap_or_else(|error| {
        tracing::warn!("Failed to load engine config: {error}");
        tracing::warn!("Using default configuration");
        EngineConfig::default()
    });
    let initial = parse_context(context.as_deref())?;
    let store = Manifest::load(&manifest)
        .await
        .with_context(|| format!("Failed to load manifest {}", manifest.display()))?
        .into_store();

    let pool = Arc::new(WorkerPool::new(&config.pool, config.interpreter.clone()));
    let dispatcher = TaskDispatcher::new(
        Arc::new(store),
        Arc::new(builtins::symbols()),
        Arc::clone(&pool),
    )
    .with_config(&config);

    let outcome = dispatcher.execute(&workflow, initial).await;
    pool.cleanup().await;
    let report = outcome?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.success())
}
