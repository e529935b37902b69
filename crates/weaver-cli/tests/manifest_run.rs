//! Running manifest workflows through the CLI handlers
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

use std::fs::write;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use weaver_cli::builtins;
use weaver_cli::handlers::{handle_run, parse_context};
use weaver_cli::manifest::Manifest;
use weaver_core::EngineConfig;
use weaver_engine::TaskDispatcher;
use weaver_runtime::WorkerPool;

const MANIFEST: &str = r#"
[[tools]]
name = "adder"
description = "Add two numbers inside a worker"
source = "function add_numbers(a: number, b: number): number { return a + b; }"
function = "add_numbers"
inputs = ["a", "b"]

[[tools]]
name = "doubler"
module = "builtin.math"
symbol = "multiply_by_two"

[[tools]]
name = "formatter"
module = "builtin.math"
symbol = "format_result"

[[tools]]
name = "missing"
module = "builtin.math"
symbol = "square_root"

[[tasks]]
name = "add"
tool = "adder"

[[tasks]]
name = "double"
tool = "doubler"

[[tasks]]
name = "format"
tool = "formatter"

[[tasks]]
name = "root"
tool = "missing"

[[workflows]]
name = "pipeline"
tasks = ["add", "double", "format"]

[[workflows]]
name = "broken"
tasks = ["add", "root", "format"]
"#;

fn workspace() -> (TempDir, PathBuf, PathBuf) {
    let dir = TempDir::new().unwrap();
    let manifest = dir.path().join("workflows.toml");
    write(&manifest, MANIFEST).unwrap();
    let config = dir.path().join("config.toml");
    EngineConfig::default().save_to_file(&config).unwrap();
    (dir, manifest, config)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pipeline_report() {
    let (_dir, manifest, _config) = workspace();
    let store = Manifest::load(&manifest).await.unwrap().into_store();
    let pool = Arc::new(WorkerPool::new(
        &EngineConfig::default().pool,
        EngineConfig::default().interpreter,
    ));
    let dispatcher = TaskDispatcher::new(
        Arc::new(store),
        Arc::new(builtins::symbols()),
        Arc::clone(&pool),
    );

    let initial = parse_context(Some(r#"{"a": 5, "b": 3}"#)).unwrap();
    let report = dispatcher.execute("pipeline", initial).await.unwrap();
    pool.cleanup().await;

    assert_eq!(
        serde_json::to_value(&report).unwrap(),
        json!({
            "success": true,
            "context": {
                "a": 5,
                "b": 3,
                "add_numbers_result": 8,
                "multiply_by_two_result": 16,
                "formatted": "The final result is: 16"
            }
        })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_handle_run_reports_success_and_failure() {
    let (_dir, manifest, config) = workspace();
    let context = Some(r#"{"a": 5, "b": 3}"#.to_owned());

    let succeeded = handle_run(
        manifest.clone(),
        "pipeline".to_owned(),
        context.clone(),
        Some(config.clone()),
    )
    .await
    .unwrap();
    assert!(succeeded);

    let succeeded = handle_run(manifest.clone(), "broken".to_owned(), context, Some(config.clone()))
        .await
        .unwrap();
    assert!(!succeeded);

    assert!(
        handle_run(manifest, "absent".to_owned(), None, Some(config))
            .await
            .is_err()
    );
}
