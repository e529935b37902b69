//! Submission protocol tests against live workers
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

use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use weaver_core::{CodeTool, Error, InterpreterLimits, PoolConfig, SharedContext, parse_literal};
use weaver_runtime::{SubmitOptions, WorkerId, WorkerPool, submit, synthesize};

async fn pool_with_worker() -> (WorkerPool, WorkerId) {
    let config = PoolConfig {
        worker_program: Some(PathBuf::from(env!("CARGO_BIN_EXE_weaver-worker"))),
        ..PoolConfig::default()
    };
    let pool = WorkerPool::new(&config, InterpreterLimits::default());
    let id = pool.start(None).await.unwrap();
    (pool, id)
}

fn quick() -> SubmitOptions {
    SubmitOptions {
        timeout: Duration::from_secs(10),
        poll_interval: Duration::from_millis(50),
        auto_format: true,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_output_and_result_are_collected() {
    let (pool, id) = pool_with_worker().await;

    let submission = submit(&pool, &id, "console.log('working'); 5 + 3", &quick()).await;
    assert_eq!(submission.worker_id, id);
    let output = submission.outcome.unwrap();
    assert_eq!(output.output, "working\n8");
    assert_eq!(output.result.as_deref(), Some("8"));

    pool.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_typescript_annotations_are_stripped() {
    let (pool, id) = pool_with_worker().await;

    let source = "const double = (value: number): number => value * 2; double(21)";
    let output = submit(&pool, &id, source, &quick()).await.outcome.unwrap();
    assert_eq!(output.result.as_deref(), Some("42"));

    pool.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unformattable_source_is_still_submitted() {
    let (pool, id) = pool_with_worker().await;

    let submission = submit(&pool, &id, "let = = ;", &quick()).await;
    match submission.outcome {
        Err(Error::RemoteExecution { name, .. }) => assert_eq!(name, "SyntaxError"),
        other => panic!("expected a syntax error from the worker, got {other:?}"),
    }

    pool.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_error_event_wins_over_partial_output() {
    let (pool, id) = pool_with_worker().await;

    let source = "console.log('partial'); throw new TypeError('boom');";
    let submission = submit(&pool, &id, source, &quick()).await;
    match submission.outcome {
        Err(Error::RemoteExecution { name, message }) => {
            assert_eq!(name, "TypeError");
            assert_eq!(message, "boom");
        }
        other => panic!("expected remote error, got {other:?}"),
    }

    pool.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timeout_is_bounded_by_poll_interval() {
    let (pool, id) = pool_with_worker().await;
    let options = SubmitOptions {
        timeout: Duration::from_millis(300),
        poll_interval: Duration::from_millis(100),
        auto_format: false,
    };

    let submission = submit(
        &pool,
        &id,
        "const end = Date.now() + 1500; while (Date.now() < end) {}",
        &options,
    )
    .await;

    assert!(submission.timed_out());
    assert!(submission.elapsed >= options.timeout);
    assert!(submission.elapsed < options.timeout + options.poll_interval);
    // The worker survives a timeout
    assert!(pool.contains(&id));

    pool.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_synthesized_program_round_trip() {
    let (pool, id) = pool_with_worker().await;
    let tool = CodeTool {
        source: "function add_numbers(a: number, b: number) { return a + b; }".to_owned(),
        function: "add_numbers".to_owned(),
        inputs: vec!["a".to_owned(), "b".to_owned()],
    };
    let mut context = SharedContext::new();
    context.insert("a", json!(5));
    context.insert("b", json!(3));

    let program = synthesize(&tool, &context).unwrap();
    let output = submit(&pool, &id, &program, &quick()).await.outcome.unwrap();
    let value = parse_literal(output.result.as_deref().unwrap()).unwrap();
    assert_eq!(value, json!(8));

    // Same worker again: no redeclaration errors
    let output = submit(&pool, &id, &program, &quick()).await.outcome.unwrap();
    assert_eq!(output.result.as_deref(), Some("8"));

    pool.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_input_maps_to_convention_error() {
    let (pool, id) = pool_with_worker().await;
    let tool = CodeTool {
        source: "function add_numbers(a, b) { return a + b; }".to_owned(),
        function: "add_numbers".to_owned(),
        inputs: vec!["a".to_owned(), "b".to_owned()],
    };
    let mut context = SharedContext::new();
    context.insert("a", json!(5));

    let program = synthesize(&tool, &context).unwrap();
    let submission = submit(&pool, &id, &program, &quick()).await;
    assert!(matches!(
        submission.outcome,
        Err(Error::MissingRequiredInput { ref input }) if input == "b"
    ));

    pool.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_return_yields_no_result() {
    let (pool, id) = pool_with_worker().await;
    let tool = CodeTool {
        source: "function noop() {}".to_owned(),
        function: "noop".to_owned(),
        inputs: Vec::new(),
    };

    let program = synthesize(&tool, &SharedContext::new()).unwrap();
    let output = submit(&pool, &id, &program, &quick()).await.outcome.unwrap();
    assert_eq!(output.result, None);

    pool.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_proto_key_binds_like_any_other() {
    let (pool, id) = pool_with_worker().await;
    let tool = CodeTool {
        source: "function echo(value) { return value; }".to_owned(),
        function: "echo".to_owned(),
        inputs: vec!["__proto__".to_owned()],
    };
    let mut context = SharedContext::new();
    context.insert("__proto__", json!({"nested": 7}));

    let program = synthesize(&tool, &context).unwrap();
    let output = submit(&pool, &id, &program, &quick()).await.outcome.unwrap();
    let value = parse_literal(output.result.as_deref().unwrap()).unwrap();
    assert_eq!(value, json!({"nested": 7}));

    pool.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_oversized_result_is_a_remote_error() {
    let (pool, id) = pool_with_worker().await;

    let source = "var huge = []; huge.length = 4294967295; huge";
    let submission = submit(&pool, &id, source, &quick()).await;
    match submission.outcome {
        Err(Error::RemoteExecution { name, .. }) => assert_eq!(name, "RangeError"),
        other => panic!("expected a range error from the worker, got {other:?}"),
    }
    // The worker survives and keeps serving
    let output = submit(&pool, &id, "1 + 1", &quick()).await.outcome.unwrap();
    assert_eq!(output.result.as_deref(), Some("2"));

    pool.cleanup().await;
}
