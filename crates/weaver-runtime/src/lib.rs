//! Isolated execution workers for the weaver workflow engine.
//!
//! This crate provides:
//! - `ExecutionWorker`: one Boa interpreter in a `weaver-worker` child process
//! - `WorkerPool` for bounded start, stop and cleanup of workers
//! - The asynchronous submission protocol over a worker's event stream
//! - Program synthesis for code tools and best-effort source formatting
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        reason = "Allow for tests"
    )
)]

/// Source canonicalization through swc.
pub mod format;
/// Bounded blocking offload.
pub mod offload;
/// Worker pool registry.
pub mod pool;
/// Program synthesis for code tools.
pub mod program;
/// Worker event protocol.
pub mod protocol;
/// Submission protocol.
pub mod submission;
/// Execution workers.
mod worker;

pub use offload::BlockingOffload;
pub use pool::{WorkerPool, WorkerStats};
pub use program::synthesize;
pub use submission::{Submission, SubmissionOutput, SubmitOptions, submit};
pub use worker::{
    ExecutionWorker, WORKER_PROGRAM_ENV, WorkerId, WorkerStatus, locate_worker_program, serve,
};
