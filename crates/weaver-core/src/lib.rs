//! Core types for the weaver workflow engine.
//!
//! This crate provides the data model shared by the worker runtime and the
//! task dispatcher:
//! - Tool, task and workflow definitions
//! - The shared context threaded through a run
//! - The context propagation convention (input binding and result folding)
//! - A constrained parser for worker results
//! - Error handling and configuration
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

/// Engine configuration loaded from TOML.
pub mod config;
/// Shared context threaded through a workflow run.
pub mod context;
/// Input binding and result folding.
pub mod convention;
/// Error types and result definitions.
pub mod error;
/// Constrained parser for worker result text.
pub mod literal;
/// Tool, task and workflow definitions.
pub mod tool;

pub use config::{
    DispatchConfig, EngineConfig, InterpreterLimits, PoolConfig, SubmissionConfig, WorkerPolicy,
};
pub use context::SharedContext;
pub use convention::{ToolReturn, bind_inputs, fold, result_key};
pub use error::{Error, Result};
pub use literal::parse_literal;
pub use tool::{CodeTool, ImportRef, Task, Tool, ToolKind, ToolRecord, Workflow, WorkflowStep};
