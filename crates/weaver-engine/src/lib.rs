//! Workflow execution for the weaver engine.
//!
//! This crate provides:
//! - `TaskDispatcher` running a workflow's tasks in order over one context
//! - The `KnowledgeStore` seam and an in-memory implementation
//! - The `SymbolResolver` seam for in-process import tools
//! - `RunReport` describing the outcome of a run
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

/// Sequential task dispatcher.
pub mod dispatcher;
/// Run outcome reporting.
pub mod report;
/// Import reference resolution.
pub mod resolver;
/// Workflow, task and tool lookup.
pub mod store;

pub use dispatcher::TaskDispatcher;
pub use report::{RunReport, RunState, TaskFailure};
pub use resolver::{FnTool, SymbolResolver, SymbolTable, ToolFunction};
pub use store::{KnowledgeStore, MemoryStore};
