//! Library interface for weaver-cli
//!
//! Exposes the manifest loader, built-in functions and handlers for
//! integration testing
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

/// Built-in import functions.
pub mod builtins;
/// Command-line argument definitions.
pub mod cli;
/// Command handlers.
pub mod handlers;
/// Workflow manifest loading.
pub mod manifest;
