//! TOML workflow manifests.
//!
//! ```toml
//! [[tools]]
//! name = "adder"
//! source = "function add_numbers(a, b) { return a + b; }"
//! function = "add_numbers"
//! inputs = ["a", "b"]
//!
//! [[tools]]
//! name = "doubler"
//! module = "builtin.math"
//! symbol = "multiply_by_two"
//!
//! [[tasks]]
//! name = "add"
//! tool = "adder"
//!
//! [[workflows]]
//! name = "pipeline"
//! tasks = ["add", "double"]
//! ```

use std::path::Path;

use serde::Deserialize;
use weaver_core::{Result, Task, ToolRecord};
use weaver_engine::MemoryStore;

/// Workflow entry of a manifest; tasks run in the listed order.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowEntry {
    /// Workflow name
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Task names in execution order
    #[serde(default)]
    pub tasks: Vec<String>,
}

/// Tools, tasks and workflows declared in one file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Raw tool records
    pub tools: Vec<ToolRecord>,
    /// Tasks
    pub tasks: Vec<Task>,
    /// Workflows
    pub workflows: Vec<WorkflowEntry>,
}

impl Manifest {
    /// Parse a manifest from TOML text
    ///
    /// # Errors
    /// Returns an error if the text is not a valid manifest
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a manifest file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        Self::parse(&text)
    }

    /// Load every declaration into a fresh in-memory store
    pub fn into_store(self) -> MemoryStore {
        let store = MemoryStore::new();
        for tool in self.tools {
            store.insert_tool(tool);
        }
        for task in self.tasks {
            store.insert_task(task);
        }
        for workflow in self.workflows {
            store.create_workflow(&workflow.name, &workflow.description, &workflow.tasks);
        }
        store
    }
}
