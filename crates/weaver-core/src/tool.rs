//! Tool, task and workflow definitions.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Embedded-source tool logic run inside an execution worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeTool {
    /// JavaScript or TypeScript source defining `function`
    pub source: String,
    /// Name of the entry function defined by `source`
    pub function: String,
    /// Declared input names, bound positionally from the shared context
    #[serde(default)]
    pub inputs: Vec<String>,
}

/// Reference to a statically registered in-process function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportRef {
    /// Module path the symbol is registered under
    pub module: String,
    /// Symbol name within the module
    pub symbol: String,
}

/// How a tool's logic is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolKind {
    /// Run embedded source inside a worker
    Code(CodeTool),
    /// Call a resolved function in-process
    Import(ImportRef),
}

/// Reusable logic unit bound to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    /// Unique tool name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Dispatch path and its payload
    pub kind: ToolKind,
}

/// Tool metadata as handed over by a knowledge store.
///
/// Non-blank `source` is authoritative over `module`/`symbol`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRecord {
    /// Unique tool name
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Embedded source, if any
    #[serde(default)]
    pub source: Option<String>,
    /// Entry function defined by `source`
    #[serde(default)]
    pub function: Option<String>,
    /// Declared inputs of the entry function
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Module path of an import reference
    #[serde(default)]
    pub module: Option<String>,
    /// Symbol name of an import reference
    #[serde(default)]
    pub symbol: Option<String>,
}

impl TryFrom<ToolRecord> for Tool {
    type Error = Error;

    fn try_from(record: ToolRecord) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidTool {
            name: record.name.clone(),
            reason: reason.to_owned(),
        };

        let kind = match (&record.source, &record.module, &record.symbol) {
            (Some(source), _, _) if !source.trim().is_empty() => {
                let function = record
                    .function
                    .as_deref()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| invalid("embedded source without an entry function"))?;
                ToolKind::Code(CodeTool {
                    source: source.clone(),
                    function: function.to_owned(),
                    inputs: record.inputs.clone(),
                })
            }
            (_, Some(module), Some(symbol)) if !module.is_empty() && !symbol.is_empty() => {
                ToolKind::Import(ImportRef {
                    module: module.clone(),
                    symbol: symbol.clone(),
                })
            }
            _ => return Err(invalid("neither source nor import reference")),
        };

        Ok(Self {
            name: record.name,
            description: record.description,
            kind,
        })
    }
}

/// Named step bound to exactly one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task name
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Name of the tool this task uses
    pub tool: String,
}

/// Position of a task inside a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// 1-based execution order
    pub order: u32,
    /// Task name
    #[serde(alias = "name")]
    pub task: String,
}

/// Ordered list of tasks executed over one shared context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique workflow name
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Steps, in any order; execution sorts them by `order`
    #[serde(default, alias = "tasks")]
    pub steps: Vec<WorkflowStep>,
}

impl Workflow {
    /// Steps sorted by ascending order
    pub fn ordered_steps(&self) -> Vec<&WorkflowStep> {
        let mut steps: Vec<&WorkflowStep> = self.steps.iter().collect();
        steps.sort_by_key(|step| step.order);
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> ToolRecord {
        ToolRecord {
            name: name.to_owned(),
            ..ToolRecord::default()
        }
    }

    #[test]
    fn test_source_is_authoritative() {
        let tool = Tool::try_from(ToolRecord {
            source: Some("function add(a, b) { return a + b; }".to_owned()),
            function: Some("add".to_owned()),
            inputs: vec!["a".to_owned(), "b".to_owned()],
            module: Some("builtin.math".to_owned()),
            symbol: Some("add_numbers".to_owned()),
            ..record("add")
        })
        .unwrap();

        let ToolKind::Code(code) = tool.kind else {
            panic!("expected code tool");
        };
        assert_eq!(code.function, "add");
        assert_eq!(code.inputs, ["a", "b"]);
    }

    #[test]
    fn test_blank_source_falls_back_to_reference() {
        let tool = Tool::try_from(ToolRecord {
            source: Some("   \n".to_owned()),
            module: Some("builtin.math".to_owned()),
            symbol: Some("add_numbers".to_owned()),
            ..record("add")
        })
        .unwrap();

        assert_eq!(
            tool.kind,
            ToolKind::Import(ImportRef {
                module: "builtin.math".to_owned(),
                symbol: "add_numbers".to_owned(),
            })
        );
    }

    #[test]
    fn test_source_without_function_is_invalid() {
        let error = Tool::try_from(ToolRecord {
            source: Some("1 + 1".to_owned()),
            module: Some("builtin.math".to_owned()),
            symbol: Some("add_numbers".to_owned()),
            ..record("broken")
        })
        .unwrap_err();
        assert!(matches!(error, Error::InvalidTool { ref name, .. } if name == "broken"));
    }

    #[test]
    fn test_tool_with_neither_is_invalid() {
        let error = Tool::try_from(record("empty")).unwrap_err();
        assert!(matches!(error, Error::InvalidTool { .. }));
    }

    #[test]
    fn test_ordered_steps() {
        let workflow = Workflow {
            name: "flow".to_owned(),
            description: String::new(),
            steps: vec![
                WorkflowStep {
                    order: 2,
                    task: "second".to_owned(),
                },
                WorkflowStep {
                    order: 1,
                    task: "first".to_owned(),
                },
            ],
        };
        let names: Vec<&str> = workflow
            .ordered_steps()
            .into_iter()
            .map(|step| step.task.as_str())
            .collect();
        assert_eq!(names, ["first", "second"]);
    }
}
