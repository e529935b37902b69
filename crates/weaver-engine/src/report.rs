//! Outcome of a workflow run.

use core::fmt;

use serde::{Serialize, Serializer};
use serde::ser::SerializeStruct as _;
use weaver_core::{Error, SharedContext};

/// Progress of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Workflow loaded, no task started
    Ready,
    /// Executing the step with this order
    Running(u32),
    /// Every task completed
    Succeeded,
    /// A task failed; nothing after it ran
    Failed,
}

/// The task that stopped a run.
#[derive(Debug)]
pub struct TaskFailure {
    /// Task name
    pub task: String,
    /// Order of the failing step
    pub order: u32,
    /// What went wrong
    pub error: Error,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "Error executing task {}: {}", self.task, self.error)
    }
}

/// Result of [`TaskDispatcher::execute`](crate::TaskDispatcher::execute).
///
/// On failure `context` is the context as it was right before the failing
/// task. Serializes as `{success, context}` or `{success, error, context}`.
#[derive(Debug)]
pub struct RunReport {
    /// Workflow that ran
    pub workflow: String,
    /// Final state, [`RunState::Succeeded`] or [`RunState::Failed`]
    pub state: RunState,
    /// Folded shared context
    pub context: SharedContext,
    /// Tasks that completed, in execution order
    pub completed_tasks: Vec<String>,
    /// The failure, if any
    pub failure: Option<TaskFailure>,
}

impl RunReport {
    /// Whether every task completed
    pub fn success(&self) -> bool {
        self.failure.is_none()
    }

    /// Failure message, `None` on success
    pub fn error_message(&self) -> Option<String> {
        self.failure.as_ref().map(ToString::to_string)
    }
}

impl Serialize for RunReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = if self.success() { 2 } else { 3 };
        let mut state = serializer.serialize_struct("RunReport", fields)?;
        state.serialize_field("success", &self.success())?;
        if let Some(message) = self.error_message() {
            state.serialize_field("error", &message)?;
        }
        state.serialize_field("context", &self.context)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(failure: Option<TaskFailure>) -> RunReport {
        let mut context = SharedContext::new();
        context.insert("a", json!(5));
        RunReport {
            workflow: "flow".to_owned(),
            state: if failure.is_some() {
                RunState::Failed
            } else {
                RunState::Succeeded
            },
            context,
            completed_tasks: Vec::new(),
            failure,
        }
    }

    #[test]
    fn test_success_shape() {
        let value = serde_json::to_value(report(None)).unwrap();
        assert_eq!(value, json!({"success": true, "context": {"a": 5}}));
    }

    #[test]
    fn test_failure_shape() {
        let failure = TaskFailure {
            task: "double".to_owned(),
            order: 2,
            error: Error::UnresolvedImport {
                module: "builtin.math".to_owned(),
                symbol: "triple".to_owned(),
            },
        };
        let value = serde_json::to_value(report(Some(failure))).unwrap();
        assert_eq!(
            value,
            json!({
                "success": false,
                "error": "Error executing task double: Unresolved import: builtin.math.triple",
                "context": {"a": 5}
            })
        );
    }
}
