//! Worker wire protocol.
//!
//! A worker process reads [`WorkerCommand`] JSON lines on stdin and reports
//! everything it does as [`WorkerMessage`] JSON lines on stdout. Each event
//! carries the correlation id of the submission it belongs to; the startup
//! handshake is the one uncorrelated line.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Command sent to a worker process, one JSON line each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WorkerCommand {
    /// Evaluate `code` and report events correlated to `msg_id`
    Execute {
        /// Correlation id of the submission
        msg_id: Uuid,
        /// Source to evaluate
        code: String,
    },
    /// Leave the command loop and exit
    Shutdown,
}

impl WorkerCommand {
    /// Encode as one JSON line
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            tracing::warn!("Failed to encode worker command: {err}");
            String::new()
        })
    }
}

/// Interpreter state reported by status events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// A submission is being evaluated
    Busy,
    /// The worker finished its submission and waits for the next one
    Idle,
}

/// Typed event emitted by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "msg_type", content = "content", rename_all = "snake_case")]
pub enum WorkerEvent {
    /// Partial text written by the submitted code
    Stream {
        /// Text written
        text: String,
    },
    /// Value of the submission's final expression, as JSON text
    ExecuteResult {
        /// JSON rendering of the value
        data: String,
    },
    /// The submission raised
    Error {
        /// Error class (`TypeError`, `MissingRequiredInput`, ...)
        ename: String,
        /// Error message
        evalue: String,
    },
    /// Interpreter state change
    Status {
        /// New state
        execution_state: ExecutionState,
    },
}

/// One line on a worker's event channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerMessage {
    /// Correlation id of the submission that caused this event
    pub parent_id: Option<Uuid>,
    /// The event itself
    pub event: WorkerEvent,
}

impl WorkerMessage {
    /// Create a message correlated to `parent_id`
    pub fn new(parent_id: Uuid, event: WorkerEvent) -> Self {
        Self {
            parent_id: Some(parent_id),
            event,
        }
    }

    /// Uncorrelated idle status: the interpreter is up
    pub fn ready() -> Self {
        Self {
            parent_id: None,
            event: WorkerEvent::Status {
                execution_state: ExecutionState::Idle,
            },
        }
    }

    /// Uncorrelated error: the interpreter could not be initialized
    pub fn startup_failed(reason: String) -> Self {
        Self {
            parent_id: None,
            event: WorkerEvent::Error {
                ename: "WorkerStart".to_owned(),
                evalue: reason,
            },
        }
    }

    /// Encode as one JSON line
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            tracing::warn!("Failed to encode worker message: {err}");
            String::new()
        })
    }
}

/// Read a worker's first line as its startup handshake.
///
/// # Errors
/// Returns the reason the worker reported, or a description of the
/// unexpected line
pub fn handshake(line: &str) -> Result<(), String> {
    let message: WorkerMessage = serde_json::from_str(line)
        .map_err(|err| format!("Malformed handshake from worker: {err}"))?;
    match message {
        WorkerMessage {
            parent_id: None,
            event:
                WorkerEvent::Status {
                    execution_state: ExecutionState::Idle,
                },
        } => Ok(()),
        WorkerMessage {
            parent_id: None,
            event: WorkerEvent::Error { evalue, .. },
        } => Err(evalue),
        other => Err(format!("Unexpected handshake from worker: {other:?}")),
    }
}

/// What a submission loop should do with one event line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// Append partial output
    Stream(String),
    /// Append a result value
    Result(String),
    /// Stop with a failure
    Error {
        /// Error class
        name: String,
        /// Error message
        message: String,
    },
    /// Stop with success
    Idle,
    /// Keep polling
    Ignored,
}

/// Classify an event line against the submission `msg_id`.
///
/// Malformed lines and events for other submissions are [`Classified::Ignored`].
pub fn classify(line: &str, msg_id: Uuid) -> Classified {
    let message: WorkerMessage = match serde_json::from_str(line) {
        Ok(message) => message,
        Err(err) => {
            tracing::debug!("Ignoring malformed worker message: {err}");
            return Classified::Ignored;
        }
    };

    if message.parent_id != Some(msg_id) {
        return Classified::Ignored;
    }

    match message.event {
        WorkerEvent::Stream { text } => Classified::Stream(text),
        WorkerEvent::ExecuteResult { data } => Classified::Result(data),
        WorkerEvent::Error { ename, evalue } => Classified::Error {
            name: ename,
            message: evalue,
        },
        WorkerEvent::Status {
            execution_state: ExecutionState::Idle,
        } => Classified::Idle,
        WorkerEvent::Status {
            execution_state: ExecutionState::Busy,
        } => Classified::Ignored,
    }
}
