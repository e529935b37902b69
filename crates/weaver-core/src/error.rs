use core::result::Result as CoreResult;
use core::time::Duration;
use std::io::Error as IoError;

use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;

/// Result type for engine operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors raised by the worker pool, the submission protocol and the dispatcher.
#[derive(Debug, Error)]
pub enum Error {
    /// Every slot of the worker pool is taken.
    #[error("Maximum number of workers ({capacity}) reached")]
    PoolExhausted {
        /// Capacity of the pool that refused the start
        capacity: usize,
    },

    /// A worker with the requested id is already registered or starting.
    #[error("Worker {0} already exists")]
    DuplicateWorker(String),

    /// No worker with the given id is registered.
    #[error("Worker {0} not found")]
    UnknownWorker(String),

    /// The worker process or its interpreter could not be brought up.
    #[error("Failed to start worker: {0}")]
    WorkerStart(String),

    /// The channel to a worker broke while a submission was in flight.
    #[error("Error during execution: {0}")]
    WorkerChannel(String),

    /// The blocking-offload facility is closed or a blocking job failed.
    #[error("Blocking offload failed: {0}")]
    Offload(String),

    /// A submission did not complete within its deadline.
    #[error("Execution timed out after {} seconds", .timeout.as_secs_f64())]
    SubmissionTimeout {
        /// Aggregate deadline that elapsed
        timeout: Duration,
    },

    /// The worker reported an error event for the submission.
    #[error("Error: {name} - {message}")]
    RemoteExecution {
        /// Error class reported by the interpreter
        name: String,
        /// Error message reported by the interpreter
        message: String,
    },

    /// A worker result could not be read back as a structured value.
    #[error("Failed to parse tool result: {0}")]
    ResultParse(String),

    /// An import reference did not resolve to a callable.
    #[error("Unresolved import: {module}.{symbol}")]
    UnresolvedImport {
        /// Module path of the reference
        module: String,
        /// Symbol name within the module
        symbol: String,
    },

    /// A declared tool input is absent from the shared context.
    #[error("Missing required input: {input}")]
    MissingRequiredInput {
        /// Name of the missing input
        input: String,
    },

    /// An in-process tool function rejected its inputs or failed.
    #[error("Tool call failed: {0}")]
    ToolCall(String),

    /// The knowledge store has no workflow, task or tool under this name.
    #[error("Unknown task or tool: {0}")]
    UnknownTaskOrTool(String),

    /// A tool record carries neither usable source nor an import reference.
    #[error("Invalid tool '{name}': {reason}")]
    InvalidTool {
        /// Name of the offending tool
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// Configuration is invalid or could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),
}

impl Error {
    /// Whether this error came from acquiring or talking to a worker rather than from tool logic.
    pub fn is_worker_fault(&self) -> bool {
        matches!(
            self,
            Self::PoolExhausted { .. }
                | Self::UnknownWorker(_)
                | Self::WorkerStart(_)
                | Self::WorkerChannel(_)
                | Self::Offload(_)
        )
    }
}
