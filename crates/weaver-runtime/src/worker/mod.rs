//! Execution workers: one interpreter process plus its pipes.

mod conversion;
mod interpreter;
mod locate;
mod promise;

use core::fmt;
use std::io::{BufRead as _, BufReader, Write as _};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use weaver_core::{Error, InterpreterLimits, Result};

use crate::protocol::{WorkerCommand, handshake};

pub use interpreter::serve;
pub use locate::{WORKER_PROGRAM_ENV, locate_worker_program};

/// How often a stopping worker's process is checked for exit.
const EXIT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Identifier of an execution worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    /// Create an id from any string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a short random id
    pub fn generate() -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self(id)
    }

    /// Borrow the id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// Process spawned, interpreter not yet ready
    Starting,
    /// Accepting submissions
    Running,
    /// Shutdown requested
    Stopping,
    /// Process exited or was killed
    Dead,
}

/// An isolated interpreter process and its pipes.
///
/// Dropping a worker kills its process if it is still running.
pub struct ExecutionWorker {
    id: WorkerId,
    pid: u32,
    child: Mutex<Child>,
    commands: Mutex<Option<ChildStdin>>,
    events: Arc<Mutex<Receiver<String>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    started_at: Instant,
    created_at: DateTime<Utc>,
    status: Mutex<WorkerStatus>,
}

impl ExecutionWorker {
    /// Spawn a worker process and wait for its interpreter to come up.
    ///
    /// Blocks the calling thread for up to `startup_timeout`.
    ///
    /// # Errors
    /// Returns [`Error::WorkerStart`] if the process cannot be spawned, the
    /// interpreter fails to initialize, or the handshake times out
    pub(crate) fn spawn(
        id: WorkerId,
        program: &Path,
        limits: &InterpreterLimits,
        startup_timeout: Duration,
    ) -> Result<Self> {
        let mut command = Command::new(program);
        command
            .arg("--id")
            .arg(id.as_str())
            .arg("--recursion-limit")
            .arg(limits.recursion_limit.to_string());
        if let Some(loop_limit) = limits.loop_iteration_limit {
            command
                .arg("--loop-iteration-limit")
                .arg(loop_limit.to_string());
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| {
                Error::WorkerStart(format!("Failed to spawn {}: {err}", program.display()))
            })?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let (event_tx, event_rx) = mpsc::channel();

        let worker = Self {
            id,
            pid: child.id(),
            child: Mutex::new(child),
            commands: Mutex::new(stdin),
            events: Arc::new(Mutex::new(event_rx)),
            reader: Mutex::new(None),
            started_at: Instant::now(),
            created_at: Utc::now(),
            status: Mutex::new(WorkerStatus::Starting),
        };

        let stdout = stdout
            .ok_or_else(|| Error::WorkerStart("Worker stdout was not captured".to_owned()))?;
        let reader = thread::Builder::new()
            .name(format!("weaver-events-{}", worker.id))
            .spawn(move || forward_events(stdout, &event_tx))
            .map_err(|err| Error::WorkerStart(format!("Failed to spawn event reader: {err}")))?;
        *worker.reader.lock().unwrap_or_else(PoisonError::into_inner) = Some(reader);

        worker.await_ready(startup_timeout)?;
        worker.set_status(WorkerStatus::Running);
        Ok(worker)
    }

    fn await_ready(&self, startup_timeout: Duration) -> Result<()> {
        let first = self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv_timeout(startup_timeout);
        match first {
            Ok(line) => handshake(&line).map_err(Error::WorkerStart),
            Err(RecvTimeoutError::Timeout) => Err(Error::WorkerStart(format!(
                "Interpreter not ready after {:.2}s",
                startup_timeout.as_secs_f64()
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(Error::WorkerStart(
                "Worker process exited during startup".to_owned(),
            )),
        }
    }

    /// Worker id
    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    /// Operating system id of the worker process
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Time since the worker was spawned
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Wall-clock creation time
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current lifecycle state
    pub fn status(&self) -> WorkerStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: WorkerStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Whether the worker process is still running
    pub fn is_alive(&self) -> bool {
        self.status() != WorkerStatus::Dead
            && matches!(
                self.child
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .try_wait(),
                Ok(None)
            )
    }

    /// Write one command line to the worker's stdin
    fn write_command(&self, command: &WorkerCommand) -> std::io::Result<()> {
        let mut commands = self.commands.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(stdin) = commands.as_mut() else {
            return Err(std::io::ErrorKind::BrokenPipe.into());
        };
        writeln!(stdin, "{}", command.encode())?;
        stdin.flush()
    }

    /// Queue `code` for evaluation under correlation id `msg_id`
    ///
    /// # Errors
    /// Returns [`Error::WorkerChannel`] if the worker process is gone
    pub(crate) fn send(&self, msg_id: Uuid, code: String) -> Result<()> {
        self.write_command(&WorkerCommand::Execute { msg_id, code })
            .map_err(|err| Error::WorkerChannel(format!("worker {} is not running: {err}", self.id)))
    }

    /// Shared handle on the event stream, for blocking polls off the async executor
    pub(crate) fn events(&self) -> Arc<Mutex<Receiver<String>>> {
        Arc::clone(&self.events)
    }

    /// Request shutdown and close the command pipe.
    pub(crate) fn begin_shutdown(&self) {
        self.set_status(WorkerStatus::Stopping);
        if let Err(err) = self.write_command(&WorkerCommand::Shutdown) {
            tracing::debug!(worker_id = %self.id, "Worker no longer reads commands: {err}");
        }
        drop(
            self.commands
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
    }

    /// Block until the process exits or `grace` elapses, killing it then.
    ///
    /// Returns `true` if the process exited on its own. Either way the
    /// process is reaped and the event reader joined before returning.
    pub(crate) fn wait_or_kill(&self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        let exited = loop {
            match self
                .child
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .try_wait()
            {
                Ok(Some(_)) => break true,
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(worker_id = %self.id, "Could not poll worker process: {err}");
                    break false;
                }
            }
            if Instant::now() >= deadline {
                tracing::warn!(
                    worker_id = %self.id,
                    "Worker still busy {:.2}s after shutdown; killing its process",
                    grace.as_secs_f64()
                );
                break false;
            }
            thread::sleep(EXIT_CHECK_INTERVAL);
        };

        if !exited {
            self.kill();
        }
        if let Some(reader) = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            && reader.join().is_err()
        {
            tracing::warn!(worker_id = %self.id, "Event reader panicked");
        }
        exited
    }

    /// Kill the process if it is still running, then reap it
    pub(crate) fn kill(&self) {
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(child.try_wait(), Ok(Some(_))) {
            return;
        }
        if let Err(err) = child.kill() {
            tracing::debug!(worker_id = %self.id, "Failed to kill worker process: {err}");
        }
        if let Err(err) = child.wait() {
            tracing::debug!(worker_id = %self.id, "Failed to reap worker process: {err}");
        }
    }

    /// Mark the worker as dead
    pub(crate) fn mark_dead(&self) {
        self.set_status(WorkerStatus::Dead);
    }
}

impl Drop for ExecutionWorker {
    fn drop(&mut self) {
        self.kill();
    }
}

impl fmt::Debug for ExecutionWorker {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ExecutionWorker")
            .field("id", &self.id)
            .field("pid", &self.pid)
            .field("status", &self.status())
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Forward each stdout line of a worker into its event channel until the
/// pipe closes or nobody listens any more.
fn forward_events(stdout: ChildStdout, events: &Sender<String>) {
    for line in BufReader::new(stdout).lines() {
        match line {
            Ok(line) => {
                if events.send(line).is_err() {
                    break;
                }
            }
            Err(err) => {
                tracing::debug!("Worker event pipe failed: {err}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_short_and_distinct() {
        let first = WorkerId::generate();
        let second = WorkerId::generate();
        assert_eq!(first.as_str().len(), 8);
        assert_ne!(first, second);
    }

    #[test]
    fn test_missing_program_is_a_start_error() {
        let error = ExecutionWorker::spawn(
            WorkerId::new("unit0001"),
            Path::new("/nonexistent/weaver-worker"),
            &InterpreterLimits::default(),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(error, Error::WorkerStart(ref reason) if reason.contains("Failed to spawn")));
    }
}
