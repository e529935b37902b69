//! Submitting source to a worker and collecting its output.

use std::sync::{Arc, PoisonError};
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use uuid::Uuid;
use weaver_core::convention::remote_error;
use weaver_core::{Error, Result, SubmissionConfig};

use crate::format::format_or_original;
use crate::pool::WorkerPool;
use crate::protocol::{Classified, classify};
use crate::worker::WorkerId;

/// Tuning for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Aggregate deadline for the whole submission
    pub timeout: Duration,
    /// Upper bound of each individual event poll
    pub poll_interval: Duration,
    /// Canonicalize the source before sending it
    pub auto_format: bool,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self::from(&SubmissionConfig::default())
    }
}

impl From<&SubmissionConfig> for SubmitOptions {
    fn from(config: &SubmissionConfig) -> Self {
        Self {
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
            auto_format: config.auto_format,
        }
    }
}

/// Output collected from a successful submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionOutput {
    /// Every stream chunk and result, concatenated in arrival order
    pub output: String,
    /// The last `execute_result` payload, if any
    pub result: Option<String>,
}

/// Outcome of [`submit`], with timing always reported.
#[derive(Debug)]
pub struct Submission {
    /// Worker the source was sent to
    pub worker_id: WorkerId,
    /// Wall time from submission to outcome
    pub elapsed: Duration,
    /// Collected output or the reason the submission failed
    pub outcome: Result<SubmissionOutput>,
}

impl Submission {
    /// Whether the submission ran out of time
    pub fn timed_out(&self) -> bool {
        matches!(self.outcome, Err(Error::SubmissionTimeout { .. }))
    }
}

/// Send `source` to worker `worker_id` and wait for the outcome.
///
/// The wait ends on the first correlated error event, on the correlated idle
/// status, or when `options.timeout` elapses. A timeout leaves the worker
/// running.
pub async fn submit(
    pool: &WorkerPool,
    worker_id: &WorkerId,
    source: &str,
    options: &SubmitOptions,
) -> Submission {
    let started = Instant::now();
    let outcome = run_submission(pool, worker_id, source, options, started).await;
    let elapsed = started.elapsed();

    match &outcome {
        Ok(_) => tracing::debug!(
            worker_id = %worker_id,
            elapsed_secs = elapsed.as_secs_f64(),
            "Submission completed"
        ),
        Err(Error::SubmissionTimeout { .. }) => tracing::warn!(
            worker_id = %worker_id,
            elapsed_secs = elapsed.as_secs_f64(),
            "Submission timed out"
        ),
        Err(err) => tracing::debug!(worker_id = %worker_id, "Submission failed: {err}"),
    }

    Submission {
        worker_id: worker_id.clone(),
        elapsed,
        outcome,
    }
}

async fn run_submission(
    pool: &WorkerPool,
    worker_id: &WorkerId,
    source: &str,
    options: &SubmitOptions,
    started: Instant,
) -> Result<SubmissionOutput> {
    let worker = pool.worker(worker_id)?;
    let code = if options.auto_format {
        format_or_original(source)
    } else {
        source.to_owned()
    };

    let msg_id = Uuid::new_v4();
    let sender = Arc::clone(&worker);
    pool.offload()
        .run(move || sender.send(msg_id, code))
        .await??;

    let events = worker.events();
    let mut collected = SubmissionOutput::default();

    loop {
        let remaining = options.timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(Error::SubmissionTimeout {
                timeout: options.timeout,
            });
        }
        let wait = remaining.min(options.poll_interval);

        let events = Arc::clone(&events);
        let polled = pool
            .offload()
            .run(move || {
                events
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .recv_timeout(wait)
            })
            .await?;

        let line = match polled {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Error::WorkerChannel(format!(
                    "worker {worker_id} closed its event channel"
                )));
            }
        };

        match classify(&line, msg_id) {
            Classified::Stream(text) => collected.output.push_str(&text),
            Classified::Result(data) => {
                collected.output.push_str(&data);
                collected.result = Some(data);
            }
            Classified::Error { name, message } => return Err(remote_error(name, message)),
            Classified::Idle => return Ok(collected),
            Classified::Ignored => {}
        }
    }
}
