//! Bounded facility for running blocking calls off the async executor.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::spawn_blocking;
use weaver_core::{Error, Result};

/// Runs blocking closures on Tokio's blocking threads, at most `capacity` at a time.
///
/// Closing the facility makes every later [`BlockingOffload::run`] fail with
/// [`Error::Offload`]; jobs already running finish normally.
#[derive(Clone)]
pub struct BlockingOffload {
    permits: Arc<Semaphore>,
}

impl BlockingOffload {
    /// Create a facility allowing `capacity` concurrent blocking jobs
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity.max(1))),
        }
    }

    /// Run `job` on a blocking thread once a slot is free
    ///
    /// # Errors
    /// Returns an error if the facility is closed or the job panicked
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| Error::Offload("blocking offload is closed".to_owned()))?;

        spawn_blocking(move || {
            let output = job();
            drop(permit);
            output
        })
        .await
        .map_err(|err| Error::Offload(format!("Blocking job failed: {err}")))
    }

    /// Refuse new jobs
    pub fn close(&self) {
        self.permits.close();
    }

    /// Whether [`BlockingOffload::close`] was called
    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::sleep;
    use std::time::Duration;

    #[tokio::test]
    async fn test_runs_job() {
        let offload = BlockingOffload::new(2);
        let value = offload.run(|| 21 * 2).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_closed_refuses_jobs() {
        let offload = BlockingOffload::new(1);
        offload.close();
        assert!(offload.is_closed());
        let error = offload.run(|| ()).await.unwrap_err();
        assert!(matches!(error, Error::Offload(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded() {
        let offload = BlockingOffload::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs = (0..6).map(|_| {
            let offload = offload.clone();
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                offload
                    .run(move || {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        sleep(Duration::from_millis(20));
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
            })
        });

        for job in jobs.collect::<Vec<_>>() {
            job.await.unwrap().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
