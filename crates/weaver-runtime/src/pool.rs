//! Bounded registry of execution workers.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use weaver_core::{Error, InterpreterLimits, PoolConfig, Result};

use crate::offload::BlockingOffload;
use crate::worker::{ExecutionWorker, WorkerId, WorkerStatus, locate_worker_program};

/// Snapshot of one worker, as reported by [`WorkerPool::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStats {
    /// Worker id
    pub id: WorkerId,
    /// Operating system id of the worker process
    pub pid: u32,
    /// Time since the worker was spawned
    pub uptime: Duration,
    /// Whether its process is still running
    pub alive: bool,
    /// Lifecycle state
    pub status: WorkerStatus,
    /// Wall-clock creation time
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Registry {
    workers: HashMap<WorkerId, Arc<ExecutionWorker>>,
    /// Ids whose start is in flight; they count against capacity
    pending: HashSet<WorkerId>,
}

impl Registry {
    fn occupied(&self) -> usize {
        self.workers.len() + self.pending.len()
    }
}

/// Releases a reserved start slot unless the start completed.
struct PendingSlot<'pool> {
    registry: &'pool Mutex<Registry>,
    id: Option<WorkerId>,
}

impl PendingSlot<'_> {
    fn commit(mut self, worker: ExecutionWorker) {
        if let Some(id) = self.id.take() {
            let mut registry = lock(self.registry);
            registry.pending.remove(&id);
            registry.workers.insert(id, Arc::new(worker));
        }
    }
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            lock(self.registry).pending.remove(&id);
        }
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pool of at most `capacity` isolated execution workers.
///
/// Each worker is a `weaver-worker` child process. The registry lock is only
/// taken for short, synchronous sections; every blocking wait (startup
/// handshake, teardown, event polls) runs through the pool's
/// [`BlockingOffload`].
pub struct WorkerPool {
    registry: Mutex<Registry>,
    capacity: usize,
    startup_timeout: Duration,
    shutdown_grace: Duration,
    program: Option<PathBuf>,
    limits: InterpreterLimits,
    offload: BlockingOffload,
}

impl WorkerPool {
    /// Create an empty pool
    pub fn new(config: &PoolConfig, limits: InterpreterLimits) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            capacity: config.capacity,
            startup_timeout: config.startup_timeout(),
            shutdown_grace: config.shutdown_grace(),
            program: config.worker_program.clone(),
            limits,
            offload: BlockingOffload::new(config.capacity),
        }
    }

    /// Start a worker, generating an id if none is given
    ///
    /// # Errors
    /// Returns [`Error::PoolExhausted`] when the pool is full,
    /// [`Error::DuplicateWorker`] when the id is taken, [`Error::WorkerStart`]
    /// when the worker cannot come up and [`Error::Offload`] after cleanup
    pub async fn start(&self, id: Option<WorkerId>) -> Result<WorkerId> {
        if self.offload.is_closed() {
            return Err(Error::Offload("worker pool has been cleaned up".to_owned()));
        }
        let id = id.unwrap_or_else(WorkerId::generate);
        let slot = self.reserve(&id)?;

        let limits = self.limits.clone();
        let startup_timeout = self.startup_timeout;
        let configured = self.program.clone();
        let spawn_id = id.clone();
        let worker = self
            .offload
            .run(move || {
                let program = locate_worker_program(configured.as_deref())?;
                ExecutionWorker::spawn(spawn_id, &program, &limits, startup_timeout)
            })
            .await??;

        slot.commit(worker);
        tracing::info!(worker_id = %id, "Started worker");
        Ok(id)
    }

    fn reserve(&self, id: &WorkerId) -> Result<PendingSlot<'_>> {
        let mut registry = lock(&self.registry);
        if registry.workers.contains_key(id) || registry.pending.contains(id) {
            return Err(Error::DuplicateWorker(id.to_string()));
        }
        if registry.occupied() >= self.capacity {
            return Err(Error::PoolExhausted {
                capacity: self.capacity,
            });
        }
        registry.pending.insert(id.clone());
        Ok(PendingSlot {
            registry: &self.registry,
            id: Some(id.clone()),
        })
    }

    /// Return `id` if that worker is registered, otherwise start one
    ///
    /// # Errors
    /// Returns the same errors as [`WorkerPool::start`]
    pub async fn acquire(&self, id: Option<&WorkerId>) -> Result<WorkerId> {
        if let Some(id) = id
            && self.contains(id)
        {
            return Ok(id.clone());
        }
        self.start(id.cloned()).await
    }

    /// Stop a worker; unknown ids are ignored
    ///
    /// The worker leaves the registry before teardown begins. A process
    /// still running after the shutdown grace is killed.
    pub async fn stop(&self, id: &WorkerId) {
        let Some(worker) = lock(&self.registry).workers.remove(id) else {
            tracing::debug!(worker_id = %id, "Stop requested for unknown worker");
            return;
        };

        worker.begin_shutdown();
        let grace = self.shutdown_grace;
        let stopping = Arc::clone(&worker);
        let exited = match self
            .offload
            .run(move || stopping.wait_or_kill(grace))
            .await
        {
            Ok(exited) => exited,
            Err(err) => {
                tracing::warn!(worker_id = %id, "Could not wait for worker exit: {err}");
                worker.kill();
                false
            }
        };

        worker.mark_dead();
        tracing::info!(worker_id = %id, killed = !exited, "Stopped worker");
    }

    /// Look up a registered worker
    ///
    /// # Errors
    /// Returns [`Error::UnknownWorker`] if no such worker is registered
    pub(crate) fn worker(&self, id: &WorkerId) -> Result<Arc<ExecutionWorker>> {
        lock(&self.registry)
            .workers
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownWorker(id.to_string()))
    }

    pub(crate) fn offload(&self) -> &BlockingOffload {
        &self.offload
    }

    /// Snapshot of every registered worker, sorted by id
    pub fn stats(&self) -> Vec<WorkerStats> {
        let mut stats: Vec<WorkerStats> = lock(&self.registry)
            .workers
            .values()
            .map(|worker| WorkerStats {
                id: worker.id().clone(),
                pid: worker.pid(),
                uptime: worker.uptime(),
                alive: worker.is_alive(),
                status: worker.status(),
                created_at: worker.created_at(),
            })
            .collect();
        stats.sort_by(|left, right| left.id.cmp(&right.id));
        stats
    }

    /// Stop every worker and close the blocking offload for good
    pub async fn cleanup(&self) {
        let ids: Vec<WorkerId> = lock(&self.registry).workers.keys().cloned().collect();
        if !ids.is_empty() {
            tracing::info!(count = ids.len(), "Cleaning up workers");
        }
        for id in &ids {
            self.stop(id).await;
        }
        self.offload.close();
    }

    /// Number of registered workers
    pub fn len(&self) -> usize {
        lock(&self.registry).workers.len()
    }

    /// Whether no worker is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of workers
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether a worker with this id is registered
    pub fn contains(&self, id: &WorkerId) -> bool {
        lock(&self.registry).workers.contains_key(id)
    }
}

impl core::fmt::Debug for WorkerPool {
    fn fmt(&self, formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        formatter
            .debug_struct("WorkerPool")
            .field("capacity", &self.capacity)
            .field("workers", &self.len())
            .finish_non_exhaustive()
    }
}
