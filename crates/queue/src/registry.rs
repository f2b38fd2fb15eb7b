//! Process-wide registry of queue handles and running workers.

use std::collections::HashMap;
use std::sync::Arc;

use drydock_db::repositories::QueueRepo;
use drydock_db::DbPool;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::notifier::JobNotifier;
use crate::queue::JobQueue;
use crate::worker::{self, JobProcessor};

/// Bookkeeping for one running worker.
struct WorkerHandle {
    task_handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Creates queue handles on demand and runs at most one worker per queue
/// name.
///
/// Queues are cached by name and never closed; the rows they map to
/// outlive the process. Workers are tokio tasks, each with a child
/// cancellation token so they can be stopped individually or all at once.
pub struct QueueRegistry {
    pool: DbPool,
    notifier: JobNotifier,
    queues: RwLock<HashMap<String, Arc<JobQueue>>>,
    workers: RwLock<HashMap<String, WorkerHandle>>,
    shutdown: CancellationToken,
}

impl QueueRegistry {
    pub fn new(pool: DbPool, notifier: JobNotifier) -> Self {
        Self {
            pool,
            notifier,
            queues: RwLock::new(HashMap::new()),
            workers: RwLock::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// The notifier shared by every worker this registry spawns.
    pub fn notifier(&self) -> &JobNotifier {
        &self.notifier
    }

    /// Fetch or create the handle for `name`, inserting the queue row on
    /// first use.
    pub async fn queue(&self, name: &str) -> Result<Arc<JobQueue>, sqlx::Error> {
        if let Some(queue) = self.queues.read().await.get(name) {
            return Ok(queue.clone());
        }

        let mut queues = self.queues.write().await;
        // Re-check: another task may have won the write lock first.
        if let Some(queue) = queues.get(name) {
            return Ok(queue.clone());
        }
        QueueRepo::ensure(&self.pool, name).await?;
        let queue = Arc::new(JobQueue::new(
            self.pool.clone(),
            name.to_string(),
            self.notifier.clone(),
        ));
        queues.insert(name.to_string(), queue.clone());
        tracing::debug!(queue = name, "Queue registered");
        Ok(queue)
    }

    /// Start a worker for `name` unless one is already running.
    ///
    /// Registering twice is a no-op that keeps the first processor; a
    /// worker whose task has already exited is replaced.
    pub async fn worker(
        &self,
        name: &str,
        processor: Arc<dyn JobProcessor>,
    ) -> Result<(), sqlx::Error> {
        self.queue(name).await?;

        let mut workers = self.workers.write().await;
        if let Some(existing) = workers.get(name) {
            if !existing.task_handle.is_finished() {
                tracing::debug!(queue = name, "Worker already running");
                return Ok(());
            }
            workers.remove(name);
        }

        let cancel = self.shutdown.child_token();
        let task_handle = tokio::spawn(worker::run(
            self.pool.clone(),
            name.to_string(),
            processor,
            self.notifier.clone(),
            cancel.clone(),
        ));
        workers.insert(
            name.to_string(),
            WorkerHandle {
                task_handle,
                cancel,
            },
        );
        Ok(())
    }

    /// Stop the worker for `name` and wait for its loop to exit.
    ///
    /// Returns false when no worker is registered under the name. The
    /// queue handle stays registered; jobs keep accumulating until a new
    /// worker is started.
    pub async fn close_worker(&self, name: &str) -> bool {
        let handle = self.workers.write().await.remove(name);
        let Some(handle) = handle else {
            return false;
        };
        handle.cancel.cancel();
        if let Err(e) = handle.task_handle.await {
            tracing::warn!(queue = name, error = %e, "Worker task ended abnormally");
        }
        tracing::info!(queue = name, "Worker closed");
        true
    }

    /// Number of registered workers, running or not.
    pub async fn worker_count(&self) -> usize {
        self.workers.read().await.len()
    }

    /// Cancel every worker and wait for their loops to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles: Vec<(String, WorkerHandle)> =
            self.workers.write().await.drain().collect();
        for (name, handle) in handles {
            if let Err(e) = handle.task_handle.await {
                tracing::warn!(queue = %name, error = %e, "Worker task ended abnormally");
            }
        }
        tracing::info!("Queue registry shut down");
    }
}
