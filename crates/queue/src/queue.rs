//! Handle to one named queue.

use drydock_db::models::{Job, JobState};
use drydock_db::repositories::{JobRepo, QueueRepo};
use drydock_db::DbPool;

use crate::notifier::JobNotifier;
use crate::waiter::{self, PollOptions, SubscribeOptions, WaitError};

/// Options for a single enqueue call.
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    /// Seconds before the job becomes claimable. Zero enqueues as `waiting`.
    pub delay_secs: i64,
    /// Total attempt budget, first attempt included.
    pub max_attempts: i32,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            delay_secs: 0,
            max_attempts: 1,
        }
    }
}

/// One named queue.
///
/// All durable state lives in Postgres; the handle carries only the pool,
/// the queue name and the shared notifier. Handles come from
/// [`QueueRegistry::queue`](crate::registry::QueueRegistry::queue), which
/// guarantees the backing row exists.
pub struct JobQueue {
    pool: DbPool,
    name: String,
    notifier: JobNotifier,
}

impl JobQueue {
    pub(crate) fn new(pool: DbPool, name: String, notifier: JobNotifier) -> Self {
        Self {
            pool,
            name,
            notifier,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue a job under `job_key`.
    ///
    /// The key is the idempotency token: enqueueing a key that is already
    /// present returns the existing row untouched, whatever state it is
    /// in.
    pub async fn enqueue(
        &self,
        job_key: &str,
        payload: &serde_json::Value,
        options: &EnqueueOptions,
    ) -> Result<Job, sqlx::Error> {
        JobRepo::enqueue(
            &self.pool,
            &self.name,
            job_key,
            payload,
            options.delay_secs,
            options.max_attempts,
        )
        .await
    }

    /// Reported state for `job_key`.
    ///
    /// Missing rows report `Unknown`; waiting jobs report `Paused` while
    /// the queue is paused.
    pub async fn state(&self, job_key: &str) -> Result<JobState, sqlx::Error> {
        let reported = JobRepo::reported_state(&self.pool, &self.name, job_key).await?;
        Ok(match reported {
            Some((state_id, _)) => JobState::from_id(state_id),
            None => JobState::Unknown,
        })
    }

    /// Stop handing out jobs from this queue. Jobs already claimed finish
    /// normally; waiting jobs report `paused` until [`resume`](Self::resume).
    pub async fn pause(&self) -> Result<(), sqlx::Error> {
        QueueRepo::set_paused(&self.pool, &self.name, true).await?;
        tracing::info!(queue = %self.name, "Queue paused");
        Ok(())
    }

    /// Resume claiming from this queue.
    pub async fn resume(&self) -> Result<(), sqlx::Error> {
        QueueRepo::set_paused(&self.pool, &self.name, false).await?;
        tracing::info!(queue = %self.name, "Queue resumed");
        Ok(())
    }

    /// Poll until `job_key` reaches a success or failure state.
    pub async fn wait_for_job(
        &self,
        job_key: &str,
        options: &PollOptions,
    ) -> Result<(), WaitError> {
        waiter::wait_for_job(&self.pool, &self.name, job_key, options).await
    }

    /// Wait for `job_key` by subscribing to the notification stream,
    /// re-checking state on each matching notification.
    pub async fn wait_for_job_id(
        &self,
        job_key: &str,
        options: &SubscribeOptions,
    ) -> Result<(), WaitError> {
        waiter::wait_for_job_id(&self.pool, &self.notifier, &self.name, job_key, options).await
    }
}
