//! Queue worker: claim loop plus processor dispatch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use drydock_db::models::{Job, JobState};
use drydock_db::repositories::JobRepo;
use drydock_db::DbPool;
use tokio_util::sync::CancellationToken;

use crate::notifier::{JobNotification, JobNotifier};

/// How often an idle worker polls for claimable jobs.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Retry delays double per attempt and cap here.
const RETRY_BACKOFF_CAP_SECS: i64 = 60;

/// Handler for jobs claimed off one queue.
///
/// Returning `Ok` stores the value as the job result and completes the
/// job. Returning `Err` consumes the attempt: the job is rescheduled with
/// backoff while attempts remain and marked failed once the budget is
/// spent.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, job: &Job) -> anyhow::Result<serde_json::Value>;
}

/// Claim-and-process loop for one queue. Runs until `cancel` fires.
///
/// Spawned by [`QueueRegistry::worker`](crate::registry::QueueRegistry::worker);
/// not called directly.
pub(crate) async fn run(
    pool: DbPool,
    queue_name: String,
    processor: Arc<dyn JobProcessor>,
    notifier: JobNotifier,
    cancel: CancellationToken,
) {
    tracing::info!(queue = %queue_name, "Worker started");
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(queue = %queue_name, "Worker stopping");
                break;
            }
            _ = ticker.tick() => {
                drain(&pool, &queue_name, processor.as_ref(), &notifier, &cancel).await;
            }
        }
    }
}

/// Process claimable jobs until the queue runs dry or `cancel` fires.
///
/// Jobs run one at a time per worker; ordering within a queue follows the
/// claim query (`run_at`, then id).
async fn drain(
    pool: &DbPool,
    queue_name: &str,
    processor: &dyn JobProcessor,
    notifier: &JobNotifier,
    cancel: &CancellationToken,
) {
    while !cancel.is_cancelled() {
        match JobRepo::claim_next(pool, queue_name).await {
            Ok(Some(job)) => process_one(pool, queue_name, processor, notifier, job).await,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(queue = %queue_name, error = %e, "Claim cycle failed");
                break;
            }
        }
    }
}

async fn process_one(
    pool: &DbPool,
    queue_name: &str,
    processor: &dyn JobProcessor,
    notifier: &JobNotifier,
    job: Job,
) {
    tracing::info!(
        queue = %queue_name,
        job_id = job.id,
        job_key = %job.job_key,
        attempt = job.attempts,
        "Job claimed"
    );

    match processor.process(&job).await {
        Ok(result) => {
            if let Err(e) = JobRepo::complete(pool, job.id, &result).await {
                tracing::error!(job_id = job.id, error = %e, "Failed to record job completion");
                return;
            }
            tracing::info!(job_id = job.id, job_key = %job.job_key, "Job completed");
            notifier.notify(JobNotification {
                queue_name: queue_name.to_string(),
                job_key: job.job_key,
                state: JobState::Completed,
                reason: None,
            });
        }
        Err(e) => {
            // {:#} renders the whole anyhow context chain on one line.
            let message = format!("{e:#}");
            if job.attempts < job.max_attempts {
                let delay = retry_delay_secs(job.attempts);
                tracing::warn!(
                    job_id = job.id,
                    job_key = %job.job_key,
                    attempt = job.attempts,
                    max_attempts = job.max_attempts,
                    delay_secs = delay,
                    error = %message,
                    "Job attempt failed, rescheduling"
                );
                if let Err(e) = JobRepo::reschedule(pool, job.id, delay).await {
                    tracing::error!(job_id = job.id, error = %e, "Failed to reschedule job");
                }
            } else {
                tracing::error!(
                    job_id = job.id,
                    job_key = %job.job_key,
                    attempt = job.attempts,
                    error = %message,
                    "Job failed"
                );
                if let Err(e) = JobRepo::fail(pool, job.id, &message).await {
                    tracing::error!(job_id = job.id, error = %e, "Failed to record job failure");
                    return;
                }
                notifier.notify(JobNotification {
                    queue_name: queue_name.to_string(),
                    job_key: job.job_key,
                    state: JobState::Failed,
                    reason: Some(message),
                });
            }
        }
    }
}

/// Delay before the next attempt: 2s, 4s, 8s, ... capped at one minute.
fn retry_delay_secs(attempt: i32) -> i64 {
    let exp = attempt.clamp(0, 30) as u32;
    2i64.pow(exp).min(RETRY_BACKOFF_CAP_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_doubles_then_caps() {
        assert_eq!(retry_delay_secs(1), 2);
        assert_eq!(retry_delay_secs(2), 4);
        assert_eq!(retry_delay_secs(3), 8);
        assert_eq!(retry_delay_secs(5), 32);
        assert_eq!(retry_delay_secs(6), 60);
        assert_eq!(retry_delay_secs(100), 60);
    }

    #[test]
    fn retry_delay_tolerates_degenerate_attempt_counts() {
        assert_eq!(retry_delay_secs(0), 1);
        assert_eq!(retry_delay_secs(-3), 1);
    }
}
