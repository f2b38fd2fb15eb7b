//! Job completion waiting.
//!
//! Two strategies over the same classification:
//!
//! - [`wait_for_job`] polls the reported state on a fixed interval. Simple,
//!   no channel involved, latency bounded by the poll interval.
//! - [`wait_for_job_id`] subscribes to the [`JobNotifier`] stream *before*
//!   its first state check, so a transition landing between the check and
//!   the wait is never lost, then re-checks the database on each matching
//!   notification. Near-immediate resolution, wall-clock timeout as the
//!   backstop.
//!
//! Both treat the database as the source of truth and notifications as a
//! wake-up hint only.

use std::time::Duration;

use drydock_db::models::JobState;
use drydock_db::repositories::JobRepo;
use drydock_db::DbPool;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;

use crate::notifier::JobNotifier;

/// Options for the polling strategy.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Number of state checks before giving up.
    pub max_attempts: u32,
    /// Pause between checks.
    pub poll_interval: Duration,
    /// States that resolve the wait successfully.
    pub success_states: Vec<JobState>,
    /// States that resolve the wait as failed.
    pub failure_states: Vec<JobState>,
}

impl Default for PollOptions {
    // 180 checks x 10s = the same 30 minute ceiling the subscribed
    // strategy uses.
    fn default() -> Self {
        Self {
            max_attempts: 180,
            poll_interval: Duration::from_secs(10),
            success_states: vec![JobState::Completed],
            failure_states: vec![JobState::Failed],
        }
    }
}

/// Options for the subscribed strategy.
#[derive(Debug, Clone)]
pub struct SubscribeOptions {
    /// Wall-clock deadline for the whole wait.
    pub timeout: Duration,
    /// States that resolve the wait successfully.
    pub success_states: Vec<JobState>,
    /// States that resolve the wait as failed.
    pub failure_states: Vec<JobState>,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30 * 60),
            success_states: vec![JobState::Completed],
            failure_states: vec![JobState::Failed],
        }
    }
}

/// Why a wait did not resolve successfully.
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    /// No job row exists under the key.
    #[error("job {key} not found")]
    NotFound { key: String },
    /// The job reached a failure state.
    #[error("job {key} ended in state {state}: {}", .reason.as_deref().unwrap_or("no reason recorded"))]
    Failed {
        key: String,
        state: JobState,
        reason: Option<String>,
    },
    /// The wait gave up before the job reached a terminal state.
    #[error("timed out waiting for job {key} after {waited_secs}s")]
    TimedOut { key: String, waited_secs: u64 },
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// One state check, classified against the caller's state sets.
enum Outcome {
    Pending,
    Succeeded,
    Failed {
        state: JobState,
        reason: Option<String>,
    },
    Missing,
}

async fn check(
    pool: &DbPool,
    queue_name: &str,
    job_key: &str,
    success_states: &[JobState],
    failure_states: &[JobState],
) -> Result<Outcome, sqlx::Error> {
    let Some((state_id, reason)) = JobRepo::reported_state(pool, queue_name, job_key).await? else {
        return Ok(Outcome::Missing);
    };
    let state = JobState::from_id(state_id);
    if success_states.contains(&state) {
        Ok(Outcome::Succeeded)
    } else if failure_states.contains(&state) {
        Ok(Outcome::Failed { state, reason })
    } else {
        Ok(Outcome::Pending)
    }
}

/// Map an outcome to the wait result. `Ok(true)` means resolved
/// successfully, `Ok(false)` means keep waiting.
fn resolve(job_key: &str, outcome: Outcome) -> Result<bool, WaitError> {
    match outcome {
        Outcome::Pending => Ok(false),
        Outcome::Succeeded => Ok(true),
        Outcome::Missing => Err(WaitError::NotFound {
            key: job_key.to_string(),
        }),
        Outcome::Failed { state, reason } => Err(WaitError::Failed {
            key: job_key.to_string(),
            state,
            reason,
        }),
    }
}

/// Poll until the job reaches a success or failure state.
///
/// The first check runs immediately; a missing row fails the wait right
/// away rather than burning the whole budget on a key that was never
/// enqueued.
pub async fn wait_for_job(
    pool: &DbPool,
    queue_name: &str,
    job_key: &str,
    options: &PollOptions,
) -> Result<(), WaitError> {
    let started = Instant::now();
    for attempt in 1..=options.max_attempts {
        let outcome = check(
            pool,
            queue_name,
            job_key,
            &options.success_states,
            &options.failure_states,
        )
        .await?;
        if resolve(job_key, outcome)? {
            return Ok(());
        }
        if attempt < options.max_attempts {
            tokio::time::sleep(options.poll_interval).await;
        }
    }
    Err(WaitError::TimedOut {
        key: job_key.to_string(),
        waited_secs: started.elapsed().as_secs(),
    })
}

/// Wait by subscription: resolve on the first matching notification.
///
/// Subscribes before the first state check so a terminal transition landing
/// in between is not lost. Lagged subscriptions re-check state and keep
/// waiting; a closed channel gets one final check. The receiver is dropped
/// on every return path.
pub async fn wait_for_job_id(
    pool: &DbPool,
    notifier: &JobNotifier,
    queue_name: &str,
    job_key: &str,
    options: &SubscribeOptions,
) -> Result<(), WaitError> {
    let mut rx = notifier.subscribe();
    let started = Instant::now();

    let outcome = check(
        pool,
        queue_name,
        job_key,
        &options.success_states,
        &options.failure_states,
    )
    .await?;
    if resolve(job_key, outcome)? {
        return Ok(());
    }

    let deadline = started + options.timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(WaitError::TimedOut {
                key: job_key.to_string(),
                waited_secs: started.elapsed().as_secs(),
            });
        }

        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Ok(notification)) => {
                if notification.queue_name != queue_name || notification.job_key != job_key {
                    continue;
                }
                let outcome = check(
                    pool,
                    queue_name,
                    job_key,
                    &options.success_states,
                    &options.failure_states,
                )
                .await?;
                if resolve(job_key, outcome)? {
                    return Ok(());
                }
                // The notification raced an uncommitted write; keep waiting.
            }
            Ok(Err(RecvError::Lagged(skipped))) => {
                tracing::debug!(
                    job_key,
                    skipped,
                    "Notification stream lagged, re-checking state"
                );
                let outcome = check(
                    pool,
                    queue_name,
                    job_key,
                    &options.success_states,
                    &options.failure_states,
                )
                .await?;
                if resolve(job_key, outcome)? {
                    return Ok(());
                }
            }
            Ok(Err(RecvError::Closed)) => {
                // No further notifications can arrive. One last check.
                let outcome = check(
                    pool,
                    queue_name,
                    job_key,
                    &options.success_states,
                    &options.failure_states,
                )
                .await?;
                return if resolve(job_key, outcome)? {
                    Ok(())
                } else {
                    Err(WaitError::TimedOut {
                        key: job_key.to_string(),
                        waited_secs: started.elapsed().as_secs(),
                    })
                };
            }
            Err(_) => {
                return Err(WaitError::TimedOut {
                    key: job_key.to_string(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }
        }
    }
}
