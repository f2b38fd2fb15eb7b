//! Stalled job recovery.
//!
//! A claimed job whose worker died stays `active` forever and blocks any
//! waiter watching it. The reaper sweeps on a fixed interval: active jobs
//! older than the visibility timeout go back to `waiting` when attempts
//! remain, or to `failed` once the budget is spent. Redelivery is safe
//! because every processor is keyed by an idempotent `job_key`.

use std::time::Duration;

use drydock_db::repositories::JobRepo;
use drydock_db::DbPool;
use tokio_util::sync::CancellationToken;

/// Default time an active job may run without finishing before it counts
/// as stalled. Must exceed the slowest legitimate job.
const DEFAULT_VISIBILITY_TIMEOUT_SECS: i64 = 600;

/// How often the sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Run the stalled-job sweep loop until `cancel` fires.
///
/// The visibility timeout comes from `JOB_VISIBILITY_TIMEOUT_SECS`
/// (defaults to 600).
pub async fn run(pool: DbPool, cancel: CancellationToken) {
    let visibility_timeout_secs: i64 = std::env::var("JOB_VISIBILITY_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_VISIBILITY_TIMEOUT_SECS);

    tracing::info!(
        visibility_timeout_secs,
        interval_secs = SWEEP_INTERVAL.as_secs(),
        "Stalled job reaper started"
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Stalled job reaper stopping");
                break;
            }
            _ = interval.tick() => {
                match JobRepo::requeue_stalled(&pool, visibility_timeout_secs).await {
                    Ok(sweep) => {
                        if sweep.requeued.is_empty() && sweep.failed.is_empty() {
                            tracing::debug!("Stalled job sweep found nothing");
                        } else {
                            tracing::warn!(
                                requeued = sweep.requeued.len(),
                                failed = sweep.failed.len(),
                                "Stalled job sweep recovered jobs"
                            );
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Stalled job sweep failed");
                    }
                }
            }
        }
    }
}
