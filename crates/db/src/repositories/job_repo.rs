//! Repository for the `jobs` table.
//!
//! Uses `JobState` from `models::state` for all state transitions. No magic
//! numbers — every state literal is a named constant.

use sqlx::PgPool;

use drydock_core::types::DbId;

use crate::models::job::Job;
use crate::models::state::{JobState, StateId};

/// Column list shared by every `jobs` SELECT.
const COLUMNS: &str = "\
    id, queue_name, job_key, state_id, payload, attempts, max_attempts, \
    run_at, result, error_message, started_at, finished_at, \
    created_at, updated_at";

/// Ids touched by a stalled-job sweep.
#[derive(Debug, Default)]
pub struct StalledSweep {
    /// Jobs returned to `waiting` for another attempt.
    pub requeued: Vec<DbId>,
    /// Jobs failed because their attempt budget is spent.
    pub failed: Vec<DbId>,
}

/// Provides operations on durable background jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a job, or return the existing one when the key is taken.
    ///
    /// `job_key` is the idempotency token: a second enqueue with the same
    /// key on the same queue is a no-op that returns the earlier row. A
    /// positive `delay_secs` stores the job as `delayed` with a future
    /// `run_at`; it becomes claimable once due.
    pub async fn enqueue(
        pool: &PgPool,
        queue_name: &str,
        job_key: &str,
        payload: &serde_json::Value,
        delay_secs: i64,
        max_attempts: i32,
    ) -> Result<Job, sqlx::Error> {
        let state = if delay_secs > 0 {
            JobState::Delayed
        } else {
            JobState::Waiting
        };

        let query = format!(
            "INSERT INTO jobs (queue_name, job_key, payload, max_attempts, state_id, run_at) \
             VALUES ($1, $2, $3, $4, $5, NOW() + ($6 || ' seconds')::INTERVAL) \
             ON CONFLICT (queue_name, job_key) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Job>(&query)
            .bind(queue_name)
            .bind(job_key)
            .bind(payload)
            .bind(max_attempts)
            .bind(state.id())
            .bind(delay_secs.max(0).to_string())
            .fetch_optional(pool)
            .await?;

        match inserted {
            Some(job) => Ok(job),
            // Conflict: the key is already enqueued, return that job.
            None => Self::find_by_key(pool, queue_name, job_key)
                .await?
                .ok_or(sqlx::Error::RowNotFound),
        }
    }

    /// Atomically claim the next due job on a queue.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent claimers never
    /// double-dispatch. Paused queues yield nothing; delayed jobs become
    /// claimable once `run_at` passes. Claiming counts an attempt.
    pub async fn claim_next(pool: &PgPool, queue_name: &str) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET state_id = $2, started_at = NOW(), attempts = attempts + 1 \
             WHERE id = ( \
                 SELECT j.id FROM jobs j \
                 JOIN queues q ON q.name = j.queue_name \
                 WHERE j.queue_name = $1 \
                   AND NOT q.is_paused \
                   AND (j.state_id = $3 OR (j.state_id = $4 AND j.run_at <= NOW())) \
                 ORDER BY j.run_at ASC, j.id ASC \
                 LIMIT 1 \
                 FOR UPDATE OF j SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(queue_name)
            .bind(JobState::Active.id())
            .bind(JobState::Waiting.id())
            .bind(JobState::Delayed.id())
            .fetch_optional(pool)
            .await
    }

    /// Mark a job as completed with its result payload.
    pub async fn complete(
        pool: &PgPool,
        job_id: DbId,
        result: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs \
             SET state_id = $2, result = $3, finished_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(JobState::Completed.id())
        .bind(result)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a job as failed with an error message.
    pub async fn fail(pool: &PgPool, job_id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs \
             SET state_id = $2, error_message = $3, finished_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(JobState::Failed.id())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Return a job to the `delayed` state for a later attempt.
    pub async fn reschedule(
        pool: &PgPool,
        job_id: DbId,
        delay_secs: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs \
             SET state_id = $2, run_at = NOW() + ($3 || ' seconds')::INTERVAL, \
                 started_at = NULL \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(JobState::Delayed.id())
        .bind(delay_secs.max(0).to_string())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Find a job by its queue and idempotency key.
    pub async fn find_by_key(
        pool: &PgPool,
        queue_name: &str,
        job_key: &str,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE queue_name = $1 AND job_key = $2");
        sqlx::query_as::<_, Job>(&query)
            .bind(queue_name)
            .bind(job_key)
            .fetch_optional(pool)
            .await
    }

    /// Reported state and error message for a key, or `None` for no row.
    ///
    /// Waiting jobs on a paused queue are reported as `paused`; the stored
    /// state is untouched.
    pub async fn reported_state(
        pool: &PgPool,
        queue_name: &str,
        job_key: &str,
    ) -> Result<Option<(StateId, Option<String>)>, sqlx::Error> {
        sqlx::query_as::<_, (StateId, Option<String>)>(
            "SELECT CASE WHEN j.state_id = $3 AND q.is_paused THEN $4::SMALLINT \
                    ELSE j.state_id END, \
                    j.error_message \
             FROM jobs j \
             JOIN queues q ON q.name = j.queue_name \
             WHERE j.queue_name = $1 AND j.job_key = $2",
        )
        .bind(queue_name)
        .bind(job_key)
        .bind(JobState::Waiting.id())
        .bind(JobState::Paused.id())
        .fetch_optional(pool)
        .await
    }

    /// Sweep jobs stuck in `active` past the visibility timeout.
    ///
    /// Jobs with attempts left go back to `waiting`; jobs past their budget
    /// fail. Both updates run in one transaction so a sweep observes a
    /// consistent cut.
    pub async fn requeue_stalled(
        pool: &PgPool,
        visibility_timeout_secs: i64,
    ) -> Result<StalledSweep, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let cutoff = visibility_timeout_secs.max(0).to_string();

        let failed = sqlx::query_scalar::<_, DbId>(
            "UPDATE jobs \
             SET state_id = $1, error_message = $2, finished_at = NOW() \
             WHERE state_id = $3 \
               AND started_at < NOW() - ($4 || ' seconds')::INTERVAL \
               AND attempts >= max_attempts \
             RETURNING id",
        )
        .bind(JobState::Failed.id())
        .bind("job stalled: worker stopped reporting before completion")
        .bind(JobState::Active.id())
        .bind(&cutoff)
        .fetch_all(&mut *tx)
        .await?;

        let requeued = sqlx::query_scalar::<_, DbId>(
            "UPDATE jobs \
             SET state_id = $1, started_at = NULL \
             WHERE state_id = $2 \
               AND started_at < NOW() - ($3 || ' seconds')::INTERVAL \
               AND attempts < max_attempts \
             RETURNING id",
        )
        .bind(JobState::Waiting.id())
        .bind(JobState::Active.id())
        .bind(&cutoff)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(StalledSweep { requeued, failed })
    }
}
