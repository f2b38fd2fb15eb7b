//! Job and queue entity models for the durable queue layer.

use serde::Serialize;
use sqlx::FromRow;

use drydock_core::types::{DbId, Timestamp};

use super::state::StateId;

/// A row from the `queues` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Queue {
    pub id: DbId,
    pub name: String,
    pub is_paused: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A persisted job: one row of the `jobs` table.
///
/// `job_key` is the caller-constructed idempotency key, unique within a
/// queue. `state_id` only ever holds stored states; the pause-derived and
/// missing-row states exist at the reporting layer.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub queue_name: String,
    pub job_key: String,
    pub state_id: StateId,
    pub payload: serde_json::Value,
    pub attempts: i32,
    pub max_attempts: i32,
    pub run_at: Timestamp,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
