//! Operational queue routes: pause/resume toggles and job state reads.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use drydock_db::models::JobState;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Response for GET /api/queues/{name}/jobs/{key}.
#[derive(Debug, Serialize)]
pub struct JobStateResponse {
    pub queue: String,
    pub job_key: String,
    /// Derived state name: `waiting`, `active`, `delayed`, `completed`,
    /// `failed` or `paused`.
    pub state: &'static str,
    pub terminal: bool,
}

/// POST /api/queues/{name}/pause
///
/// Claims stop until the queue is resumed; waiting jobs report `paused`.
pub async fn pause_queue(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<impl IntoResponse> {
    let queue = state.registry.queue(&name).await?;
    queue.pause().await?;

    Ok(Json(DataResponse { data: serde_json::json!({ "paused": true }) }))
}

/// POST /api/queues/{name}/resume
pub async fn resume_queue(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<impl IntoResponse> {
    let queue = state.registry.queue(&name).await?;
    queue.resume().await?;

    Ok(Json(DataResponse { data: serde_json::json!({ "paused": false }) }))
}

/// GET /api/queues/{name}/jobs/{key}
///
/// Reports the derived state for one job. A key with no matching row is a
/// 404, never a silent `unknown`.
pub async fn job_state(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let queue = state.registry.queue(&name).await?;
    let job_state = queue.state(&key).await?;

    if job_state == JobState::Unknown {
        return Err(AppError::NotFound(format!(
            "job {key} not found on queue {name}"
        )));
    }

    Ok(Json(DataResponse {
        data: JobStateResponse {
            queue: name,
            job_key: key,
            state: job_state.name(),
            terminal: job_state.is_terminal(),
        },
    }))
}

/// Routes mounted at `/queues`.
///
/// ```text
/// POST /{name}/pause       -> pause_queue
/// POST /{name}/resume      -> resume_queue
/// GET  /{name}/jobs/{key}  -> job_state
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{name}/pause", post(pause_queue))
        .route("/{name}/resume", post(resume_queue))
        .route("/{name}/jobs/{key}", get(job_state))
}
