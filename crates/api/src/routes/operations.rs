//! Workflow trigger routes: server teardown and project deployment.
//!
//! Both endpoints enqueue a coordinator job and return 202 with the job
//! descriptor; the workflow itself runs asynchronously on the job queues.
//! Progress is observable on `/api/logs/stream`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use drydock_core::types::DbId;
use drydock_orchestrator::DeployRequest;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/servers/{id}/teardown
pub async fn teardown_server(
    State(state): State<AppState>,
    Path(server_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state.orchestrator.teardown_server(server_id).await?;

    tracing::info!(server_id, job_key = %job.job_key, "Server teardown enqueued");

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: job })))
}

/// POST /api/projects/{id}/deploy
pub async fn deploy_project(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(request): Json<DeployRequest>,
) -> AppResult<impl IntoResponse> {
    if request.repo_url.trim().is_empty() {
        return Err(AppError::BadRequest("repo_url must not be empty".into()));
    }
    if request.branch.trim().is_empty() {
        return Err(AppError::BadRequest("branch must not be empty".into()));
    }

    let job = state.orchestrator.deploy_project(project_id, request).await?;

    tracing::info!(project_id, job_key = %job.job_key, "Project deploy enqueued");

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: job })))
}

/// Routes mounted at `/servers`.
///
/// ```text
/// POST /{id}/teardown -> teardown_server
/// ```
pub fn server_router() -> Router<AppState> {
    Router::new().route("/{id}/teardown", post(teardown_server))
}

/// Routes mounted at `/projects`.
///
/// ```text
/// POST /{id}/deploy -> deploy_project
/// ```
pub fn project_router() -> Router<AppState> {
    Router::new().route("/{id}/deploy", post(deploy_project))
}
