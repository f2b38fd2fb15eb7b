//! Error type for HTTP handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use drydock_orchestrator::OrchestratorError;
use serde_json::json;

/// Anything a handler can fail with.
///
/// Every variant lands on the wire as `{ "error": <message>, "code":
/// <symbol> }` with an appropriate status; internal details are logged,
/// never returned.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A workflow entry point rejected the request.
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Shorthand for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Status, machine-readable code, and client-safe message.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Orchestrator(err) => match err {
                OrchestratorError::ServerNotFound(id) => {
                    not_found(format!("server with id {id} not found"))
                }
                OrchestratorError::ProjectNotFound(id) => {
                    not_found(format!("project with id {id} not found"))
                }
                OrchestratorError::Db(db_err) => db_parts(db_err),
            },
            AppError::Database(err) => db_parts(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::NotFound(msg) => not_found(msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        let body = json!({
            "error": message,
            "code": code,
        });
        (status, axum::Json(body)).into_response()
    }
}

fn not_found(message: String) -> (StatusCode, &'static str, String) {
    (StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

/// `RowNotFound` maps to 404; everything else to a sanitized 500.
fn db_parts(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => not_found("Resource not found".to_string()),
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
