//! Liveness endpoint for load balancers and the dashboard footer.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// GET /health payload. `degraded` means the process is up but the
/// database probe failed.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
}

/// GET /health
///
/// Probes the database on every call; orchestration is unusable without
/// it, so a failed probe degrades the whole service.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = drydock_db::health_check(&state.pool).await.is_ok();

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
    })
}

/// Mounted at the root, not under `/api`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
