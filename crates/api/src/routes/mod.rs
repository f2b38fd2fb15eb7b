pub mod health;
pub mod operations;
pub mod queues;
pub mod streams;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /servers/{id}/teardown          enqueue server teardown (POST)
/// /projects/{id}/deploy           enqueue project deploy (POST)
///
/// /queues/{name}/pause            pause claims (POST)
/// /queues/{name}/resume           resume claims (POST)
/// /queues/{name}/jobs/{key}       derived job state (GET)
///
/// /logs/stream                    scoped progress events (SSE)
/// /refresh/stream                 global refresh pings (SSE)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/servers", operations::server_router())
        .nest("/projects", operations::project_router())
        .nest("/queues", queues::router())
        .merge(streams::router())
}
