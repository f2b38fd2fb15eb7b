//! Server-Sent Event streams over the in-process broadcast bus.
//!
//! Each connection holds one broadcast receiver; dropping the connection
//! drops the receiver, which is the unsubscribe. Slow consumers that lag
//! behind the channel capacity lose the skipped frames, matching the bus's
//! no-replay contract.

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use drydock_core::types::DbId;
use drydock_events::LogScope;
use futures::Stream;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::state::AppState;

/// Query parameters for GET /api/logs/stream.
///
/// `server_id` is required; a missing or unparsable value rejects the
/// request before a subscription is created.
#[derive(Debug, Deserialize)]
pub struct LogStreamParams {
    pub server_id: DbId,
    pub service_id: Option<DbId>,
    pub deployment_id: Option<DbId>,
}

impl LogStreamParams {
    fn scope(&self) -> LogScope {
        let mut scope = LogScope::server(self.server_id);
        if let Some(service_id) = self.service_id {
            scope = scope.with_service(service_id);
        }
        if let Some(deployment_id) = self.deployment_id {
            scope = scope.with_deployment(deployment_id);
        }
        scope
    }
}

/// GET /api/logs/stream?server_id=...[&service_id=...][&deployment_id=...]
///
/// Streams scoped progress events as one JSON frame per event.
pub async fn log_stream(
    State(state): State<AppState>,
    Query(params): Query<LogStreamParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let scope = params.scope();
    let receiver = state.bus.subscribe(&scope).await;

    tracing::debug!(channel = %scope.channel(), "SSE log subscriber attached");

    let stream = BroadcastStream::new(receiver).filter_map(|item| {
        // Lagged receivers skip to the next frame; closed ends the stream.
        let event = item.ok()?;
        let frame = Event::default().json_data(&event).ok()?;
        Some(Ok(frame))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /api/refresh/stream
///
/// Streams the global refresh channel: `{ "refresh": true, "entity": ... }`
/// frames telling clients which collection to re-fetch.
pub async fn refresh_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.bus.subscribe_refresh();

    let stream = BroadcastStream::new(receiver).filter_map(|item| {
        let event = item.ok()?;
        let frame = Event::default().json_data(&event).ok()?;
        Some(Ok(frame))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Routes mounted at `/logs` and `/refresh`.
///
/// ```text
/// GET /logs/stream     -> log_stream
/// GET /refresh/stream  -> refresh_stream
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/logs/stream", get(log_stream))
        .route("/refresh/stream", get(refresh_stream))
}
