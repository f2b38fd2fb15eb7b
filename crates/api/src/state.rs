use std::sync::Arc;

use drydock_events::EventBus;
use drydock_orchestrator::Orchestrator;
use drydock_queue::QueueRegistry;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: drydock_db::DbPool,
    /// Queue and worker registry over the shared pool.
    pub registry: Arc<QueueRegistry>,
    /// Workflow entry points (teardown, deploy).
    pub orchestrator: Orchestrator,
    /// In-process broadcast bus feeding the SSE streams.
    pub bus: Arc<EventBus>,
}
