use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drydock_api::config::ServerConfig;
use drydock_api::{routes, state};
use drydock_events::{EventBus, WebhookDispatcher};
use drydock_orchestrator::Orchestrator;
use drydock_queue::{JobNotifier, QueueRegistry};
use drydock_transport::{MeshClient, TransportSettings};

use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drydock_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = config.port, "Configuration loaded");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = drydock_db::create_pool(&database_url)
        .await
        .expect("could not open a Postgres connection pool");
    tracing::info!("Connected to Postgres");

    drydock_db::health_check(&pool)
        .await
        .expect("database probe failed at startup");
    tracing::info!("Database probe passed");

    drydock_db::run_migrations(&pool)
        .await
        .expect("could not apply migrations");
    tracing::info!("Migrations up to date");

    // --- CORS ---
    let cors = build_cors_layer(&config);

    // --- Queue registry ---
    let registry = Arc::new(QueueRegistry::new(pool.clone(), JobNotifier::new()));

    // --- Event bus ---
    let bus = Arc::new(EventBus::new());

    // --- Webhook dispatcher ---
    let webhooks = Arc::new(WebhookDispatcher::new(pool.clone()));

    // --- Mesh control API client ---
    let mesh = MeshClient::from_env();
    if mesh.is_some() {
        tracing::info!("Mesh control API client configured");
    } else {
        tracing::info!("Mesh control API not configured, device deregistration disabled");
    }

    // --- Orchestrator ---
    let orchestrator = Orchestrator::new(
        pool.clone(),
        Arc::clone(&registry),
        Arc::clone(&bus),
        webhooks,
        mesh,
        TransportSettings::from_env(),
    );

    // --- Stalled-job reaper ---
    // Requeues jobs whose worker died mid-flight. One sweeper per
    // database is enough; REAPER_ENABLED=false opts this process out.
    let reaper = if config.run_reaper {
        let cancel = tokio_util::sync::CancellationToken::new();
        let handle = tokio::spawn(drydock_queue::stalled::run(pool.clone(), cancel.clone()));
        tracing::info!("Stalled-job reaper started");
        Some((cancel, handle))
    } else {
        tracing::info!("Stalled-job reaper disabled by configuration");
        None
    };

    // --- App state ---
    let state = AppState {
        pool,
        registry: Arc::clone(&registry),
        orchestrator,
        bus: Arc::clone(&bus),
    };

    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    // Health stays at the root so load balancers skip the /api stack.
    // Layers apply bottom-up: request IDs are set before tracing spans
    // open, and the timeout bounds time-to-response so SSE bodies are
    // free to stream past it.
    let app = Router::new()
        .merge(routes::health::router())
        .nest("/api", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    // --- Start server ---
    let addr = config.bind_addr();
    tracing::info!(%addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("could not bind the listen address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server exited with an error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Listener closed, draining background work");

    if let Some((cancel, handle)) = reaper {
        cancel.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        tracing::info!("Stalled-job reaper stopped");
    }

    // Cancel workers and drain their claim loops.
    registry.shutdown().await;
    tracing::info!("Queue workers shut down");

    tracing::info!("Shutdown complete");
}

/// Resolve on SIGINT (Ctrl-C) or, on Unix, SIGTERM.
///
/// Covers both interactive stops and process managers (systemd, Docker).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("could not install the Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("could not install the SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("SIGINT received, shutting down");
        }
        () = terminate => {
            tracing::info!("SIGTERM received, shutting down");
        }
    }
}

/// Build the CORS layer from the configured origins.
///
/// An unparsable origin panics at startup rather than serving with a
/// silently dropped entry.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("bad CORS origin {o:?}: {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
