//! Server initialization and routing
//!
//! This module handles the Axum server setup including:
//! - Router configuration with all API endpoints
//! - Middleware stack (admission, logging, compression, etc.)
//! - Background maintenance tasks
//! - Graceful shutdown handling

use crate::config::ServerConfig;
use crate::telemetry::install_recorder;
use crate::middleware::{admission_gate, log_requests, request_id};
use crate::routes::{api_info, not_found};
use crate::routes::{batch, health, matching};
use crate::state::ServerState;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the Axum router with all routes and middleware
///
/// Routes are divided into:
/// - Public routes: /, /health, /ready, /metrics (not gated)
/// - Gated routes: all /api/v1/* endpoints (admission control)
pub fn build_router(state: Arc<ServerState>) -> Router {
    let cors = if state.config.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    let public_routes = Router::new()
        .route("/", get(api_info))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics));

    let gated_routes = Router::new()
        .route("/api/v1/match", post(matching::match_entity))
        .route(
            "/api/v1/batch",
            post(batch::submit_batch).get(batch::list_batches),
        )
        .route("/api/v1/batch/{id}", get(batch::batch_status))
        .route("/api/v1/batch/{id}/results", get(batch::batch_results))
        .route("/api/v1/metadata", get(health::server_metadata))
        .layer(DefaultBodyLimit::max(state.config.max_body_size()))
        .layer(from_fn_with_state(state.clone(), admission_gate));

    Router::new()
        .merge(public_routes)
        .merge(gated_routes)
        .fallback(not_found)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.timeout(),
        ))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(from_fn(log_requests))
        .layer(from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Periodically evict idle admission state.
pub fn spawn_admission_sweeper(state: Arc<ServerState>) -> JoinHandle<()> {
    let period = Duration::from_secs(state.admission.config().sweep_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let removed = state.admission.sweep(Instant::now());
            if removed > 0 {
                tracing::debug!(
                    removed,
                    tracked = state.admission.tracked_identities(),
                    "admission state swept"
                );
            }
        }
    })
}

/// Start the HTTP server
///
/// Blocks until the server is shut down via SIGTERM or Ctrl+C.
///
/// # Example
///
/// ```rust,no_run
/// use server::ServerConfig;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = ServerConfig::load()?;
///     server::start_server(config).await?;
///     Ok(())
/// }
/// ```
///
/// # Initialization
///
/// 1. Sets up structured JSON logging with the configured log level
/// 2. Installs the Prometheus recorder when metrics are enabled
/// 3. Loads reference data and builds the shared state
/// 4. Starts the batch dispatcher, the batch reaper and the admission sweeper
/// 5. Binds to the configured TCP address and serves until shutdown
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    // Another subscriber may already be installed by an embedding binary.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(config.log_level.as_str())
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json()
        .try_init();

    let (state, dispatcher) = ServerState::new(config.clone())?;
    let state = if config.metrics_enabled {
        state.with_prometheus(install_recorder()?)
    } else {
        state
    };
    let state = Arc::new(state);

    dispatcher.spawn();
    state.batches.spawn_reaper();
    spawn_admission_sweeper(state.clone());

    let app = build_router(state);
    let addr: SocketAddr = config.socket_addr()?;

    tracing::info!(
        "Starting territoires server on {} with {} API keys",
        addr,
        config.admission.api_keys.len()
    );
    tracing::info!(
        "Timeout: {}s, Max body: {}MB",
        config.timeout_secs,
        config.max_body_size_mb
    );
    tracing::info!(
        "Quotas: {} anonymous / {} authenticated requests per {}s",
        config.admission.anonymous_per_minute,
        config.admission.authenticated_per_minute,
        config.admission.window_secs
    );
    tracing::info!(
        "Batches: max {} items, {} in flight, {} concurrent",
        config.batch.max_items,
        config.batch.concurrency,
        config.batch.max_concurrent_batches
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use reference::InMemoryReferenceStore;
    use tower::ServiceExt;

    fn empty_app() -> Router {
        let store = Arc::new(InMemoryReferenceStore::new());
        let (state, _dispatcher) = ServerState::with_store(ServerConfig::default(), store).unwrap();
        build_router(Arc::new(state))
    }

    #[tokio::test]
    async fn unknown_route_uses_error_envelope() {
        let response = empty_app()
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn request_id_is_echoed() {
        let response = empty_app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-request-id"], "abc-123");
    }

    #[tokio::test]
    async fn empty_store_is_not_ready() {
        let response = empty_app()
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn metrics_are_hidden_without_recorder() {
        let response = empty_app()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
