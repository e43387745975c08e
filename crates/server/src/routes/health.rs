use crate::error::{ServerError, ServerResult};
use crate::state::{ServerMetadata, ServerState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

/// Health check endpoint (liveness)
/// Returns 200 if server is running
pub async fn health_check(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "territoires-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.uptime_seconds(),
    }))
}

/// Readiness check endpoint
///
/// Ready once the reference store answers and holds at least one entity.
pub async fn readiness_check(State(state): State<Arc<ServerState>>) -> ServerResult<impl IntoResponse> {
    let entities = state.matcher.store().entity_count().await?;
    if entities == 0 {
        return Err(ServerError::Unavailable("reference data not loaded".to_string()));
    }

    Ok(Json(json!({
        "status": "ready",
        "service": "territoires-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.uptime_seconds(),
        "components": {
            "api": "ready",
            "reference": "ready",
        },
        "reference_entities": entities,
    })))
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    match (&state.prometheus, state.config.metrics_enabled) {
        (Some(handle), true) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        _ => ServerError::NotFound.into_response(),
    }
}

/// Server metadata
pub async fn server_metadata(State(state): State<Arc<ServerState>>) -> ServerResult<impl IntoResponse> {
    let metadata = ServerMetadata {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        reference_entities: state.matcher.store().entity_count().await?,
    };

    Ok(Json(serde_json::to_value(metadata)?))
}
