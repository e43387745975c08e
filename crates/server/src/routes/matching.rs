use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use matcher::{MatchRequest, QUERY_REQUIRED};
use std::sync::Arc;

/// Resolve one free-text name.
///
/// # Example
/// ```json
/// // Request
/// { "query": "Côtes d'Armor", "hints": { "region": "53" } }
///
/// // Response
/// {
///   "status": "matched",
///   "code": "22",
///   "nom": "Côtes-d'Armor",
///   "type": "departement",
///   "confidence": 0.95,
///   "source": "database"
/// }
/// ```
///
/// Ambiguous names answer `{"status": "suggestions", "alternatives": [...]}`
/// and unknown ones `{"status": "failed", "message": "..."}`, both with 200.
/// Only an empty query is rejected with 400.
pub async fn match_entity(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<MatchRequest>,
) -> ServerResult<impl IntoResponse> {
    if request.query.trim().is_empty() {
        return Err(ServerError::BadRequest(QUERY_REQUIRED.to_string()));
    }
    let result = state.matcher.resolve(&request).await;
    tracing::debug!(query = %request.query, outcome = result.outcome().as_str(), "match resolved");
    Ok(Json(result))
}
