use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use batch::{BatchResults, BatchStatus, BatchSubmission, SubmitReceipt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Receipt plus the URLs to poll.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAccepted {
    #[serde(flatten)]
    pub receipt: SubmitReceipt,
    pub status_url: String,
    pub results_url: String,
}

/// Body of a results query that is not ready yet.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchNotReady {
    pub request_id: Uuid,
    pub status: BatchStatus,
    pub progress: u8,
    pub retry_after: u64,
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub client_id: Option<String>,
}

fn parse_id(raw: &str) -> ServerResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ServerError::BadRequest(format!("Invalid batch id '{raw}'")))
}

/// Submit up to `batch.max_items` names for asynchronous resolution.
///
/// Answers 202 as soon as the batch is persisted; resolution runs later.
pub async fn submit_batch(
    State(state): State<Arc<ServerState>>,
    Json(submission): Json<BatchSubmission>,
) -> ServerResult<impl IntoResponse> {
    let receipt = state.batches.submit(submission).await?;
    metrics::counter!("batch_submissions_total").increment(1);

    let id = receipt.request_id;
    Ok((
        StatusCode::ACCEPTED,
        Json(BatchAccepted {
            receipt,
            status_url: format!("/api/v1/batch/{id}"),
            results_url: format!("/api/v1/batch/{id}/results"),
        }),
    ))
}

/// Batches of one client, newest first.
pub async fn list_batches(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<ListParams>,
) -> ServerResult<impl IntoResponse> {
    let client_id = params
        .client_id
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ServerError::BadRequest("clientId query parameter is required".into()))?;
    let reports = state.batches.list_by_client(&client_id).await?;
    Ok(Json(reports))
}

/// Status counters and rounded progress.
pub async fn batch_status(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ServerResult<impl IntoResponse> {
    let report = state.batches.status(parse_id(&id)?).await?;
    Ok(Json(report))
}

/// Per-item results once the batch is terminal; 202 with `Retry-After`
/// before that.
pub async fn batch_results(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ServerResult<Response> {
    let id = parse_id(&id)?;
    match state.batches.results(id).await? {
        BatchResults::Ready(set) => Ok(Json(set).into_response()),
        BatchResults::NotReady {
            status,
            progress,
            retry_after_secs,
        } => {
            let body = BatchNotReady {
                request_id: id,
                status,
                progress,
                retry_after: retry_after_secs,
                message: "Batch is still being processed",
            };
            let mut response = (StatusCode::ACCEPTED, Json(body)).into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            Ok(response)
        }
    }
}
