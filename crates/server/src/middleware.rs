use crate::admission::{Caller, Decision};
use crate::error::ServerError;
use crate::state::ServerState;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// API key from `X-API-Key`, or `Authorization: Bearer <key>`.
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        return Some(key.trim()).filter(|k| !k.is_empty());
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|k| !k.is_empty())
}

/// First hop of `X-Forwarded-For`, then `X-Real-IP`, then the peer address.
fn client_ip(request: &Request) -> Option<String> {
    let headers = request.headers();
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
}

/// Whole seconds, rounded up so a client never retries too early.
fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

fn set_quota_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_after: Duration) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(ceil_secs(reset_after)));
}

/// Admission gate for the resolution routes.
///
/// Every response it lets through or produces carries the caller's quota
/// headers; refusals also carry `Retry-After`.
pub async fn admission_gate(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Response {
    let caller = Caller {
        api_key: presented_key(request.headers()),
        client_ip: client_ip(&request),
    };
    let admission = match state.admission.admit(caller).await {
        Ok(admission) => admission,
        Err(err) => {
            metrics::counter!("admission_denied_total", "reason" => "credentials").increment(1);
            return err.into_response();
        }
    };

    match admission.decision {
        Decision::Allowed {
            limit,
            remaining,
            reset_after,
        } => {
            let mut response = next.run(request).await;
            set_quota_headers(response.headers_mut(), limit, remaining, reset_after);
            response
        }
        Decision::Denied { limit, retry_after } => {
            tracing::warn!(identity = %admission.identity, "rate limit exceeded");
            metrics::counter!("admission_denied_total", "reason" => "quota").increment(1);
            let mut response = ServerError::RateLimitExceeded {
                retry_after_secs: ceil_secs(retry_after),
            }
            .into_response();
            set_quota_headers(response.headers_mut(), limit, 0, retry_after);
            response
        }
        Decision::Blocked { limit, retry_after } => {
            tracing::warn!(identity = %admission.identity, "identity blocked");
            metrics::counter!("admission_denied_total", "reason" => "blocked").increment(1);
            let mut response = ServerError::Blocked {
                retry_after_secs: ceil_secs(retry_after),
            }
            .into_response();
            set_quota_headers(response.headers_mut(), limit, 0, retry_after);
            response
        }
    }
}

/// Request ID injection middleware
pub async fn request_id(mut request: Request, next: Next) -> Response {
    // Generate or extract request ID
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    // Add to request extensions for handlers to access
    request.extensions_mut().insert(request_id.clone());

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// Logging middleware
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    // Get request ID if available
    let request_id = request
        .extensions()
        .get::<String>()
        .cloned()
        .unwrap_or_default();

    tracing::info!(
        method = %method,
        uri = %uri,
        request_id = %request_id,
        "Request started"
    );

    let response = next.run(request).await;
    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = %duration.as_millis(),
        request_id = %request_id,
        "Request completed"
    );

    response
}
