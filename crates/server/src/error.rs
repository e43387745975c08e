use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use batch::BatchError;
use reference::ReferenceError;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub type ServerResult<T> = Result<T, ServerError>;

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("Too many violations, temporarily blocked")]
    Blocked { retry_after_secs: u64 },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    #[error("Reference data error: {0}")]
    Reference(#[from] ReferenceError),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found")]
    NotFound,
}

/// API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ServerError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ServerError::RateLimitExceeded { .. } | ServerError::Blocked { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Batch(err) => match err {
                BatchError::Empty
                | BatchError::InvalidWebhook(_)
                | BatchError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
                BatchError::TooManyItems { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                BatchError::NotFound(_) => StatusCode::NOT_FOUND,
                BatchError::QueueFull | BatchError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
                BatchError::Store(_) | BatchError::Webhook(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::Reference(_) | ServerError::Unavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServerError::Internal(_) | ServerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ServerError::Authentication(_) => "AUTH_FAILED",
            ServerError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            ServerError::Blocked { .. } => "BLOCKED",
            ServerError::BadRequest(_) => "BAD_REQUEST",
            ServerError::Batch(err) => match err {
                BatchError::Empty => "BATCH_EMPTY",
                BatchError::TooManyItems { .. } => "BATCH_TOO_LARGE",
                BatchError::InvalidWebhook(_) => "INVALID_WEBHOOK",
                BatchError::NotFound(_) => "BATCH_NOT_FOUND",
                BatchError::QueueFull | BatchError::QueueClosed => "BATCH_QUEUE_UNAVAILABLE",
                BatchError::Store(_) | BatchError::Webhook(_) | BatchError::InvalidConfig(_) => {
                    "BATCH_ERROR"
                }
            },
            ServerError::Reference(_) => "REFERENCE_UNAVAILABLE",
            ServerError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            ServerError::Internal(_) => "INTERNAL_ERROR",
            ServerError::Config(_) => "CONFIG_ERROR",
            ServerError::NotFound => "NOT_FOUND",
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            ServerError::RateLimitExceeded { retry_after_secs }
            | ServerError::Blocked { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code().to_string();
        // Store and internal failures are logged, not echoed.
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %self, "request failed");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        let mut response = (status, body).into_response();
        if let Some(secs) = self.retry_after() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<std::net::AddrParseError> for ServerError {
    fn from(err: std::net::AddrParseError) -> Self {
        ServerError::Config(format!("Invalid address: {err}"))
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Internal(format!("IO error: {err}"))
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::BadRequest(format!("JSON parse error: {err}"))
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn batch_errors_map_to_client_statuses() {
        let too_big = ServerError::from(BatchError::TooManyItems { max: 1000, got: 1001 });
        assert_eq!(too_big.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(too_big.error_code(), "BATCH_TOO_LARGE");

        let missing = ServerError::from(BatchError::NotFound(Uuid::nil()));
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn denials_carry_retry_after() {
        let response = ServerError::RateLimitExceeded { retry_after_secs: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let err = ServerError::from(BatchError::Store("disk on fire".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
