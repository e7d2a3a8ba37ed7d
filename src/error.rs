//! Unified API error handling
//!
//! `ApiError` implements `IntoResponse` so handlers return a structured
//! error body instead of assembling `(StatusCode, Json<...>)` tuples by
//! hand. `extract_error_message` reduces the nested error shapes remote
//! endpoints produce to a single human-readable message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Structured error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// 401 - missing or invalid API key
    Unauthorized,
    /// 404 - resource not found
    NotFound(String),
    /// 400 - invalid request
    BadRequest(String),
    /// 409 - conflict, e.g. a job already running for the stack
    Conflict(String),
    /// 500 - internal error
    Internal(String),
    /// 503 - service unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn unauthorized() -> Self {
        Self::Unauthorized
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Invalid or missing API key".to_string(),
            ),
            ApiError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("{} not found", resource),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorResponse::new(error_type, message);
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Unauthorized => write!(f, "Unauthorized"),
            ApiError::NotFound(r) => write!(f, "Not found: {}", r),
            ApiError::BadRequest(m) => write!(f, "Bad request: {}", m),
            ApiError::Conflict(m) => write!(f, "Conflict: {}", m),
            ApiError::Internal(m) => write!(f, "Internal error: {}", m),
            ApiError::ServiceUnavailable(m) => write!(f, "Service unavailable: {}", m),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<crate::compose::ComposeError> for ApiError {
    fn from(err: crate::compose::ComposeError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Best-effort extraction of a message from a nested error body
///
/// Remote endpoints disagree on where the message lives; check the shapes
/// seen in the wild in order: `error` (string), `message`, `error.message`,
/// `data.error`, `data.message`.
pub fn extract_error_message(body: &serde_json::Value) -> Option<String> {
    let as_string = |v: &serde_json::Value| v.as_str().map(str::to_string);

    if let Some(msg) = body.get("error").and_then(as_string) {
        return Some(msg);
    }
    if let Some(msg) = body.get("message").and_then(as_string) {
        return Some(msg);
    }
    if let Some(msg) = body
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(as_string)
    {
        return Some(msg);
    }
    if let Some(data) = body.get("data") {
        if let Some(msg) = data.get("error").and_then(as_string) {
            return Some(msg);
        }
        if let Some(msg) = data.get("message").and_then(as_string) {
            return Some(msg);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_response_new() {
        let resp = ErrorResponse::new("test_error", "Test message");
        assert_eq!(resp.error, "test_error");
        assert_eq!(resp.message, "Test message");
        assert!(resp.details.is_none());
    }

    #[test]
    fn test_error_response_with_details() {
        let resp = ErrorResponse::new("test_error", "Test message").with_details("Extra info");
        assert_eq!(resp.details, Some("Extra info".to_string()));
    }

    #[test]
    fn test_extract_flat_error() {
        assert_eq!(
            extract_error_message(&json!({"error": "boom"})).as_deref(),
            Some("boom")
        );
        assert_eq!(
            extract_error_message(&json!({"message": "boom"})).as_deref(),
            Some("boom")
        );
    }

    #[test]
    fn test_extract_nested_error() {
        assert_eq!(
            extract_error_message(&json!({"error": {"message": "deep"}})).as_deref(),
            Some("deep")
        );
        assert_eq!(
            extract_error_message(&json!({"data": {"error": "deeper"}})).as_deref(),
            Some("deeper")
        );
        assert_eq!(
            extract_error_message(&json!({"data": {"message": "deepest"}})).as_deref(),
            Some("deepest")
        );
    }

    #[test]
    fn test_extract_prefers_flat_error() {
        let body = json!({"error": "flat", "data": {"error": "nested"}});
        assert_eq!(extract_error_message(&body).as_deref(), Some("flat"));
    }

    #[test]
    fn test_extract_gives_up_gracefully() {
        assert_eq!(extract_error_message(&json!({"status": 500})), None);
        assert_eq!(extract_error_message(&json!(null)), None);
    }
}
