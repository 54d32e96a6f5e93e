//! Shared API types
//!
//! Error responses share one JSON shape: `{"error", "code", "message"}`.

use axum::Json;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::domain::spans::{SpanQueryError, ValidationError};

/// Standard API error response
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: String, message: String },
    NotFound { code: String, message: String },
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::bad_request("INVALID_PARAMETER", e.to_string())
    }
}

impl From<SpanQueryError> for ApiError {
    fn from(e: SpanQueryError) -> Self {
        match e {
            SpanQueryError::Query(e) => Self::bad_request("INVALID_QUERY", e.to_string()),
            SpanQueryError::MissingColumn => {
                Self::bad_request("INVALID_PARAMETER", SpanQueryError::MissingColumn.to_string())
            }
            SpanQueryError::Data(e) => {
                tracing::error!(error = %e, "Span query failed");
                Self::internal("Database operation failed")
            }
            SpanQueryError::Resolve(e) => {
                tracing::error!(error = %e, "Span resolution failed");
                Self::internal("Failed to load span bodies")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, code, message) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, "bad_request", code, message)
            }
            Self::NotFound { code, message } => (StatusCode::NOT_FOUND, "not_found", code, message),
            Self::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "INTERNAL".to_string(),
                message,
            ),
        };
        (
            status,
            Json(serde_json::json!({
                "error": error_type,
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}

/// Headers for query responses; results depend on data that changes every few seconds
pub fn no_store() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers
}
