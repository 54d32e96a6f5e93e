//! Validating query extractor
//!
//! Query strings are deserialized, then checked with `validator` before the handler runs.
//! Domain-level decoding (time windows, query parts) happens afterwards in the handler.

use std::ops::Deref;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{FromRequestParts, Query};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use validator::Validate;

/// Validation rejection with structured error response
pub enum ValidationRejection {
    /// Failed to parse query string
    Query(QueryRejection),
    /// Validation constraints not satisfied
    Validation(validator::ValidationErrors),
}

impl IntoResponse for ValidationRejection {
    fn into_response(self) -> Response {
        let message = match self {
            Self::Query(rejection) => rejection.body_text(),
            Self::Validation(errors) => format_validation_errors(&errors),
        };
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "bad_request",
                "code": "INVALID_PARAMETER",
                "message": message
            })),
        )
            .into_response()
    }
}

fn format_validation_errors(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(m) => format!("{}: {}", field, m),
                None => format!("{}: {}", field, e.code),
            })
        })
        .collect();
    // HashMap order is unstable
    messages.sort();
    messages.join("; ")
}

/// Query extractor with automatic validation.
///
/// Returns a `ValidationRejection` on parse or validation failure.
#[derive(Debug)]
pub struct ValidatedQuery<T>(pub T);

impl<T> Deref for ValidatedQuery<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Query)?;
        value.validate().map_err(ValidationRejection::Validation)?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::spans::SpanFilterParams;
    use axum::http::Request;

    async fn extract(uri: &str) -> Result<ValidatedQuery<SpanFilterParams>, ValidationRejection> {
        let (mut parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        ValidatedQuery::<SpanFilterParams>::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_extracts_params() {
        let q = extract("/spans?time_gte=a&limit=5&sort_desc=false").await.ok().unwrap();
        assert_eq!(q.time_gte.as_deref(), Some("a"));
        assert_eq!(q.limit, Some(5));
        assert_eq!(q.sort_desc, Some(false));
    }

    #[tokio::test]
    async fn test_rejects_unparseable_number() {
        let Err(rejection) = extract("/spans?limit=ten").await else {
            panic!("expected rejection");
        };
        assert!(matches!(rejection, ValidationRejection::Query(_)));
        assert_eq!(rejection.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_rejects_oversized_column() {
        let uri = format!("/stats?column={}", "a".repeat(300));
        let Err(rejection) = extract(&uri).await else {
            panic!("expected rejection");
        };
        let ValidationRejection::Validation(errors) = &rejection else {
            panic!("expected validation failure");
        };
        assert!(format_validation_errors(errors).starts_with("column:"));
    }
}
