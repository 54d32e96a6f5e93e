//! Span query endpoints
//!
//! All four endpoints take the same query string (see `SpanFilterParams`) and differ only in
//! which directives they honor and what they aggregate.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Map, Value as JsonValue};

use crate::api::extractors::ValidatedQuery;
use crate::api::types::{ApiError, no_store};
use crate::domain::spans::aggregate::PercentileSeries;
use crate::domain::spans::service::{GroupList, SpanList};
use crate::domain::spans::{DecodeMode, SpanFilter, SpanFilterParams, SpanQueryService};

#[derive(Clone)]
pub struct SpansApiState {
    pub spans: Arc<SpanQueryService>,
}

impl SpansApiState {
    fn decode(&self, params: SpanFilterParams, mode: DecodeMode) -> Result<SpanFilter, ApiError> {
        Ok(SpanFilter::decode(params, mode, self.spans.config())?)
    }
}

pub fn routes(spans: Arc<SpanQueryService>) -> Router<()> {
    Router::new()
        .route("/spans", get(list_spans))
        .route("/groups", get(list_groups))
        .route("/percentiles", get(get_percentiles))
        .route("/stats", get(get_stats))
        .with_state(SpansApiState { spans })
}

/// List spans in a time window
#[utoipa::path(
    get,
    path = "/api/v1/tracing/spans",
    tag = "tracing",
    params(
        ("time_gte" = String, Query, description = "Window start, inclusive (RFC 3339)"),
        ("time_lt" = String, Query, description = "Window end, exclusive (RFC 3339)"),
        ("duration_gte" = Option<i64>, Query, description = "Minimum duration in nanoseconds"),
        ("duration_lt" = Option<i64>, Query, description = "Maximum duration in nanoseconds, exclusive"),
        ("system" = Option<String>, Query, description = "Comma-separated span systems"),
        ("query" = Option<String>, Query, description = "JSON array of where directives"),
        ("limit" = Option<u64>, Query, description = "Page size"),
        ("offset" = Option<u64>, Query, description = "Rows to skip"),
        ("sort_by" = Option<String>, Query, description = "Attribute to sort by"),
        ("sort_desc" = Option<bool>, Query, description = "Sort descending (default: true)")
    ),
    responses(
        (status = 200, description = "One page of resolved spans plus the total match count", body = SpanList),
        (status = 400, description = "Invalid parameter or query")
    )
)]
pub async fn list_spans(
    State(state): State<SpansApiState>,
    ValidatedQuery(params): ValidatedQuery<SpanFilterParams>,
) -> Result<(HeaderMap, Json<SpanList>), ApiError> {
    let filter = state.decode(params, DecodeMode::Spans)?;
    let list = state.spans.list_spans(&filter).await?;
    Ok((no_store(), Json(list)))
}

/// Group spans and aggregate each group
#[utoipa::path(
    get,
    path = "/api/v1/tracing/groups",
    tag = "tracing",
    params(
        ("time_gte" = String, Query, description = "Window start, inclusive (RFC 3339)"),
        ("time_lt" = String, Query, description = "Window end, exclusive (RFC 3339)"),
        ("system" = Option<String>, Query, description = "Comma-separated span systems"),
        ("query" = Option<String>, Query, description = "JSON array of where, group and column directives"),
        ("limit" = Option<u64>, Query, description = "Maximum groups (default and cap: query.groups_limit)"),
        ("offset" = Option<u64>, Query, description = "Groups to skip"),
        ("sort_by" = Option<String>, Query, description = "Column to sort by"),
        ("sort_desc" = Option<bool>, Query, description = "Sort descending (default: true)")
    ),
    responses(
        (status = 200, description = "Group rows, the effective query parts and column metadata", body = GroupList),
        (status = 400, description = "Invalid parameter or query")
    )
)]
pub async fn list_groups(
    State(state): State<SpansApiState>,
    ValidatedQuery(params): ValidatedQuery<SpanFilterParams>,
) -> Result<(HeaderMap, Json<GroupList>), ApiError> {
    let filter = state.decode(params, DecodeMode::Groups)?;
    let groups = state.spans.list_groups(&filter).await?;
    Ok((no_store(), Json(groups)))
}

/// Count, rate and duration percentiles over time
#[utoipa::path(
    get,
    path = "/api/v1/tracing/percentiles",
    tag = "tracing",
    params(
        ("time_gte" = String, Query, description = "Window start, inclusive (RFC 3339)"),
        ("time_lt" = String, Query, description = "Window end, exclusive (RFC 3339)"),
        ("system" = Option<String>, Query, description = "Comma-separated span systems"),
        ("query" = Option<String>, Query, description = "JSON array of where directives")
    ),
    responses(
        (status = 200, description = "Gap-filled series of equal length", body = PercentileSeries),
        (status = 400, description = "Invalid parameter or query")
    )
)]
pub async fn get_percentiles(
    State(state): State<SpansApiState>,
    ValidatedQuery(params): ValidatedQuery<SpanFilterParams>,
) -> Result<(HeaderMap, Json<PercentileSeries>), ApiError> {
    let filter = state.decode(params, DecodeMode::Percentiles)?;
    let series = state.spans.percentiles(&filter).await?;
    Ok((no_store(), Json(series)))
}

/// One aggregate column over time
#[utoipa::path(
    get,
    path = "/api/v1/tracing/stats",
    tag = "tracing",
    params(
        ("time_gte" = String, Query, description = "Window start, inclusive (RFC 3339)"),
        ("time_lt" = String, Query, description = "Window end, exclusive (RFC 3339)"),
        ("column" = String, Query, description = "Aggregate column, e.g. p90(_duration)"),
        ("system" = Option<String>, Query, description = "Comma-separated span systems"),
        ("query" = Option<String>, Query, description = "JSON array of where directives")
    ),
    responses(
        (status = 200, description = "Map of column name and time to gap-filled series", body = std::collections::HashMap<String, Vec<serde_json::Value>>),
        (status = 400, description = "Missing column, invalid parameter or query")
    )
)]
pub async fn get_stats(
    State(state): State<SpansApiState>,
    ValidatedQuery(params): ValidatedQuery<SpanFilterParams>,
) -> Result<(HeaderMap, Json<Map<String, JsonValue>>), ApiError> {
    let filter = state.decode(params, DecodeMode::Stats)?;
    let stats = state.spans.stats(&filter).await?;
    Ok((no_store(), Json(stats)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::QueryConfig;
    use crate::data::{Cell, QueryRow};
    use crate::domain::spans::service::tests::MockRepository;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use parking_lot::Mutex;
    use tower::ServiceExt;

    const WINDOW: &str = "time_gte=2024-01-15T10:00:00Z&time_lt=2024-01-15T11:00:00Z";

    fn app(repo: Arc<MockRepository>) -> Router {
        Router::new().nest(
            "/api/v1/tracing",
            routes(Arc::new(SpanQueryService::new(repo, QueryConfig::default()))),
        )
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, HeaderMap, serde_json::Value) {
        let resp = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, headers, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_list_spans() {
        let repo = Arc::new(MockRepository {
            rows: Mutex::new(vec![QueryRow(vec![
                Cell::Str("t1".into()),
                Cell::Str("s1".into()),
            ])]),
            count: 7,
            ..Default::default()
        });
        let uri = format!("/api/v1/tracing/spans?{}", WINDOW);
        let (status, headers, body) = get(app(repo), &uri).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-store");
        assert_eq!(body["count"], 7);
        assert_eq!(body["spans"][0]["id"], "s1");
        assert_eq!(body["spans"][0]["groupId"], "18446744073709551615");
    }

    #[tokio::test]
    async fn test_missing_window_is_invalid_parameter() {
        let repo = Arc::new(MockRepository::default());
        let (status, _, body) = get(app(repo.clone()), "/api/v1/tracing/spans").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PARAMETER");
        assert_eq!(repo.query_count(), 0);
    }

    #[tokio::test]
    async fn test_bad_time_is_invalid_parameter() {
        let repo = Arc::new(MockRepository::default());
        let uri = "/api/v1/tracing/groups?time_gte=yesterday&time_lt=2024-01-15T11:00:00Z";
        let (status, _, body) = get(app(repo), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PARAMETER");
        assert!(body["message"].as_str().unwrap().contains("time_gte"));
    }

    #[tokio::test]
    async fn test_filter_on_metric_is_invalid_query() {
        let repo = Arc::new(MockRepository::default());
        // [{"type":"where","attr":"_count","op":"=","value":1}]
        let query = "%5B%7B%22type%22%3A%22where%22%2C%22attr%22%3A%22_count%22%2C\
                     %22op%22%3A%22%3D%22%2C%22value%22%3A1%7D%5D";
        let uri = format!("/api/v1/tracing/spans?{}&query={}", WINDOW, query);
        let (status, _, body) = get(app(repo.clone()), &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_QUERY");
        assert_eq!(repo.query_count(), 0);
    }

    #[tokio::test]
    async fn test_stats_requires_column() {
        let repo = Arc::new(MockRepository::default());
        let uri = format!("/api/v1/tracing/stats?{}", WINDOW);
        let (status, _, body) = get(app(repo.clone()), &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PARAMETER");
        assert!(body["message"].as_str().unwrap().contains("column"));
        assert_eq!(repo.query_count(), 0);
    }

    #[tokio::test]
    async fn test_stats_series() {
        let repo = Arc::new(MockRepository::default());
        let uri = format!("/api/v1/tracing/stats?{}&column=_count", WINDOW);
        let (status, headers, body) = get(app(repo), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-store");
        let counts = body["_count"].as_array().unwrap();
        assert_eq!(counts.len(), body["time"].as_array().unwrap().len());
        assert!(!counts.is_empty());
    }

    #[tokio::test]
    async fn test_percentiles_series() {
        let repo = Arc::new(MockRepository::default());
        let uri = format!("/api/v1/tracing/percentiles?{}", WINDOW);
        let (status, _, body) = get(app(repo), &uri).await;
        assert_eq!(status, StatusCode::OK);
        let len = body["time"].as_array().unwrap().len();
        assert!(len > 0);
        for key in ["count", "rate", "errorCount", "errorRate", "p50", "p90", "p99"] {
            assert_eq!(body[key].as_array().unwrap().len(), len, "{}", key);
        }
    }

    #[tokio::test]
    async fn test_groups_default_shape() {
        let repo = Arc::new(MockRepository::default());
        let uri = format!("/api/v1/tracing/groups?{}", WINDOW);
        let (status, _, body) = get(app(repo), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["groups"].as_array().unwrap().is_empty());
        assert!(body["queryParts"].as_array().unwrap().is_empty());
        assert_eq!(body["columns"][0]["name"], "_group_id");
        assert_eq!(body["columns"][0]["isGroup"], true);
    }

    #[tokio::test]
    async fn test_groups_paging() {
        let repo = Arc::new(MockRepository::default());
        let uri = format!("/api/v1/tracing/groups?{}&limit=500&offset=20", WINDOW);
        let (status, _, _) = get(app(repo.clone()), &uri).await;
        assert_eq!(status, StatusCode::OK);
        let query = repo.queries.lock()[0].clone();
        assert_eq!(query.limit, Some(500));
        assert_eq!(query.offset, Some(20));

        let uri = format!("/api/v1/tracing/groups?{}&limit=1001", WINDOW);
        let (status, _, body) = get(app(repo), &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PARAMETER");
    }

    #[tokio::test]
    async fn test_unparseable_limit_is_rejected() {
        let repo = Arc::new(MockRepository::default());
        let uri = format!("/api/v1/tracing/spans?{}&limit=many", WINDOW);
        let (status, _, body) = get(app(repo), &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PARAMETER");
    }
}
