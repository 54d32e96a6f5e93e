//! OpenAPI specification and Swagger UI

use axum::http::header;
use axum::response::{Html, IntoResponse, Json};
use utoipa::OpenApi;

use crate::api::routes::{health, spans};
use crate::domain::spans::aggregate::PercentileSeries;
use crate::domain::spans::model::{Span, SpanBody, SpanEvent, SpanLink, StatusCode};
use crate::domain::spans::service::{GroupColumn, GroupList, SpanList};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Spanlens API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Span search, grouping and time-series aggregation"
    ),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "tracing", description = "Span queries and aggregates")
    ),
    paths(
        health::health,
        spans::list_spans,
        spans::list_groups,
        spans::get_percentiles,
        spans::get_stats,
    ),
    components(schemas(
        health::HealthResponse,
        SpanList,
        Span,
        SpanBody,
        SpanEvent,
        SpanLink,
        StatusCode,
        GroupList,
        GroupColumn,
        PercentileSeries
    ))
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
pub async fn openapi_json() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        Json(ApiDoc::openapi()),
    )
}

/// Serve Swagger UI from CDN
pub async fn swagger_ui_html() -> Html<&'static str> {
    Html(SWAGGER_UI_HTML)
}

const SWAGGER_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Spanlens API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        html { box-sizing: border-box; overflow-y: scroll; }
        *, *:before, *:after { box-sizing: inherit; }
        body { margin: 0; background: #fafafa; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = () => {
            window.ui = SwaggerUIBundle({
                url: "/api/openapi.json",
                dom_id: '#swagger-ui',
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout",
                deepLinking: true,
                showExtensions: true,
                showCommonExtensions: true
            });
        };
    </script>
</body>
</html>"#;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_tracing_paths() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let paths = doc["paths"].as_object().unwrap();
        for path in [
            "/api/v1/health",
            "/api/v1/tracing/spans",
            "/api/v1/tracing/groups",
            "/api/v1/tracing/percentiles",
            "/api/v1/tracing/stats",
        ] {
            assert!(paths.contains_key(path), "missing {}", path);
        }
        assert_eq!(doc["info"]["title"], "Spanlens API");
    }

    #[test]
    fn test_openapi_response_schemas() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let schemas = doc["components"]["schemas"].as_object().unwrap();
        for name in ["SpanList", "Span", "GroupList", "GroupColumn", "PercentileSeries"] {
            assert!(schemas.contains_key(name), "missing schema {}", name);
        }
        assert!(schemas["PercentileSeries"]["properties"]["errorRate"].is_object());

        let groups_ok = &doc["paths"]["/api/v1/tracing/groups"]["get"]["responses"]["200"];
        let schema_ref = groups_ok["content"]["application/json"]["schema"]["$ref"]
            .as_str()
            .unwrap();
        assert!(schema_ref.ends_with("/GroupList"));
    }
}
