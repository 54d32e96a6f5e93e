//! Span records returned by the listing endpoint

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::coerce::serialize_safe_u64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StatusCode {
    #[default]
    Unset,
    Ok,
    Error,
}

impl StatusCode {
    /// Unrecognized values read as `unset`
    pub fn parse(s: &str) -> Self {
        match s {
            "ok" => Self::Ok,
            "error" => Self::Error,
            _ => Self::Unset,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SpanEvent {
    pub name: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub attrs: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpanLink {
    pub trace_id: String,
    pub span_id: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub attrs: serde_json::Map<String, serde_json::Value>,
}

/// Stored span body, filled in by the resolver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SpanBody {
    #[serde(default)]
    #[schema(value_type = Object)]
    pub attrs: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub events: Vec<SpanEvent>,
    #[serde(default)]
    pub links: Vec<SpanLink>,
}

/// One span: index columns plus its resolved body
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    pub id: String,
    pub trace_id: String,
    pub parent_id: Option<String>,
    /// A decimal string when wider than 2^53 - 1
    #[serde(serialize_with = "serialize_safe_u64")]
    pub group_id: u64,
    pub system: String,
    pub name: String,
    pub kind: String,
    pub time: DateTime<Utc>,
    /// Nanoseconds
    pub duration: i64,
    pub status_code: StatusCode,
    pub status_message: String,
    pub event_count: u32,
    pub link_count: u32,
    /// Error events recorded on the span
    pub error_count: u32,
    #[serde(flatten)]
    pub body: SpanBody,
}

impl Span {
    /// Index-only placeholder produced by the page query
    pub fn stub(trace_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            id: id.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_parse() {
        assert_eq!(StatusCode::parse("error"), StatusCode::Error);
        assert_eq!(StatusCode::parse("ok"), StatusCode::Ok);
        assert_eq!(StatusCode::parse("weird"), StatusCode::Unset);
    }

    #[test]
    fn test_span_serializes_wide_group_id_as_string() {
        let span = Span {
            group_id: u64::MAX,
            ..Span::stub("t1", "s1")
        };
        let json = serde_json::to_value(&span).unwrap();
        assert_eq!(json["groupId"], "18446744073709551615");
        assert_eq!(json["traceId"], "t1");
        assert_eq!(json["statusCode"], "unset");
        assert!(json["parentId"].is_null());
        assert!(json["attrs"].is_object());
    }

    #[test]
    fn test_body_deserializes_with_defaults() {
        let body: SpanBody = serde_json::from_str(r#"{"attrs": {"http_route": "/x"}}"#).unwrap();
        assert_eq!(body.attrs["http_route"], "/x");
        assert!(body.events.is_empty());
        assert!(body.links.is_empty());
    }
}
