//! Parsed query-expression parts
//!
//! The query language parser lives client-side; the server receives its output as a
//! JSON array of tagged directives:
//!
//! ```json
//! [
//!   {"type": "where", "attr": "http_request_method", "op": "=", "value": "GET"},
//!   {"type": "group", "attr": "service_name"},
//!   {"type": "column", "name": "p99(_duration)"}
//! ]
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::filter::ValidationError;
use crate::core::constants::{QUERY_MAX_PARTS, QUERY_MAX_PARTS_JSON_SIZE};

/// One directive of a parsed query expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPart {
    #[serde(flatten)]
    pub directive: Directive,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,
}

fn is_false(v: &bool) -> bool {
    !*v
}

impl QueryPart {
    pub fn new(directive: Directive) -> Self {
        Self {
            directive,
            disabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Directive {
    Where {
        attr: String,
        op: CompareOp,
        #[serde(default)]
        value: serde_json::Value,
    },
    Group {
        attr: String,
    },
    Column {
        name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not in")]
    NotIn,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "not contains")]
    NotContains,
    #[serde(rename = "exists")]
    Exists,
    #[serde(rename = "not exists")]
    NotExists,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Contains => "LIKE",
            Self::NotContains => "NOT LIKE",
            Self::Exists => "IS NOT NULL",
            Self::NotExists => "IS NULL",
        }
    }

    /// Operators ordering values rather than testing equality
    pub fn is_range(&self) -> bool {
        matches!(self, Self::Lt | Self::Lte | Self::Gt | Self::Gte)
    }
}

/// Parse the `query` request parameter into parts
pub fn parse_parts(json_str: &str) -> Result<Vec<QueryPart>, ValidationError> {
    if json_str.len() > QUERY_MAX_PARTS_JSON_SIZE {
        return Err(ValidationError::new(
            "query",
            format!(
                "exceeds maximum size of {} bytes",
                QUERY_MAX_PARTS_JSON_SIZE
            ),
        ));
    }

    let parts: Vec<QueryPart> =
        serde_json::from_str(json_str).map_err(|e| ValidationError::new("query", e.to_string()))?;

    if parts.len() > QUERY_MAX_PARTS {
        return Err(ValidationError::new(
            "query",
            format!("maximum {} parts allowed", QUERY_MAX_PARTS),
        ));
    }

    Ok(parts)
}

/// Aggregate functions accepted in column names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    PerMin,
    P50,
    P75,
    P90,
    P99,
    Avg,
    Min,
    Max,
    Sum,
    Uniq,
    Any,
}

impl AggFunc {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerMin => "per_min",
            Self::P50 => "p50",
            Self::P75 => "p75",
            Self::P90 => "p90",
            Self::P99 => "p99",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::Uniq => "uniq",
            Self::Any => "any",
        }
    }

    pub fn quantile(&self) -> Option<f64> {
        match self {
            Self::P50 => Some(0.5),
            Self::P75 => Some(0.75),
            Self::P90 => Some(0.9),
            Self::P99 => Some(0.99),
            _ => None,
        }
    }
}

impl FromStr for AggFunc {
    type Err = ColumnNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "per_min" => Self::PerMin,
            "p50" => Self::P50,
            "p75" => Self::P75,
            "p90" => Self::P90,
            "p99" => Self::P99,
            "avg" => Self::Avg,
            "min" => Self::Min,
            "max" => Self::Max,
            "sum" => Self::Sum,
            "uniq" => Self::Uniq,
            "any" => Self::Any,
            other => return Err(ColumnNameError::UnknownFunc(other.to_string())),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColumnNameError {
    #[error("unknown function {0:?}")]
    UnknownFunc(String),
    #[error("invalid attribute name {0:?}")]
    InvalidAttr(String),
}

/// Column reference: a plain attribute (`service_name`) or `func(attr)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnName {
    pub func: Option<AggFunc>,
    pub attr: String,
}

impl ColumnName {
    pub fn attr(attr: impl Into<String>) -> Self {
        Self {
            func: None,
            attr: attr.into(),
        }
    }
}

fn func_call_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"^([a-z0-9_]+)\(([^()]+)\)$").expect("Invalid regex"))
}

impl FromStr for ColumnName {
    type Err = ColumnNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (func, attr) = match func_call_regex().captures(s) {
            Some(caps) => {
                let func = caps[1].parse::<AggFunc>()?;
                (Some(func), caps.get(2).map_or("", |m| m.as_str()).trim())
            }
            None => (None, s),
        };
        if !is_valid_attr_key(attr) {
            return Err(ColumnNameError::InvalidAttr(attr.to_string()));
        }
        Ok(Self {
            func,
            attr: attr.to_string(),
        })
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.func {
            Some(func) => write!(f, "{}({})", func.as_str(), self.attr),
            None => f.write_str(&self.attr),
        }
    }
}

/// Attribute keys are inlined into JSON paths, so only a safe charset is accepted
pub fn is_valid_attr_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 256
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_parts_all_directives() {
        let json = r#"[
            {"type": "where", "attr": "http_request_method", "op": "=", "value": "GET"},
            {"type": "group", "attr": "service_name"},
            {"type": "column", "name": "p99(_duration)", "disabled": true}
        ]"#;
        let parts = parse_parts(json).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[0].directive,
            Directive::Where {
                attr: "http_request_method".to_string(),
                op: CompareOp::Eq,
                value: serde_json::json!("GET"),
            }
        );
        assert!(parts[1].is_enabled());
        assert!(parts[2].disabled);
    }

    #[test]
    fn test_parse_parts_multiword_ops() {
        let json = r#"[
            {"type": "where", "attr": "_status_code", "op": "not in", "value": ["error"]},
            {"type": "where", "attr": "db_statement", "op": "not exists"}
        ]"#;
        let parts = parse_parts(json).unwrap();
        assert!(matches!(
            parts[0].directive,
            Directive::Where {
                op: CompareOp::NotIn,
                ..
            }
        ));
        match &parts[1].directive {
            Directive::Where { op, value, .. } => {
                assert_eq!(*op, CompareOp::NotExists);
                assert!(value.is_null());
            }
            other => panic!("unexpected directive {:?}", other),
        }
    }

    #[test]
    fn test_parse_parts_rejects_unknown_op() {
        let json = r#"[{"type": "where", "attr": "a", "op": "~=", "value": 1}]"#;
        let err = parse_parts(json).unwrap_err();
        assert_eq!(err.param, "query");
    }

    #[test]
    fn test_parse_parts_rejects_unknown_type() {
        let json = r#"[{"type": "having", "attr": "a"}]"#;
        assert!(parse_parts(json).is_err());
    }

    #[test]
    fn test_parse_parts_too_many() {
        let part = r#"{"type": "group", "attr": "a"}"#;
        let json = format!("[{}]", vec![part; QUERY_MAX_PARTS + 1].join(","));
        let err = parse_parts(&json).unwrap_err();
        assert!(err.message.contains("maximum"));
    }

    #[test]
    fn test_parse_parts_too_large() {
        let json = format!("[\"{}\"]", "x".repeat(QUERY_MAX_PARTS_JSON_SIZE));
        let err = parse_parts(&json).unwrap_err();
        assert!(err.message.contains("maximum size"));
    }

    #[test]
    fn test_part_serializes_flat() {
        let part = QueryPart::new(Directive::Group {
            attr: "service_name".to_string(),
        });
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "group", "attr": "service_name"})
        );
    }

    #[test]
    fn test_column_name_plain() {
        let col: ColumnName = "service_name".parse().unwrap();
        assert_eq!(col, ColumnName::attr("service_name"));
        assert_eq!(col.to_string(), "service_name");
    }

    #[test]
    fn test_column_name_func() {
        let col: ColumnName = "p99(_duration)".parse().unwrap();
        assert_eq!(col.func, Some(AggFunc::P99));
        assert_eq!(col.attr, "_duration");
        assert_eq!(col.to_string(), "p99(_duration)");

        let col: ColumnName = "per_min(_count)".parse().unwrap();
        assert_eq!(col.func, Some(AggFunc::PerMin));
    }

    #[test]
    fn test_column_name_func_trims_inner_attr() {
        let col: ColumnName = " avg( http_response_size ) ".parse().unwrap();
        assert_eq!(col.func, Some(AggFunc::Avg));
        assert_eq!(col.attr, "http_response_size");
        assert_eq!(col.to_string(), "avg(http_response_size)");
    }

    #[test]
    fn test_column_name_unknown_func() {
        let err = "median(_duration)".parse::<ColumnName>().unwrap_err();
        assert_eq!(err, ColumnNameError::UnknownFunc("median".to_string()));
    }

    #[test]
    fn test_column_name_invalid_attr() {
        assert!("a'b".parse::<ColumnName>().is_err());
        assert!("".parse::<ColumnName>().is_err());
        assert!("p99(a b)".parse::<ColumnName>().is_err());
    }

    #[test]
    fn test_valid_attr_keys() {
        assert!(is_valid_attr_key("http.route"));
        assert!(is_valid_attr_key("_group_id"));
        assert!(is_valid_attr_key("k8s-pod"));
        assert!(!is_valid_attr_key("a\"b"));
        assert!(!is_valid_attr_key("$.x"));
    }
}
