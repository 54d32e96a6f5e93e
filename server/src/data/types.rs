//! Backend-neutral result rows

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;

/// One typed value read from a result set
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bool(bool),
    Time(DateTime<Utc>),
}

impl Cell {
    /// JSON form; non-finite floats become `null`
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Int(v) => JsonValue::from(*v),
            Self::UInt(v) => JsonValue::from(*v),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::Str(v) => JsonValue::String(v.clone()),
            Self::Bool(v) => JsonValue::Bool(*v),
            Self::Time(v) => JsonValue::String(v.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            Self::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Time(v) => Some(*v),
            _ => None,
        }
    }
}

/// Cells in select-list order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRow(pub Vec<Cell>);

impl QueryRow {
    /// Missing positions read as `Null`
    pub fn cell(&self, idx: usize) -> &Cell {
        static NULL: Cell = Cell::Null;
        self.0.get(idx).unwrap_or(&NULL)
    }
}
