//! Bind parameters for rendered queries

use chrono::{DateTime, Utc};
use duckdb::ToSql;
use duckdb::types::{ToSqlOutput, Value};

use crate::domain::spans::query::Scalar;

/// Timestamp text accepted by `CAST(? AS TIMESTAMP)`
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// A positional parameter of a rendered statement
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    /// Bound as text; the placeholder must be wrapped in `CAST(? AS TIMESTAMP)`
    Timestamp(DateTime<Utc>),
}

impl From<&Scalar> for SqlParam {
    fn from(scalar: &Scalar) -> Self {
        match scalar {
            Scalar::Str(v) => Self::Text(v.clone()),
            Scalar::Int(v) => Self::Int(*v),
            Scalar::UInt(v) => Self::UInt(*v),
            Scalar::Float(v) => Self::Float(*v),
            Scalar::Bool(v) => Self::Bool(*v),
            Scalar::Time(v) => Self::Timestamp(*v),
        }
    }
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        let value = match self {
            Self::Text(v) => Value::Text(v.clone()),
            Self::Int(v) => Value::BigInt(*v),
            Self::UInt(v) => Value::UBigInt(*v),
            Self::Float(v) => Value::Double(*v),
            Self::Bool(v) => Value::Boolean(*v),
            Self::Timestamp(v) => Value::Text(format_timestamp(v)),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}
