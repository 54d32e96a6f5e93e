//! Test-only span seeding
//!
//! Ingestion lives outside this server, so tests write index and body rows directly.

use chrono::{DateTime, Utc};
use duckdb::Connection;
use serde_json::{Value as JsonValue, json};

use super::error::DuckdbError;
use super::in_transaction;
use super::sql_types::SqlParam;

#[derive(Debug, Clone)]
pub struct SeedSpan {
    pub trace_id: String,
    pub id: String,
    pub parent_id: Option<String>,
    pub group_id: u64,
    pub system: String,
    pub name: String,
    pub kind: String,
    pub time: DateTime<Utc>,
    pub duration: i64,
    pub status_code: String,
    pub service_name: Option<String>,
    pub attributes: JsonValue,
}

impl SeedSpan {
    pub fn new(trace_id: impl Into<String>, id: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            trace_id: trace_id.into(),
            id: id.into(),
            parent_id: None,
            group_id: 1,
            system: "http:api".to_string(),
            name: "GET /".to_string(),
            kind: "server".to_string(),
            time,
            duration: 1_000_000,
            status_code: "unset".to_string(),
            service_name: Some("api".to_string()),
            attributes: json!({}),
        }
    }
}

/// Insert index rows plus a body `{"attrs": {"seeded": true}}` per span
pub fn insert_spans(conn: &Connection, spans: &[SeedSpan]) -> Result<(), DuckdbError> {
    in_transaction(conn, |conn| {
        let mut index = conn.prepare(
            "INSERT INTO spans_index (id, trace_id, parent_id, group_id, system, name, kind, \
             \"time\", duration, status_code, service_name, attributes) \
             VALUES (?, ?, ?, ?, ?, ?, ?, CAST(? AS TIMESTAMP), ?, ?, ?, ?)",
        )?;
        let mut data = conn.prepare(
            "INSERT INTO spans_data (trace_id, id, \"time\", data) \
             VALUES (?, ?, CAST(? AS TIMESTAMP), ?)",
        )?;

        for span in spans {
            index.execute(duckdb::params![
                span.id,
                span.trace_id,
                span.parent_id,
                SqlParam::UInt(span.group_id),
                span.system,
                span.name,
                span.kind,
                SqlParam::Timestamp(span.time),
                span.duration,
                span.status_code,
                span.service_name,
                span.attributes.to_string(),
            ])?;
            data.execute(duckdb::params![
                span.trace_id,
                span.id,
                SqlParam::Timestamp(span.time),
                json!({"attrs": {"seeded": true}}).to_string(),
            ])?;
        }
        Ok(())
    })
}
