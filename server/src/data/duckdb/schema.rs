//! DuckDB schema definitions
//!
//! Append-only span storage with no PRIMARY KEY constraints. The span index carries
//! intrinsic columns plus a JSON `attributes` column; bodies live in `spans_data`;
//! `spans_index_minutes` is a per-minute rollup rebuilt by a background task.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema SQL
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at BIGINT NOT NULL,
    description VARCHAR
);

-- One row per span (events are rows with is_event = true)
CREATE TABLE IF NOT EXISTS spans_index (
    id                      VARCHAR NOT NULL,
    trace_id                VARCHAR NOT NULL,
    parent_id               VARCHAR,            -- NULL marks a root span
    group_id                UBIGINT NOT NULL,   -- Stable hash of system + name
    system                  VARCHAR NOT NULL,
    name                    VARCHAR NOT NULL,
    event_name              VARCHAR,
    is_event                BOOLEAN NOT NULL DEFAULT false,
    kind                    VARCHAR,
    "time"                  TIMESTAMP NOT NULL, -- Span start (UTC)
    duration                BIGINT NOT NULL,    -- Nanoseconds
    status_code             VARCHAR NOT NULL DEFAULT 'unset',
    status_message          VARCHAR,
    event_count             INTEGER NOT NULL DEFAULT 0,
    link_count              INTEGER NOT NULL DEFAULT 0,
    error_count             INTEGER NOT NULL DEFAULT 0,
    log_count               INTEGER NOT NULL DEFAULT 0,

    -- Promoted attributes
    service_name            VARCHAR,
    host_name               VARCHAR,
    deployment_environment  VARCHAR,

    -- Everything else, keyed by attribute name
    attributes              JSON
);

CREATE INDEX IF NOT EXISTS idx_spans_index_time ON spans_index ("time");
CREATE INDEX IF NOT EXISTS idx_spans_index_trace ON spans_index (trace_id, id);

-- Span bodies: {"attrs": {...}, "events": [...], "links": [...]}
CREATE TABLE IF NOT EXISTS spans_data (
    trace_id    VARCHAR NOT NULL,
    id          VARCHAR NOT NULL,
    "time"      TIMESTAMP NOT NULL,
    data        JSON
);

CREATE INDEX IF NOT EXISTS idx_spans_data_trace ON spans_data (trace_id, id);

-- Per-minute rollup of spans_index
CREATE TABLE IF NOT EXISTS spans_index_minutes (
    "time"                  TIMESTAMP NOT NULL, -- Start of the minute
    system                  VARCHAR NOT NULL,
    group_id                UBIGINT NOT NULL,
    name                    VARCHAR NOT NULL,
    kind                    VARCHAR,
    status_code             VARCHAR NOT NULL,
    service_name            VARCHAR,
    host_name               VARCHAR,
    deployment_environment  VARCHAR,

    span_count              BIGINT NOT NULL,
    error_count             BIGINT NOT NULL,    -- Spans with status_code = 'error'
    duration_sum            DOUBLE NOT NULL,
    duration_min            BIGINT NOT NULL,
    duration_max            BIGINT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_spans_index_minutes_time ON spans_index_minutes ("time");
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use duckdb::Connection;

    fn table_exists(conn: &Connection, table: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) > 0 FROM information_schema.tables WHERE table_name = ?",
            [table],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_schema_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        for table in [
            "schema_version",
            "spans_index",
            "spans_data",
            "spans_index_minutes",
        ] {
            assert!(table_exists(&conn, table), "missing table {}", table);
        }
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute_batch(SCHEMA).unwrap();
    }
}
