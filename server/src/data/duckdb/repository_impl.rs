//! SpanIndexRepository implementation for DuckDB
//!
//! The trait is implemented for `Arc<DuckdbService>` rather than `DuckdbService` because
//! the connection guard is not `Send`: the Arc is cloned into the blocking closure and
//! the connection is locked there.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use duckdb::{Connection, OptionalExt, Row};

use super::error::DuckdbError;
use super::render::{RenderedQuery, render_count, render_select};
use super::{DuckdbService, in_transaction};
use crate::data::error::DataError;
use crate::data::traits::SpanIndexRepository;
use crate::data::types::{Cell, QueryRow};
use crate::domain::spans::model::{Span, SpanBody, StatusCode};
use crate::domain::spans::query::{SpanQuery, ValueType};

const SELECT_SPAN_SQL: &str = r#"
SELECT i.id, i.trace_id, i.parent_id, i.group_id, i.system, i.name, i.kind,
       EPOCH_US(i."time"), i.duration, i.status_code, i.status_message,
       i.event_count, i.link_count, i.error_count, CAST(d.data AS VARCHAR)
FROM spans_index i
LEFT JOIN spans_data d ON d.trace_id = i.trace_id AND d.id = i.id
WHERE i.trace_id = ? AND i.id = ?
LIMIT 1
"#;

const ROLLUP_INSERT_SQL: &str = r#"
INSERT INTO spans_index_minutes (
    "time", system, group_id, name, kind, status_code,
    service_name, host_name, deployment_environment,
    span_count, error_count, duration_sum, duration_min, duration_max
)
SELECT date_trunc('minute', "time"), system, group_id, name, kind, status_code,
       service_name, host_name, deployment_environment,
       count(*), count_if(status_code = 'error'), sum(duration)::DOUBLE,
       min(duration), max(duration)
FROM spans_index
GROUP BY ALL
"#;

fn read_cell(row: &Row<'_>, idx: usize, ty: ValueType) -> duckdb::Result<Cell> {
    let cell = match ty {
        ValueType::Str => row.get::<_, Option<String>>(idx)?.map(Cell::Str),
        ValueType::Int => row.get::<_, Option<i64>>(idx)?.map(Cell::Int),
        ValueType::UInt => row.get::<_, Option<u64>>(idx)?.map(Cell::UInt),
        ValueType::Float => row.get::<_, Option<f64>>(idx)?.map(Cell::Float),
        ValueType::Bool => row.get::<_, Option<bool>>(idx)?.map(Cell::Bool),
        ValueType::Time => row
            .get::<_, Option<i64>>(idx)?
            .and_then(DateTime::from_timestamp_micros)
            .map(Cell::Time),
    };
    Ok(cell.unwrap_or(Cell::Null))
}

fn select_rows(conn: &Connection, query: &SpanQuery) -> Result<Vec<QueryRow>, DuckdbError> {
    let RenderedQuery { sql, params } = render_select(query);
    tracing::trace!(%sql, params = params.len(), "Running span query");

    let types: Vec<ValueType> = query.columns.iter().map(|c| c.value_type()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(duckdb::params_from_iter(params.iter()), |row| {
        types
            .iter()
            .enumerate()
            .map(|(idx, ty)| read_cell(row, idx, *ty))
            .collect::<duckdb::Result<Vec<_>>>()
            .map(QueryRow)
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn count_rows(conn: &Connection, query: &SpanQuery) -> Result<u64, DuckdbError> {
    let RenderedQuery { sql, params } = render_count(query);
    let count: i64 = conn.query_row(&sql, duckdb::params_from_iter(params.iter()), |row| {
        row.get(0)
    })?;
    Ok(u64::try_from(count).unwrap_or(0))
}

fn counter(v: Option<i64>) -> u32 {
    v.and_then(|v| u32::try_from(v).ok()).unwrap_or(0)
}

/// Index row joined with its body; a span without a stored body reads as missing
fn select_span(
    conn: &Connection,
    trace_id: &str,
    span_id: &str,
) -> Result<Option<Span>, DuckdbError> {
    let found = conn
        .query_row(SELECT_SPAN_SQL, [trace_id, span_id], |row| {
            let time_us: i64 = row.get(7)?;
            let status_code: String = row.get(9)?;
            let span = Span {
                id: row.get(0)?,
                trace_id: row.get(1)?,
                parent_id: row.get(2)?,
                group_id: row.get(3)?,
                system: row.get(4)?,
                name: row.get(5)?,
                kind: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                time: DateTime::from_timestamp_micros(time_us).unwrap_or_default(),
                duration: row.get(8)?,
                status_code: StatusCode::parse(&status_code),
                status_message: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
                event_count: counter(row.get(11)?),
                link_count: counter(row.get(12)?),
                error_count: counter(row.get(13)?),
                body: SpanBody::default(),
            };
            let data: Option<String> = row.get(14)?;
            Ok((span, data))
        })
        .optional()?;

    let Some((mut span, Some(data))) = found else {
        return Ok(None);
    };
    span.body = serde_json::from_str(&data).map_err(|e| DuckdbError::Corrupt {
        what: "span body",
        reason: format!("{}/{}: {}", trace_id, span_id, e),
    })?;
    Ok(Some(span))
}

/// Replace the rollup with a fresh aggregation of the span index
pub(super) fn refresh_rollup(conn: &Connection) -> Result<u64, DuckdbError> {
    let start = std::time::Instant::now();
    in_transaction(conn, |conn| {
        conn.execute("DELETE FROM spans_index_minutes", [])?;
        let rows = conn.execute(ROLLUP_INSERT_SQL, [])?;
        tracing::debug!(
            rows,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Rollup refreshed"
        );
        Ok(rows as u64)
    })
}

#[async_trait]
impl SpanIndexRepository for Arc<DuckdbService> {
    async fn select(&self, query: &SpanQuery) -> Result<Vec<QueryRow>, DataError> {
        let db = Arc::clone(self);
        let query = query.clone();
        DuckdbService::run_query(move || {
            let conn = db.conn();
            select_rows(&conn, &query)
        })
        .await
        .map_err(DataError::from)?
        .map_err(Into::into)
    }

    async fn count(&self, query: &SpanQuery) -> Result<u64, DataError> {
        let db = Arc::clone(self);
        let query = query.clone();
        DuckdbService::run_query(move || {
            let conn = db.conn();
            count_rows(&conn, &query)
        })
        .await
        .map_err(DataError::from)?
        .map_err(Into::into)
    }

    async fn select_span(&self, trace_id: &str, span_id: &str) -> Result<Option<Span>, DataError> {
        let db = Arc::clone(self);
        let tid = trace_id.to_string();
        let sid = span_id.to_string();
        DuckdbService::run_query(move || {
            let conn = db.conn();
            select_span(&conn, &tid, &sid)
        })
        .await
        .map_err(DataError::from)?
        .map_err(Into::into)
    }

    async fn refresh_rollup(&self) -> Result<u64, DataError> {
        let db = Arc::clone(self);
        DuckdbService::run_query(move || {
            let conn = db.conn();
            refresh_rollup(&conn)
        })
        .await
        .map_err(DataError::from)?
        .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::QueryConfig;
    use crate::core::storage::AppStorage;
    use crate::data::duckdb::seed::{SeedSpan, insert_spans};
    use crate::domain::spans::SpanQueryService;
    use crate::domain::spans::filter::SpanFilter;
    use crate::domain::spans::parts::{ColumnName, CompareOp, Directive, QueryPart};
    use crate::domain::spans::query::{IndexSource, QueryBuilder};
    use chrono::{TimeDelta, TimeZone, Utc};
    use serde_json::json;
    use tempfile::TempDir;

    async fn create_service() -> (TempDir, Arc<DuckdbService>) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        tokio::fs::create_dir_all(temp_dir.path().join("duckdb"))
            .await
            .expect("Failed to create duckdb dir");
        let storage = AppStorage::init_for_test(temp_dir.path().to_path_buf());
        let db = Arc::new(DuckdbService::init(&storage).await.expect("Init should succeed"));
        (temp_dir, db)
    }

    fn window_start() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
    }

    fn hour_filter() -> SpanFilter {
        SpanFilter::new(window_start(), window_start() + TimeDelta::hours(1))
    }

    /// 25 spans inside the window, one a minute, every fifth an error
    fn seed_hour(db: &DuckdbService) {
        let spans: Vec<SeedSpan> = (0..25)
            .map(|i| {
                let mut span = SeedSpan::new(
                    format!("t{:02}", i),
                    format!("s{:02}", i),
                    window_start() + TimeDelta::minutes(i) + TimeDelta::seconds(5),
                );
                span.duration = (i + 1) * 1_000_000;
                span.group_id = if i % 2 == 0 { 1 } else { u64::MAX };
                span.name = if i % 2 == 0 { "GET /users" } else { "SELECT" }.to_string();
                span.system = if i % 2 == 0 { "http:api" } else { "db:postgresql" }.to_string();
                if i % 5 == 0 {
                    span.status_code = "error".to_string();
                }
                span.attributes = json!({"http_route": format!("/users/{}", i % 3), "retries": i});
                span
            })
            .collect();
        // Outside the window
        let late = SeedSpan::new("late", "late", window_start() + TimeDelta::hours(2));
        let conn = db.conn();
        insert_spans(&conn, &spans).unwrap();
        insert_spans(&conn, &[late]).unwrap();
    }

    #[tokio::test]
    async fn test_list_spans_pages_and_counts() {
        let (_dir, db) = create_service().await;
        seed_hour(&db);
        let service = SpanQueryService::new(Arc::new(Arc::clone(&db)), QueryConfig::default());

        let list = service.list_spans(&hour_filter()).await.unwrap();
        assert_eq!(list.spans.len(), 10);
        assert_eq!(list.count, 25);
        for span in &list.spans {
            assert!(span.trace_id.starts_with('t'));
            assert_eq!(span.body.attrs["seeded"], true);
        }
    }

    #[tokio::test]
    async fn test_list_spans_sorted_by_duration() {
        let (_dir, db) = create_service().await;
        seed_hour(&db);
        let service = SpanQueryService::new(Arc::new(Arc::clone(&db)), QueryConfig::default());

        let mut filter = hour_filter();
        filter.order = Some(crate::domain::spans::filter::SortOrder {
            column: ColumnName::attr("_duration"),
            desc: true,
        });
        filter.pager.limit = 3;
        let list = service.list_spans(&filter).await.unwrap();
        let ids: Vec<&str> = list.spans.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["s24", "s23", "s22"]);
        assert_eq!(list.spans[0].duration, 25_000_000);
    }

    #[tokio::test]
    async fn test_select_filters_on_attributes() {
        let (_dir, db) = create_service().await;
        seed_hour(&db);

        let mut filter = hour_filter();
        filter.parts.push(QueryPart::new(Directive::Where {
            attr: "http_route".into(),
            op: CompareOp::Eq,
            value: json!("/users/0"),
        }));
        filter.parts.push(QueryPart::new(Directive::Where {
            attr: "retries".into(),
            op: CompareOp::Gte,
            value: json!(10),
        }));
        let query = QueryBuilder::new(&filter).span_page().unwrap();
        // i % 3 == 0 and i >= 10: 12, 15, 18, 21, 24
        assert_eq!(db.count(&query).await.unwrap(), 5);

        let mut filter = hour_filter();
        filter.parts.push(QueryPart::new(Directive::Where {
            attr: "_name".into(),
            op: CompareOp::Contains,
            value: json!("users"),
        }));
        let query = QueryBuilder::new(&filter).span_page().unwrap();
        assert_eq!(db.count(&query).await.unwrap(), 13);
    }

    #[tokio::test]
    async fn test_groups_fast_and_slow_paths_agree() {
        let (_dir, db) = create_service().await;
        seed_hour(&db);
        assert!(db.refresh_rollup().await.unwrap() > 0);

        let filter = hour_filter();
        let builder = QueryBuilder::new(&filter);
        for source in [IndexSource::SpanMinutes, IndexSource::Spans] {
            let query = builder.groups(source, 1000).unwrap();
            let mut rows = db.select(&query).await.unwrap();
            rows.sort_by_key(|r| r.cell(0).as_u64());
            assert_eq!(rows.len(), 2, "{:?}", source);

            let count = query.column_index("_count").unwrap();
            let rate = query.column_index("_error_rate").unwrap();
            assert_eq!(rows[0].cell(0), &Cell::UInt(1));
            assert_eq!(rows[0].cell(count), &Cell::Int(13));
            assert_eq!(rows[1].cell(0), &Cell::UInt(u64::MAX));
            assert_eq!(rows[1].cell(count), &Cell::Int(12));
            // errors at 0, 10, 20 (even) and 5, 15 (odd)
            assert_eq!(rows[0].cell(rate).as_f64(), Some(3.0 / 13.0));
            assert_eq!(rows[1].cell(rate).as_f64(), Some(2.0 / 12.0));
        }
    }

    #[tokio::test]
    async fn test_groups_service_coerces_wide_ids() {
        let (_dir, db) = create_service().await;
        seed_hour(&db);
        db.refresh_rollup().await.unwrap();
        let service = SpanQueryService::new(Arc::new(Arc::clone(&db)), QueryConfig::default());

        let list = service.list_groups(&hour_filter()).await.unwrap();
        let wide = list
            .groups
            .iter()
            .find(|g| g["_group_id"].is_string())
            .expect("wide group id should be a string");
        assert_eq!(wide["_group_id"], json!(u64::MAX.to_string()));
        assert_eq!(wide["_system"], "db:postgresql");
        assert_eq!(list.columns[0].name, "_group_id");
        assert!(list.columns[0].is_group);
    }

    #[tokio::test]
    async fn test_percentiles_over_seeded_hour() {
        let (_dir, db) = create_service().await;
        seed_hour(&db);
        let service = SpanQueryService::new(Arc::new(Arc::clone(&db)), QueryConfig::default());

        let series = service.percentiles(&hour_filter()).await.unwrap();
        assert_eq!(series.time.len(), 60);
        assert_eq!(series.count.len(), 60);
        assert_eq!(series.count.iter().sum::<u64>(), 25);
        assert_eq!(series.count[30], 0);
        assert_eq!(series.error_count[5], 1);
        assert_eq!(series.p50[24], 25_000_000.0);
        assert!(series.p99.iter().all(|v| v.is_finite()));
    }

    #[tokio::test]
    async fn test_stats_count_series() {
        let (_dir, db) = create_service().await;
        seed_hour(&db);
        let service = SpanQueryService::new(Arc::new(Arc::clone(&db)), QueryConfig::default());

        let mut filter = hour_filter();
        filter.column = Some(ColumnName::attr("_count"));
        let stats = service.stats(&filter).await.unwrap();
        let counts = stats["_count"].as_array().unwrap();
        assert_eq!(counts.len(), 60);
        assert_eq!(counts[0], json!(1));
        assert_eq!(counts[59], json!(0));
        assert_eq!(stats["time"].as_array().unwrap().len(), 60);
    }

    #[tokio::test]
    async fn test_select_span_reads_body() {
        let (_dir, db) = create_service().await;
        seed_hour(&db);

        let span = db.select_span("t03", "s03").await.unwrap().unwrap();
        assert_eq!(span.name, "SELECT");
        assert_eq!(span.group_id, u64::MAX);
        assert_eq!(span.status_code, StatusCode::Unset);
        assert_eq!(span.time, window_start() + TimeDelta::minutes(3) + TimeDelta::seconds(5));
        assert_eq!(span.body.attrs["seeded"], true);

        assert!(db.select_span("t03", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_select_span_corrupt_body() {
        let (_dir, db) = create_service().await;
        seed_hour(&db);
        db.conn()
            .execute(
                r#"UPDATE spans_data SET data = '{"attrs": 5}' WHERE trace_id = 't01'"#,
                [],
            )
            .unwrap();

        let err = db.select_span("t01", "s01").await.unwrap_err();
        assert!(matches!(err, DataError::Corrupt { what: "span body", .. }));
    }

    #[tokio::test]
    async fn test_refresh_rollup_replaces_rows() {
        let (_dir, db) = create_service().await;
        seed_hour(&db);

        let first = db.refresh_rollup().await.unwrap();
        let second = db.refresh_rollup().await.unwrap();
        assert_eq!(first, second);

        let total: i64 = db
            .conn()
            .query_row("SELECT sum(span_count) FROM spans_index_minutes", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(total, 26);
    }
}
