//! SpanQuery to DuckDB SQL
//!
//! Values are always bound as positional parameters. Attribute keys are inlined into
//! JSON paths, which is safe because [`resolve_field`] only accepts `[A-Za-z0-9_.-]+`.
//!
//! Every select item is cast to the type the row reader expects for its
//! [`ValueType`]; time values come back as epoch microseconds.
//!
//! [`resolve_field`]: crate::domain::spans::query::resolve_field

use super::sql_types::SqlParam;
use crate::domain::spans::parts::CompareOp;
use crate::domain::spans::query::{
    ColumnExpr, Condition, Field, IndexSource, NumAgg, Operand, OrderKey, Scalar, SelectItem,
    SpanQuery, ValueType,
};
use crate::utils::sql::{contains_pattern, json_key_path, quote_ident};

/// SQL text plus parameters in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

pub fn table_name(source: IndexSource) -> &'static str {
    match source {
        IndexSource::Spans => "spans_index",
        IndexSource::SpanMinutes => "spans_index_minutes",
    }
}

/// Full select: columns, conditions, grouping, ordering and paging
pub fn render_select(query: &SpanQuery) -> RenderedQuery {
    let mut params = Vec::new();

    let select = query
        .columns
        .iter()
        .map(|item| select_item(query.source, item, &mut params))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!("SELECT {} FROM {}", select, table_name(query.source));
    push_where(&mut sql, &query.conditions, &mut params);

    let has_aggregate = query.columns.iter().any(|c| c.expr.is_aggregate());
    let group_positions: Vec<String> = query
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_group)
        .map(|(idx, _)| (idx + 1).to_string())
        .collect();
    if has_aggregate && !group_positions.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&group_positions.join(", "));
    }

    let order: Vec<String> = query
        .order
        .iter()
        .filter_map(|o| {
            let key = match &o.key {
                OrderKey::Alias(alias) => (query.column_index(alias)? + 1).to_string(),
                OrderKey::Field(field) => field_sql(field),
            };
            Some(if o.desc {
                format!("{} DESC NULLS LAST", key)
            } else {
                format!("{} ASC", key)
            })
        })
        .collect();
    if !order.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.join(", "));
    }

    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    if let Some(offset) = query.offset.filter(|&o| o > 0) {
        sql.push_str(&format!(" OFFSET {}", offset));
    }

    RenderedQuery { sql, params }
}

/// Number of rows matching the conditions; select list, order and paging are ignored
pub fn render_count(query: &SpanQuery) -> RenderedQuery {
    let mut params = Vec::new();
    let mut sql = format!("SELECT count(*) FROM {}", table_name(query.source));
    push_where(&mut sql, &query.conditions, &mut params);
    RenderedQuery { sql, params }
}

fn push_where(sql: &mut String, conditions: &[Condition], params: &mut Vec<SqlParam>) {
    if conditions.is_empty() {
        return;
    }
    let clauses: Vec<String> = conditions
        .iter()
        .map(|c| condition_sql(c, params))
        .collect();
    sql.push_str(" WHERE ");
    sql.push_str(&clauses.join(" AND "));
}

fn attr_sql(key: &str) -> String {
    format!("json_extract_string(attributes, {})", json_key_path(key))
}

/// Raw value of a field: column reference or JSON attribute (as text)
fn field_sql(field: &Field) -> String {
    match field {
        Field::Column { name, .. } => quote_ident(name),
        Field::Attr(key) => attr_sql(key),
    }
}

/// Field as a number; attributes that do not parse become NULL
fn numeric_sql(field: &Field) -> String {
    match field {
        Field::Column { .. } => field_sql(field),
        Field::Attr(key) => format!("TRY_CAST({} AS DOUBLE)", attr_sql(key)),
    }
}

fn count_sql(source: IndexSource) -> &'static str {
    match source {
        IndexSource::Spans => "count(*)",
        IndexSource::SpanMinutes => "sum(\"span_count\")",
    }
}

fn error_count_sql(source: IndexSource) -> &'static str {
    match source {
        IndexSource::Spans => "count_if(\"status_code\" = 'error')",
        IndexSource::SpanMinutes => "sum(\"error_count\")",
    }
}

fn rollup_duration_sql(func: NumAgg) -> String {
    match func {
        NumAgg::Avg => "sum(\"duration_sum\") / nullif(sum(\"span_count\"), 0)".to_string(),
        NumAgg::Min => "min(\"duration_min\")".to_string(),
        NumAgg::Max => "max(\"duration_max\")".to_string(),
        NumAgg::Sum => "sum(\"duration_sum\")".to_string(),
    }
}

fn expr_sql(source: IndexSource, expr: &ColumnExpr, params: &mut Vec<SqlParam>) -> String {
    match expr {
        ColumnExpr::Field(field) => field_sql(field),
        ColumnExpr::AnyValue(field) => format!("any_value({})", field_sql(field)),
        ColumnExpr::Count => count_sql(source).to_string(),
        ColumnExpr::ErrorCount => error_count_sql(source).to_string(),
        ColumnExpr::ErrorRate => format!(
            "CAST({} AS DOUBLE) / nullif({}, 0)",
            error_count_sql(source),
            count_sql(source)
        ),
        ColumnExpr::PerMin { errors, minutes } => {
            let counted = if *errors {
                error_count_sql(source)
            } else {
                count_sql(source)
            };
            params.push(SqlParam::Float(*minutes));
            format!("CAST({} AS DOUBLE) / ?", counted)
        }
        // approx_quantile needs a constant rank
        ColumnExpr::Quantile { field, q } => {
            format!("approx_quantile({}, {})", numeric_sql(field), q)
        }
        ColumnExpr::Agg { func, field } => format!("{}({})", func.as_sql(), numeric_sql(field)),
        ColumnExpr::Uniq(field) => format!("count(DISTINCT {})", field_sql(field)),
        ColumnExpr::RollupDuration(func) => rollup_duration_sql(*func),
        ColumnExpr::TimeBucket { width_us } => {
            format!("(EPOCH_US(\"time\") // {w}) * {w}", w = width_us)
        }
    }
}

fn select_item(source: IndexSource, item: &SelectItem, params: &mut Vec<SqlParam>) -> String {
    let expr = expr_sql(source, &item.expr, params);
    match (item.value_type(), &item.expr) {
        (ValueType::Time, ColumnExpr::TimeBucket { .. }) => expr,
        (ValueType::Time, _) => format!("EPOCH_US({})", expr),
        (ValueType::Str, _) => format!("CAST({} AS VARCHAR)", expr),
        (ValueType::Int, _) => format!("CAST({} AS BIGINT)", expr),
        (ValueType::UInt, _) => format!("CAST({} AS UBIGINT)", expr),
        (ValueType::Float, _) => format!("CAST({} AS DOUBLE)", expr),
        (ValueType::Bool, _) => format!("CAST({} AS BOOLEAN)", expr),
    }
}

fn placeholder(scalar: &Scalar, params: &mut Vec<SqlParam>) -> &'static str {
    params.push(SqlParam::from(scalar));
    match scalar {
        Scalar::Time(_) => "CAST(? AS TIMESTAMP)",
        _ => "?",
    }
}

fn condition_sql(cond: &Condition, params: &mut Vec<SqlParam>) -> String {
    let lhs = match (&cond.field, &cond.operand) {
        (Field::Attr(_), Operand::One(Scalar::Float(_))) => numeric_sql(&cond.field),
        _ => field_sql(&cond.field),
    };

    match (&cond.operand, cond.op) {
        (Operand::None, op) => format!("{} {}", lhs, op.as_sql()),
        (Operand::One(Scalar::Str(s)), CompareOp::Contains | CompareOp::NotContains) => {
            params.push(SqlParam::Text(contains_pattern(s)));
            format!("{} {} ? ESCAPE '\\'", lhs, cond.op.as_sql())
        }
        (Operand::One(scalar), op) => {
            format!("{} {} {}", lhs, op.as_sql(), placeholder(scalar, params))
        }
        (Operand::Many(items), op) => {
            let holders: Vec<&str> = items.iter().map(|s| placeholder(s, params)).collect();
            format!("{} {} ({})", lhs, op.as_sql(), holders.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::spans::bucket::BucketPlanner;
    use crate::domain::spans::filter::SpanFilter;
    use crate::domain::spans::parts::{ColumnName, Directive, QueryPart};
    use crate::domain::spans::query::QueryBuilder;
    use chrono::{TimeDelta, TimeZone, Utc};
    use serde_json::json;

    fn filter() -> SpanFilter {
        let gte = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        SpanFilter::new(gte, gte + TimeDelta::hours(1))
    }

    fn with_where(attr: &str, op: CompareOp, value: serde_json::Value) -> SpanFilter {
        let mut f = filter();
        f.parts.push(QueryPart::new(Directive::Where {
            attr: attr.to_string(),
            op,
            value,
        }));
        f
    }

    #[test]
    fn test_render_span_page() {
        let q = QueryBuilder::new(&filter()).span_page().unwrap();
        let r = render_select(&q);
        assert_eq!(
            r.sql,
            "SELECT CAST(\"trace_id\" AS VARCHAR), CAST(\"id\" AS VARCHAR) FROM spans_index \
             WHERE \"time\" >= CAST(? AS TIMESTAMP) AND \"time\" < CAST(? AS TIMESTAMP) LIMIT 10"
        );
        assert_eq!(r.params.len(), 2);
        assert!(matches!(r.params[0], SqlParam::Timestamp(_)));
    }

    #[test]
    fn test_render_count_ignores_paging() {
        let mut f = filter();
        f.pager.offset = 20;
        let q = QueryBuilder::new(&f).span_page().unwrap();
        let r = render_count(&q);
        assert_eq!(
            r.sql,
            "SELECT count(*) FROM spans_index \
             WHERE \"time\" >= CAST(? AS TIMESTAMP) AND \"time\" < CAST(? AS TIMESTAMP)"
        );
        assert!(render_select(&q).sql.ends_with("LIMIT 10 OFFSET 20"));
    }

    #[test]
    fn test_render_attribute_conditions() {
        let q = QueryBuilder::new(&with_where("http.route", CompareOp::Eq, json!("/users")))
            .span_page()
            .unwrap();
        let r = render_select(&q);
        assert!(
            r.sql
                .contains("json_extract_string(attributes, '$.\"http.route\"') = ?")
        );
        assert_eq!(r.params[2], SqlParam::Text("/users".into()));

        let q = QueryBuilder::new(&with_where("retries", CompareOp::Gt, json!(3)))
            .span_page()
            .unwrap();
        let r = render_select(&q);
        assert!(
            r.sql
                .contains("TRY_CAST(json_extract_string(attributes, '$.\"retries\"') AS DOUBLE) > ?")
        );
        assert_eq!(r.params[2], SqlParam::Float(3.0));
    }

    #[test]
    fn test_render_contains_escapes_like() {
        let q = QueryBuilder::new(&with_where("_name", CompareOp::Contains, json!("100%_x")))
            .span_page()
            .unwrap();
        let r = render_select(&q);
        assert!(r.sql.contains("\"name\" LIKE ? ESCAPE '\\'"));
        assert_eq!(r.params[2], SqlParam::Text("%100\\%\\_x%".into()));
    }

    #[test]
    fn test_render_in_and_exists() {
        let q = QueryBuilder::new(&with_where(
            "_status_code",
            CompareOp::NotIn,
            json!(["error", "unset"]),
        ))
        .span_page()
        .unwrap();
        let r = render_select(&q);
        assert!(r.sql.contains("\"status_code\" NOT IN (?, ?)"));
        assert_eq!(r.params.len(), 4);

        let q = QueryBuilder::new(&with_where("peer.service", CompareOp::NotExists, json!(null)))
            .span_page()
            .unwrap();
        let r = render_select(&q);
        assert!(
            r.sql
                .contains("json_extract_string(attributes, '$.\"peer.service\"') IS NULL")
        );
        assert_eq!(r.params.len(), 2);
    }

    #[test]
    fn test_render_default_groups_on_rollup() {
        let q = QueryBuilder::new(&filter())
            .groups(IndexSource::SpanMinutes, 1000)
            .unwrap();
        let r = render_select(&q);
        assert!(r.sql.starts_with(
            "SELECT CAST(\"group_id\" AS UBIGINT), CAST(any_value(\"system\") AS VARCHAR), \
             CAST(any_value(\"name\") AS VARCHAR), CAST(sum(\"span_count\") AS BIGINT), \
             CAST(CAST(sum(\"span_count\") AS DOUBLE) / ? AS DOUBLE)"
        ));
        assert!(r.sql.contains("FROM spans_index_minutes"));
        assert!(r.sql.ends_with("GROUP BY 1 LIMIT 1000"));
        // per_min divisor comes before the time bounds
        assert_eq!(r.params[0], SqlParam::Float(60.0));
        assert!(matches!(r.params[1], SqlParam::Timestamp(_)));
    }

    #[test]
    fn test_render_group_order_by_position() {
        let mut f = filter();
        f.parts.push(QueryPart::new(Directive::Group {
            attr: "service_name".into(),
        }));
        f.parts.push(QueryPart::new(Directive::Column {
            name: "p99(_duration)".into(),
        }));
        f.order = Some(crate::domain::spans::filter::SortOrder {
            column: "p99(_duration)".parse::<ColumnName>().unwrap(),
            desc: true,
        });
        let q = QueryBuilder::new(&f).groups(IndexSource::Spans, 1000).unwrap();
        let r = render_select(&q);
        assert!(
            r.sql
                .contains("CAST(approx_quantile(\"duration\", 0.99) AS DOUBLE)")
        );
        assert!(
            r.sql
                .ends_with("GROUP BY 1 ORDER BY 2 DESC NULLS LAST LIMIT 1000")
        );
    }

    #[test]
    fn test_render_percentiles_buckets() {
        let f = filter();
        let plan = BucketPlanner::new(300, 10_000, TimeDelta::seconds(60)).plan(f.time_gte, f.time_lt);
        let q = QueryBuilder::new(&f).percentiles(&plan, 10_000).unwrap();
        let r = render_select(&q);
        assert!(r.sql.starts_with(
            "SELECT (EPOCH_US(\"time\") // 60000000) * 60000000, CAST(count(*) AS BIGINT), \
             CAST(count_if(\"status_code\" = 'error') AS BIGINT)"
        ));
        assert!(r.sql.ends_with("GROUP BY 1 ORDER BY 1 ASC LIMIT 10000"));
    }
}
