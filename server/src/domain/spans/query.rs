//! Query plans over the span index
//!
//! A [`SpanQuery`] is a storage-neutral description of one query: source table,
//! select list, conjunctive conditions, ordering and paging. The DuckDB layer renders
//! it to SQL. Two precisions exist:
//!
//! - [`IndexSource::Spans`]: raw rows, exact
//! - [`IndexSource::SpanMinutes`]: per-minute rollup, cheap but coarse

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use super::aggregate::PERCENTILES;
use super::bucket::BucketPlan;
use super::filter::SpanFilter;
use super::parts::{AggFunc, ColumnName, CompareOp, Directive, QueryPart, is_valid_attr_key};
use crate::domain::attrkey::{self, KeyCategory};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("invalid attribute name {0:?}")]
    InvalidAttr(String),

    #[error("{0:?} is a computed metric and cannot be filtered or grouped on")]
    NotAField(String),

    #[error("invalid column {name:?}: {reason}")]
    InvalidColumn { name: String, reason: String },

    #[error("{0:?} is not available in the pre-aggregated index")]
    NotInRollup(String),

    #[error("invalid value for {attr:?}: {reason}")]
    InvalidValue { attr: String, reason: String },

    #[error("column {0:?} is not an aggregate")]
    NotAggregate(String),
}

impl QueryError {
    fn invalid_column(name: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidColumn {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    fn invalid_value(attr: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            attr: attr.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    Spans,
    SpanMinutes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Str,
    Int,
    UInt,
    Float,
    Bool,
    Time,
}

impl ValueType {
    pub fn is_num(&self) -> bool {
        matches!(self, Self::Int | Self::UInt | Self::Float)
    }
}

/// Where a key's value lives
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Dedicated index column
    Column { name: &'static str, ty: ValueType },
    /// Entry of the JSON attributes column, always read as a string
    Attr(String),
}

impl Field {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Column { ty, .. } => *ty,
            Self::Attr(_) => ValueType::Str,
        }
    }

    fn is_numeric_source(&self) -> bool {
        match self {
            Self::Column { ty, .. } => ty.is_num(),
            Self::Attr(_) => true,
        }
    }
}

const fn col(name: &'static str, ty: ValueType) -> Field {
    Field::Column { name, ty }
}

/// Keys backed by columns of the raw span index
const SPAN_COLUMNS: &[(&str, Field)] = &[
    (attrkey::SPAN_ID, col("id", ValueType::Str)),
    (attrkey::SPAN_TRACE_ID, col("trace_id", ValueType::Str)),
    (attrkey::SPAN_PARENT_ID, col("parent_id", ValueType::Str)),
    (attrkey::SPAN_GROUP_ID, col("group_id", ValueType::UInt)),
    (attrkey::SPAN_SYSTEM, col("system", ValueType::Str)),
    (attrkey::SPAN_NAME, col("name", ValueType::Str)),
    (attrkey::SPAN_EVENT_NAME, col("event_name", ValueType::Str)),
    (attrkey::SPAN_IS_EVENT, col("is_event", ValueType::Bool)),
    (attrkey::SPAN_KIND, col("kind", ValueType::Str)),
    (attrkey::SPAN_TIME, col("time", ValueType::Time)),
    (attrkey::SPAN_DURATION, col("duration", ValueType::Int)),
    (attrkey::SPAN_STATUS_CODE, col("status_code", ValueType::Str)),
    (attrkey::SPAN_STATUS_MESSAGE, col("status_message", ValueType::Str)),
    (attrkey::SPAN_EVENT_COUNT, col("event_count", ValueType::Int)),
    (attrkey::SPAN_LINK_COUNT, col("link_count", ValueType::Int)),
    (attrkey::SPAN_EVENT_ERROR_COUNT, col("error_count", ValueType::Int)),
    (attrkey::SPAN_EVENT_LOG_COUNT, col("log_count", ValueType::Int)),
    (attrkey::SERVICE_NAME, col("service_name", ValueType::Str)),
    (attrkey::HOST_NAME, col("host_name", ValueType::Str)),
    (attrkey::DEPLOYMENT_ENVIRONMENT, col("deployment_environment", ValueType::Str)),
];

/// Dimensions kept by the per-minute rollup
const MINUTE_COLUMNS: &[(&str, Field)] = &[
    (attrkey::SPAN_GROUP_ID, col("group_id", ValueType::UInt)),
    (attrkey::SPAN_SYSTEM, col("system", ValueType::Str)),
    (attrkey::SPAN_NAME, col("name", ValueType::Str)),
    (attrkey::SPAN_KIND, col("kind", ValueType::Str)),
    (attrkey::SPAN_TIME, col("time", ValueType::Time)),
    (attrkey::SPAN_STATUS_CODE, col("status_code", ValueType::Str)),
    (attrkey::SERVICE_NAME, col("service_name", ValueType::Str)),
    (attrkey::HOST_NAME, col("host_name", ValueType::Str)),
    (attrkey::DEPLOYMENT_ENVIRONMENT, col("deployment_environment", ValueType::Str)),
];

/// Resolve an attribute key against an index source
pub fn resolve_field(source: IndexSource, key: &str) -> Result<Field, QueryError> {
    if !is_valid_attr_key(key) {
        return Err(QueryError::InvalidAttr(key.to_string()));
    }
    if attrkey::lookup(key).is_some_and(|info| info.category == KeyCategory::SpanMetric) {
        return Err(QueryError::NotAField(key.to_string()));
    }

    let columns = match source {
        IndexSource::Spans => SPAN_COLUMNS,
        IndexSource::SpanMinutes => MINUTE_COLUMNS,
    };
    if let Some((_, field)) = columns.iter().find(|(k, _)| *k == key) {
        return Ok(field.clone());
    }

    match source {
        IndexSource::Spans => Ok(Field::Attr(key.to_string())),
        IndexSource::SpanMinutes => Err(QueryError::NotInRollup(key.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumAgg {
    Avg,
    Min,
    Max,
    Sum,
}

impl NumAgg {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnExpr {
    Field(Field),
    AnyValue(Field),
    Count,
    ErrorCount,
    ErrorRate,
    /// Count (or error count) divided by `minutes`
    PerMin { errors: bool, minutes: f64 },
    Quantile { field: Field, q: f64 },
    Agg { func: NumAgg, field: Field },
    Uniq(Field),
    /// Duration aggregate computed from the rollup's pre-aggregated columns
    RollupDuration(NumAgg),
    /// Start of the epoch-aligned bucket containing the span
    TimeBucket { width_us: i64 },
}

impl ColumnExpr {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Field(f) | Self::AnyValue(f) => f.value_type(),
            Self::Count | Self::ErrorCount | Self::Uniq(_) => ValueType::Int,
            Self::ErrorRate
            | Self::PerMin { .. }
            | Self::Quantile { .. }
            | Self::Agg { .. }
            | Self::RollupDuration(_) => ValueType::Float,
            Self::TimeBucket { .. } => ValueType::Time,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        !matches!(self, Self::Field(_) | Self::TimeBucket { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub alias: String,
    pub expr: ColumnExpr,
    pub is_group: bool,
}

impl SelectItem {
    pub fn value_type(&self) -> ValueType {
        self.expr.value_type()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Time(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    One(Scalar),
    Many(Vec<Scalar>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: Field,
    pub op: CompareOp,
    pub operand: Operand,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderKey {
    Alias(String),
    Field(Field),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub key: OrderKey,
    pub desc: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpanQuery {
    pub source: IndexSource,
    pub columns: Vec<SelectItem>,
    pub conditions: Vec<Condition>,
    pub order: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SpanQuery {
    pub fn new(source: IndexSource) -> Self {
        Self {
            source,
            columns: Vec::new(),
            conditions: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn column_index(&self, alias: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.alias == alias)
    }

    #[cfg(test)]
    pub fn group_keys(&self) -> impl Iterator<Item = &SelectItem> {
        self.columns.iter().filter(|c| c.is_group)
    }

    /// Select items sharing an alias are kept once
    fn push_column(&mut self, item: SelectItem) {
        if self.column_index(&item.alias).is_none() {
            self.columns.push(item);
        }
    }
}

/// A step that refines a query plan
pub trait QueryStage {
    fn apply(&self, query: SpanQuery) -> Result<SpanQuery, QueryError>;
}

/// Time window, duration bounds and span systems
pub struct BaseFilter<'a>(pub &'a SpanFilter);

impl QueryStage for BaseFilter<'_> {
    fn apply(&self, mut query: SpanQuery) -> Result<SpanQuery, QueryError> {
        let f = self.0;
        let time = resolve_field(query.source, attrkey::SPAN_TIME)?;
        let time_gte = match query.source {
            // Rollup rows are stamped with the start of their minute
            IndexSource::SpanMinutes => floor_minute(f.time_gte),
            IndexSource::Spans => f.time_gte,
        };
        query.conditions.push(Condition {
            field: time.clone(),
            op: CompareOp::Gte,
            operand: Operand::One(Scalar::Time(time_gte)),
        });
        query.conditions.push(Condition {
            field: time,
            op: CompareOp::Lt,
            operand: Operand::One(Scalar::Time(f.time_lt)),
        });

        for (bound, op) in [(f.duration_gte, CompareOp::Gte), (f.duration_lt, CompareOp::Lt)] {
            if let Some(ns) = bound {
                query.conditions.push(Condition {
                    field: resolve_field(query.source, attrkey::SPAN_DURATION)?,
                    op,
                    operand: Operand::One(Scalar::Int(ns)),
                });
            }
        }

        if !f.systems.is_empty() {
            query.conditions.push(Condition {
                field: resolve_field(query.source, attrkey::SPAN_SYSTEM)?,
                op: CompareOp::In,
                operand: Operand::Many(f.systems.iter().cloned().map(Scalar::Str).collect()),
            });
        }

        Ok(query)
    }
}

/// Enabled `where` parts, each one a conjunctive condition
pub struct WhereParts<'a>(pub &'a [QueryPart]);

impl QueryStage for WhereParts<'_> {
    fn apply(&self, mut query: SpanQuery) -> Result<SpanQuery, QueryError> {
        for part in self.0.iter().filter(|p| p.is_enabled()) {
            if let Directive::Where { attr, op, value } = &part.directive {
                let field = resolve_field(query.source, attr)?;
                let operand = operand_for(attr, &field, *op, value)?;
                query.conditions.push(Condition {
                    field,
                    op: *op,
                    operand,
                });
            }
        }
        Ok(query)
    }
}

fn floor_minute(t: DateTime<Utc>) -> DateTime<Utc> {
    let us = t.timestamp_micros();
    DateTime::from_timestamp_micros(us - us.rem_euclid(60_000_000)).unwrap_or(t)
}

fn operand_for(
    attr: &str,
    field: &Field,
    op: CompareOp,
    value: &JsonValue,
) -> Result<Operand, QueryError> {
    match op {
        CompareOp::Exists | CompareOp::NotExists => Ok(Operand::None),
        CompareOp::In | CompareOp::NotIn => {
            let items = match value {
                JsonValue::Array(items) => items.as_slice(),
                other => std::slice::from_ref(other),
            };
            if items.is_empty() {
                return Err(QueryError::invalid_value(attr, "expected a non-empty list"));
            }
            let scalars = items
                .iter()
                .map(|v| scalar_for(attr, field, op, v))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Operand::Many(scalars))
        }
        CompareOp::Contains | CompareOp::NotContains => {
            if field.value_type() != ValueType::Str {
                return Err(QueryError::invalid_value(
                    attr,
                    "contains only applies to string attributes",
                ));
            }
            match value {
                JsonValue::String(s) => Ok(Operand::One(Scalar::Str(s.clone()))),
                _ => Err(QueryError::invalid_value(attr, "expected a string")),
            }
        }
        _ => Ok(Operand::One(scalar_for(attr, field, op, value)?)),
    }
}

fn scalar_for(
    attr: &str,
    field: &Field,
    op: CompareOp,
    value: &JsonValue,
) -> Result<Scalar, QueryError> {
    let text = || match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    };
    let bad = |expected: &str| QueryError::invalid_value(attr, format!("expected {}", expected));

    match field {
        // Attributes are strings; range comparisons on numbers compare numerically
        Field::Attr(_) => {
            if op.is_range()
                && let Some(n) = value
                    .as_f64()
                    .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            {
                return Ok(Scalar::Float(n));
            }
            text().map(Scalar::Str).ok_or_else(|| bad("a scalar"))
        }
        Field::Column { ty, .. } => match ty {
            ValueType::Str => text().map(Scalar::Str).ok_or_else(|| bad("a scalar")),
            ValueType::Int => value
                .as_i64()
                .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
                .map(Scalar::Int)
                .ok_or_else(|| bad("an integer")),
            ValueType::UInt => value
                .as_u64()
                .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
                .map(Scalar::UInt)
                .ok_or_else(|| bad("an unsigned integer")),
            ValueType::Float => value
                .as_f64()
                .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
                .map(Scalar::Float)
                .ok_or_else(|| bad("a number")),
            ValueType::Bool => match value {
                JsonValue::Bool(b) => Ok(Scalar::Bool(*b)),
                JsonValue::String(s) if s == "true" || s == "false" => Ok(Scalar::Bool(s == "true")),
                _ => Err(bad("a boolean")),
            },
            ValueType::Time => value
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| Scalar::Time(dt.with_timezone(&Utc)))
                .ok_or_else(|| bad("an RFC 3339 timestamp")),
        },
    }
}

/// Compiles a [`SpanFilter`] into query plans for each endpoint
pub struct QueryBuilder<'a> {
    filter: &'a SpanFilter,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(filter: &'a SpanFilter) -> Self {
        Self { filter }
    }

    fn filtered(&self, source: IndexSource) -> Result<SpanQuery, QueryError> {
        let query = BaseFilter(self.filter).apply(SpanQuery::new(source))?;
        WhereParts(&self.filter.parts).apply(query)
    }

    /// Page of span identities, exact
    pub fn span_page(&self) -> Result<SpanQuery, QueryError> {
        let mut q = self.filtered(IndexSource::Spans)?;
        for key in [attrkey::SPAN_TRACE_ID, attrkey::SPAN_ID] {
            q.push_column(SelectItem {
                alias: key.to_string(),
                expr: ColumnExpr::Field(resolve_field(IndexSource::Spans, key)?),
                is_group: false,
            });
        }

        if let Some(order) = &self.filter.order {
            if order.column.func.is_some() {
                return Err(QueryError::invalid_column(
                    &order.column,
                    "spans can only be sorted by an attribute",
                ));
            }
            q.order.push(OrderBy {
                key: OrderKey::Field(resolve_field(IndexSource::Spans, &order.column.attr)?),
                desc: order.desc,
            });
        }

        q.limit = Some(self.filter.pager.limit);
        q.offset = Some(self.filter.pager.offset);
        Ok(q)
    }

    /// Grouped aggregates. Enabled group parts become keys (default `_group_id`),
    /// column parts become select items. The page size never exceeds `max_groups`.
    pub fn groups(&self, source: IndexSource, max_groups: u64) -> Result<SpanQuery, QueryError> {
        let mut q = self.filtered(source)?;

        let mut group_attrs: Vec<&str> = self
            .filter
            .enabled_parts()
            .filter_map(|p| match &p.directive {
                Directive::Group { attr } => Some(attr.as_str()),
                _ => None,
            })
            .collect();
        let default_grouping = group_attrs.is_empty();
        if default_grouping {
            group_attrs.push(attrkey::SPAN_GROUP_ID);
        }
        for attr in &group_attrs {
            q.push_column(SelectItem {
                alias: attr.to_string(),
                expr: ColumnExpr::Field(resolve_field(source, attr)?),
                is_group: true,
            });
        }

        let mut columns = self
            .filter
            .enabled_parts()
            .filter_map(|p| match &p.directive {
                Directive::Column { name } => Some(name),
                _ => None,
            })
            .map(|name| {
                name.parse::<ColumnName>()
                    .map_err(|e| QueryError::invalid_column(name, e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if columns.is_empty() {
            if default_grouping {
                columns.push(ColumnName::attr(attrkey::SPAN_SYSTEM));
                columns.push(ColumnName::attr(attrkey::SPAN_NAME));
            }
            columns.push(ColumnName::attr(attrkey::SPAN_COUNT));
            columns.push(ColumnName {
                func: Some(AggFunc::PerMin),
                attr: attrkey::SPAN_COUNT.to_string(),
            });
            columns.push(ColumnName::attr(attrkey::SPAN_ERROR_RATE));
        }

        let minutes = self.filter.window_minutes().max(f64::MIN_POSITIVE);
        for column in &columns {
            let expr = column_expr(source, column, minutes, &group_attrs)?;
            q.push_column(SelectItem {
                alias: column.to_string(),
                expr,
                is_group: false,
            });
        }

        if let Some(order) = &self.filter.order {
            let alias = order.column.to_string();
            if q.column_index(&alias).is_none() {
                return Err(QueryError::invalid_column(alias, "sort column is not selected"));
            }
            q.order.push(OrderBy {
                key: OrderKey::Alias(alias),
                desc: order.desc,
            });
        }

        q.limit = Some(self.filter.pager.limit.min(max_groups));
        q.offset = Some(self.filter.pager.offset);
        Ok(q)
    }

    /// Count, error count and duration quantiles per bucket
    pub fn percentiles(&self, plan: &BucketPlan, max_points: usize) -> Result<SpanQuery, QueryError> {
        let mut q = self.time_series(plan, max_points)?;
        let duration = resolve_field(IndexSource::Spans, attrkey::SPAN_DURATION)?;
        q.push_column(SelectItem {
            alias: "count".to_string(),
            expr: ColumnExpr::Count,
            is_group: false,
        });
        q.push_column(SelectItem {
            alias: "errorCount".to_string(),
            expr: ColumnExpr::ErrorCount,
            is_group: false,
        });
        for (alias, q_rank) in ["p50", "p90", "p99"].into_iter().zip(PERCENTILES) {
            q.push_column(SelectItem {
                alias: alias.to_string(),
                expr: ColumnExpr::Quantile {
                    field: duration.clone(),
                    q: q_rank,
                },
                is_group: false,
            });
        }
        Ok(q)
    }

    /// One aggregate per bucket, exact
    pub fn column_series(
        &self,
        plan: &BucketPlan,
        column: &ColumnName,
        max_points: usize,
    ) -> Result<SpanQuery, QueryError> {
        let expr = column_expr(IndexSource::Spans, column, plan.width_minutes(), &[])?;
        if !expr.is_aggregate() || matches!(expr, ColumnExpr::AnyValue(_)) {
            return Err(QueryError::NotAggregate(column.to_string()));
        }
        let mut q = self.time_series(plan, max_points)?;
        q.push_column(SelectItem {
            alias: column.to_string(),
            expr,
            is_group: false,
        });
        Ok(q)
    }

    fn time_series(&self, plan: &BucketPlan, max_points: usize) -> Result<SpanQuery, QueryError> {
        let mut q = self.filtered(IndexSource::Spans)?;
        q.push_column(SelectItem {
            alias: "time".to_string(),
            expr: ColumnExpr::TimeBucket {
                width_us: plan.width_us(),
            },
            is_group: true,
        });
        q.order.push(OrderBy {
            key: OrderKey::Alias("time".to_string()),
            desc: false,
        });
        q.limit = Some(max_points as u64);
        Ok(q)
    }
}

/// Translate a column name into an expression for `source`
fn column_expr(
    source: IndexSource,
    column: &ColumnName,
    minutes: f64,
    group_attrs: &[&str],
) -> Result<ColumnExpr, QueryError> {
    let attr = column.attr.as_str();
    let is_metric =
        attrkey::lookup(attr).is_some_and(|info| info.category == KeyCategory::SpanMetric);

    let numeric = |source: IndexSource| -> Result<Field, QueryError> {
        let field = resolve_field(source, attr)?;
        if field.is_numeric_source() {
            Ok(field)
        } else {
            Err(QueryError::invalid_column(column, "attribute is not numeric"))
        }
    };

    let expr = match (column.func, attr) {
        (None, attrkey::SPAN_COUNT) => ColumnExpr::Count,
        (None, attrkey::SPAN_ERROR_COUNT) => ColumnExpr::ErrorCount,
        (None, attrkey::SPAN_ERROR_RATE) => ColumnExpr::ErrorRate,
        (Some(AggFunc::PerMin), attrkey::SPAN_COUNT) => ColumnExpr::PerMin {
            errors: false,
            minutes,
        },
        (Some(AggFunc::PerMin), attrkey::SPAN_ERROR_COUNT) => ColumnExpr::PerMin {
            errors: true,
            minutes,
        },
        (Some(AggFunc::PerMin), _) => {
            return Err(QueryError::invalid_column(
                column,
                "per_min applies to _count and _error_count only",
            ));
        }
        (Some(_), _) if is_metric => {
            return Err(QueryError::invalid_column(
                column,
                "metrics cannot be aggregated again",
            ));
        }
        (None, _) => {
            let field = resolve_field(source, attr)?;
            if group_attrs.contains(&attr) {
                ColumnExpr::Field(field)
            } else {
                ColumnExpr::AnyValue(field)
            }
        }
        (Some(AggFunc::Any), _) => ColumnExpr::AnyValue(resolve_field(source, attr)?),
        (Some(AggFunc::Uniq), _) => ColumnExpr::Uniq(resolve_field(source, attr)?),
        (Some(func @ (AggFunc::P50 | AggFunc::P75 | AggFunc::P90 | AggFunc::P99)), _) => {
            if source == IndexSource::SpanMinutes {
                return Err(QueryError::NotInRollup(column.to_string()));
            }
            ColumnExpr::Quantile {
                field: numeric(source)?,
                q: func.quantile().unwrap_or(0.5),
            }
        }
        (Some(func @ (AggFunc::Avg | AggFunc::Min | AggFunc::Max | AggFunc::Sum)), _) => {
            let func = match func {
                AggFunc::Avg => NumAgg::Avg,
                AggFunc::Min => NumAgg::Min,
                AggFunc::Max => NumAgg::Max,
                _ => NumAgg::Sum,
            };
            match source {
                IndexSource::Spans => ColumnExpr::Agg {
                    func,
                    field: numeric(source)?,
                },
                IndexSource::SpanMinutes if attr == attrkey::SPAN_DURATION => {
                    ColumnExpr::RollupDuration(func)
                }
                IndexSource::SpanMinutes => {
                    return Err(QueryError::NotInRollup(column.to_string()));
                }
            }
        }
    };
    Ok(expr)
}
