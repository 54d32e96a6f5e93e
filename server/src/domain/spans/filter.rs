//! Request filter decoding
//!
//! Turns raw query parameters into a validated [`SpanFilter`]. Predicate parts are
//! carried through untouched; the query builder gives them meaning.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use validator::Validate;

use super::parts::{ColumnName, Directive, QueryPart, parse_parts};
use crate::core::config::QueryConfig;
use crate::core::constants::{DEFAULT_SPANS_PAGE_LIMIT, SPANS_MAX_PAGE_LIMIT};

/// A request parameter failed validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid parameter '{param}': {message}")]
pub struct ValidationError {
    pub param: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(param: &'static str, message: impl Into<String>) -> Self {
        Self {
            param,
            message: message.into(),
        }
    }
}

/// Raw query parameters shared by all span endpoints
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SpanFilterParams {
    pub time_gte: Option<String>,
    pub time_lt: Option<String>,
    /// Nanoseconds
    pub duration_gte: Option<i64>,
    /// Nanoseconds
    pub duration_lt: Option<i64>,
    /// Comma-separated span systems
    #[validate(length(max = 1024))]
    pub system: Option<String>,
    /// JSON array of parsed query parts
    #[validate(length(max = 10240))]
    pub query: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    #[validate(length(max = 256))]
    pub sort_by: Option<String>,
    pub sort_desc: Option<bool>,
    #[validate(length(max = 256))]
    pub column: Option<String>,
}

/// Which endpoint the filter is decoded for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    Spans,
    Groups,
    Percentiles,
    Stats,
}

impl DecodeMode {
    /// Listing and single-metric endpoints cannot honor group or column directives
    fn strips_columns_and_groups(&self) -> bool {
        matches!(self, Self::Spans | Self::Stats)
    }

    fn requires_column(&self) -> bool {
        matches!(self, Self::Stats)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub column: ColumnName,
    pub desc: bool,
}

/// Validated, request-scoped filter. Read-only once decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanFilter {
    /// Inclusive lower bound
    pub time_gte: DateTime<Utc>,
    /// Exclusive upper bound
    pub time_lt: DateTime<Utc>,
    pub duration_gte: Option<i64>,
    pub duration_lt: Option<i64>,
    pub systems: Vec<String>,
    pub parts: Vec<QueryPart>,
    pub pager: Pager,
    pub order: Option<SortOrder>,
    pub column: Option<ColumnName>,
}

impl SpanFilter {
    /// Filter over a window with no other constraints
    pub fn new(time_gte: DateTime<Utc>, time_lt: DateTime<Utc>) -> Self {
        Self {
            time_gte,
            time_lt,
            duration_gte: None,
            duration_lt: None,
            systems: Vec::new(),
            parts: Vec::new(),
            pager: Pager {
                limit: DEFAULT_SPANS_PAGE_LIMIT,
                offset: 0,
            },
            order: None,
            column: None,
        }
    }

    pub fn decode(
        params: SpanFilterParams,
        mode: DecodeMode,
        config: &QueryConfig,
    ) -> Result<Self, ValidationError> {
        let time_gte = parse_time("time_gte", params.time_gte.as_deref())?;
        let time_lt = parse_time("time_lt", params.time_lt.as_deref())?;
        if time_gte > time_lt {
            return Err(ValidationError::new(
                "time_gte",
                format!("must not be after time_lt ({} > {})", time_gte, time_lt),
            ));
        }

        if let Some(v) = params.duration_gte
            && v < 0
        {
            return Err(ValidationError::new("duration_gte", "must be non-negative"));
        }
        if let Some(v) = params.duration_lt
            && v < 0
        {
            return Err(ValidationError::new("duration_lt", "must be non-negative"));
        }
        if let (Some(gte), Some(lt)) = (params.duration_gte, params.duration_lt)
            && gte > lt
        {
            return Err(ValidationError::new(
                "duration_gte",
                "must not be greater than duration_lt",
            ));
        }

        let systems = params
            .system
            .as_deref()
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let mut parts = match params.query.as_deref() {
            Some(json) if !json.trim().is_empty() => parse_parts(json)?,
            _ => Vec::new(),
        };
        if mode.strips_columns_and_groups() {
            disable_columns_and_groups(&mut parts);
        }

        let (default_limit, max_limit) = match mode {
            DecodeMode::Groups => (config.groups_limit, config.groups_limit),
            _ => (config.page_limit, SPANS_MAX_PAGE_LIMIT),
        };
        let limit = params.limit.unwrap_or(default_limit);
        if limit == 0 || limit > max_limit {
            return Err(ValidationError::new(
                "limit",
                format!("must be between 1 and {}", max_limit),
            ));
        }
        let pager = Pager {
            limit,
            offset: params.offset.unwrap_or(0),
        };

        let order = match params.sort_by.as_deref() {
            Some(s) if !s.trim().is_empty() => Some(SortOrder {
                column: s
                    .parse()
                    .map_err(|e| ValidationError::new("sort_by", format!("{}", e)))?,
                desc: params.sort_desc.unwrap_or(true),
            }),
            _ => None,
        };

        let column = match params.column.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => Some(
                s.parse::<ColumnName>()
                    .map_err(|e| ValidationError::new("column", format!("{}", e)))?,
            ),
            _ => None,
        };
        if mode.requires_column() && column.is_none() {
            return Err(ValidationError::new(
                "column",
                "'column' query param is required",
            ));
        }

        tracing::trace!(
            ?mode,
            %time_gte,
            %time_lt,
            parts = parts.len(),
            "Decoded span filter"
        );

        Ok(Self {
            time_gte,
            time_lt,
            duration_gte: params.duration_gte,
            duration_lt: params.duration_lt,
            systems,
            parts,
            pager,
            order,
            column,
        })
    }

    pub fn window(&self) -> TimeDelta {
        self.time_lt - self.time_gte
    }

    /// Window length in minutes, used for per-minute rates
    pub fn window_minutes(&self) -> f64 {
        self.window().num_microseconds().unwrap_or(i64::MAX) as f64 / 60_000_000.0
    }

    pub fn enabled_parts(&self) -> impl Iterator<Item = &QueryPart> {
        self.parts.iter().filter(|p| p.is_enabled())
    }
}

fn disable_columns_and_groups(parts: &mut [QueryPart]) {
    for part in parts.iter_mut() {
        if matches!(
            part.directive,
            Directive::Group { .. } | Directive::Column { .. }
        ) {
            part.disabled = true;
        }
    }
}

fn parse_time(param: &'static str, value: Option<&str>) -> Result<DateTime<Utc>, ValidationError> {
    let value = value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ValidationError::new(param, "is required"))?;
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            ValidationError::new(
                param,
                format!("invalid timestamp {:?}, use RFC 3339 format", value),
            )
        })
}
