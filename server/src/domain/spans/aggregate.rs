//! Bucketed aggregation
//!
//! Storage returns one row per non-empty bucket. These helpers gap-fill against the
//! [`BucketPlan`] and pivot into one array per metric, positionally aligned with the
//! plan's boundaries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

use super::bucket::BucketPlan;

/// Quantile ranks reported by the percentiles endpoint
pub const PERCENTILES: [f64; 3] = [0.5, 0.9, 0.99];

/// Aggregates for one non-empty bucket as returned by storage
#[derive(Debug, Clone, PartialEq)]
pub struct BucketRow {
    pub time: DateTime<Utc>,
    pub count: u64,
    pub error_count: u64,
    /// p50, p90, p99 estimates; `None` when the estimator had no data
    pub quantiles: [Option<f64>; 3],
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct BucketStats {
    count: u64,
    error_count: u64,
    quantiles: [f64; 3],
}

/// Columnar percentiles response
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PercentileSeries {
    pub count: Vec<u64>,
    pub rate: Vec<f64>,
    pub error_count: Vec<u64>,
    pub error_rate: Vec<f64>,
    pub p50: Vec<f64>,
    pub p90: Vec<f64>,
    pub p99: Vec<f64>,
    pub time: Vec<DateTime<Utc>>,
}

/// Replace an estimate containing NaN, infinity or a missing rank with zeros.
///
/// An empty digest reports NaN for every rank, and JSON has no NaN literal.
pub fn sanitize_quantiles(qs: [Option<f64>; 3]) -> [f64; 3] {
    match qs {
        [Some(a), Some(b), Some(c)] if a.is_finite() && b.is_finite() && c.is_finite() => {
            [a.round(), b.round(), c.round()]
        }
        _ => [0.0; 3],
    }
}

/// `count / minutes`; `minutes` must be positive
pub fn per_minute(count: u64, minutes: f64) -> f64 {
    debug_assert!(minutes > 0.0, "rate over a zero-width bucket");
    count as f64 / minutes
}

/// Gap-fill bucket rows and pivot them into per-metric arrays
pub fn percentile_series(
    plan: &BucketPlan,
    rows: impl IntoIterator<Item = BucketRow>,
) -> PercentileSeries {
    let mut buckets = vec![BucketStats::default(); plan.len()];

    for row in rows {
        let Some(idx) = plan.index_of(row.time) else {
            tracing::debug!(time = %row.time, "Dropping bucket row outside the plan");
            continue;
        };
        let bucket = &mut buckets[idx];
        bucket.count += row.count;
        bucket.error_count += row.error_count;
        bucket.quantiles = sanitize_quantiles(row.quantiles);
    }

    let minutes = plan.width_minutes();
    let mut series = PercentileSeries {
        count: Vec::with_capacity(buckets.len()),
        rate: Vec::with_capacity(buckets.len()),
        error_count: Vec::with_capacity(buckets.len()),
        error_rate: Vec::with_capacity(buckets.len()),
        p50: Vec::with_capacity(buckets.len()),
        p90: Vec::with_capacity(buckets.len()),
        p99: Vec::with_capacity(buckets.len()),
        time: plan.boundaries().to_vec(),
    };
    for b in buckets {
        series.count.push(b.count);
        series.rate.push(per_minute(b.count, minutes));
        series.error_count.push(b.error_count);
        series.error_rate.push(per_minute(b.error_count, minutes));
        series.p50.push(b.quantiles[0]);
        series.p90.push(b.quantiles[1]);
        series.p99.push(b.quantiles[2]);
    }
    series
}

/// Gap-fill a single metric into `{ <name>: [...], "time": [...] }`.
///
/// Missing buckets and non-numeric values become `0`.
pub fn column_series(
    plan: &BucketPlan,
    name: &str,
    rows: impl IntoIterator<Item = (DateTime<Utc>, JsonValue)>,
) -> serde_json::Map<String, JsonValue> {
    let mut values = vec![JsonValue::from(0); plan.len()];
    for (time, value) in rows {
        match plan.index_of(time) {
            Some(idx) if value.is_number() => values[idx] = value,
            Some(_) => {}
            None => tracing::debug!(%time, "Dropping bucket row outside the plan"),
        }
    }

    let time: Vec<JsonValue> = plan
        .boundaries()
        .iter()
        .map(|t| JsonValue::String(t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)))
        .collect();

    let mut out = serde_json::Map::new();
    out.insert(name.to_string(), JsonValue::Array(values));
    out.insert("time".to_string(), JsonValue::Array(time));
    out
}
