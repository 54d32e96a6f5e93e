//! Adaptive time bucketing
//!
//! Picks the smallest "nice" bucket width that keeps the number of points within
//! budget and produces the complete, epoch-aligned boundary sequence for a window.

use chrono::{DateTime, TimeDelta, Utc};

use crate::core::config::QueryConfig;

const SECOND_US: i64 = 1_000_000;
const MINUTE_US: i64 = 60 * SECOND_US;
const HOUR_US: i64 = 60 * MINUTE_US;
const DAY_US: i64 = 24 * HOUR_US;

/// Candidate widths in microseconds, ascending
const WIDTH_LADDER_US: &[i64] = &[
    SECOND_US,
    5 * SECOND_US,
    10 * SECOND_US,
    15 * SECOND_US,
    30 * SECOND_US,
    MINUTE_US,
    2 * MINUTE_US,
    5 * MINUTE_US,
    10 * MINUTE_US,
    15 * MINUTE_US,
    30 * MINUTE_US,
    HOUR_US,
    2 * HOUR_US,
    3 * HOUR_US,
    6 * HOUR_US,
    12 * HOUR_US,
    DAY_US,
    2 * DAY_US,
    7 * DAY_US,
    14 * DAY_US,
    30 * DAY_US,
];

/// Chosen width plus the gap-free sequence of bucket starts
#[derive(Debug, Clone, PartialEq)]
pub struct BucketPlan {
    width_us: i64,
    start_us: i64,
    boundaries: Vec<DateTime<Utc>>,
}

impl BucketPlan {
    #[cfg(test)]
    pub fn width(&self) -> TimeDelta {
        TimeDelta::microseconds(self.width_us)
    }

    pub fn width_us(&self) -> i64 {
        self.width_us
    }

    /// Always positive
    pub fn width_minutes(&self) -> f64 {
        self.width_us as f64 / MINUTE_US as f64
    }

    pub fn boundaries(&self) -> &[DateTime<Utc>] {
        &self.boundaries
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    /// Position of the bucket starting at `start`, if it belongs to this plan
    pub fn index_of(&self, start: DateTime<Utc>) -> Option<usize> {
        let offset = start.timestamp_micros() - self.start_us;
        if offset < 0 || offset % self.width_us != 0 {
            return None;
        }
        let idx = usize::try_from(offset / self.width_us).ok()?;
        (idx < self.boundaries.len()).then_some(idx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketPlanner {
    point_budget: usize,
    min_width_us: i64,
}

impl BucketPlanner {
    /// `point_budget` is clamped to `max_points` and to at least one point
    pub fn new(point_budget: usize, max_points: usize, min_width: TimeDelta) -> Self {
        let min_width_us = min_width.num_microseconds().unwrap_or(SECOND_US).max(SECOND_US);
        Self {
            point_budget: point_budget.min(max_points).max(1),
            min_width_us,
        }
    }

    pub fn from_config(config: &QueryConfig) -> Self {
        Self::new(
            config.point_budget,
            config.max_points,
            TimeDelta::seconds(config.min_bucket_secs as i64),
        )
    }

    #[cfg(test)]
    pub fn point_budget(&self) -> usize {
        self.point_budget
    }

    pub fn plan(&self, time_gte: DateTime<Utc>, time_lt: DateTime<Utc>) -> BucketPlan {
        let gte_us = time_gte.timestamp_micros();
        let lt_us = time_lt.timestamp_micros();
        let width_us = self.choose_width(gte_us, lt_us);
        let start_us = floor_to(gte_us, width_us);

        let mut boundaries = Vec::with_capacity(bucket_count(gte_us, lt_us, width_us));
        if lt_us > gte_us {
            let mut t = start_us;
            while t < lt_us {
                if let Some(ts) = DateTime::from_timestamp_micros(t) {
                    boundaries.push(ts);
                }
                t += width_us;
            }
        }

        tracing::trace!(
            width_secs = width_us / SECOND_US,
            points = boundaries.len(),
            budget = self.point_budget,
            "Planned buckets"
        );

        BucketPlan {
            width_us,
            start_us,
            boundaries,
        }
    }

    fn choose_width(&self, gte_us: i64, lt_us: i64) -> i64 {
        let fits = |w: i64| bucket_count(gte_us, lt_us, w) <= self.point_budget;

        if let Some(&w) = WIDTH_LADDER_US
            .iter()
            .filter(|&&w| w >= self.min_width_us)
            .find(|&&w| fits(w))
        {
            return w;
        }

        // Past the ladder: multiples of the largest rung, or of the minimum width
        let top = WIDTH_LADDER_US[WIDTH_LADDER_US.len() - 1].max(self.min_width_us);
        let budget = self.point_budget as i64;
        let mut k = ((lt_us - gte_us) / top / budget).max(1);
        while !fits(top * k) {
            k += 1;
        }
        top * k
    }
}

fn floor_to(t_us: i64, width_us: i64) -> i64 {
    t_us.div_euclid(width_us) * width_us
}

/// Boundaries needed to cover `[gte, lt)` starting from the floored `gte`
fn bucket_count(gte_us: i64, lt_us: i64, width_us: i64) -> usize {
    if lt_us <= gte_us {
        return 0;
    }
    let span = lt_us - floor_to(gte_us, width_us);
    let n = span / width_us + i64::from(span % width_us != 0);
    usize::try_from(n).unwrap_or(usize::MAX)
}
