use chrono::{DateTime, DurationRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::filters::{Granularity, MetricWindow};

/// One fixed-granularity interval of a metric family's time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBucket {
    /// Truncated interval start.
    pub bucket: DateTime<Utc>,
    pub label: String,
    pub count: i64,
    /// Only populated for score-bearing sources (vendor scans).
    pub average_score: Option<Decimal>,
}

impl TimeBucket {
    pub fn empty(bucket: DateTime<Utc>, granularity: Granularity) -> Self {
        Self {
            label: granularity.label(bucket),
            bucket,
            count: 0,
            average_score: None,
        }
    }
}

/// Back-fill the intervals the grouped query had no rows for.
///
/// The bucketer itself returns a sparse series; continuous chart rendering
/// wants one entry per interval, with honest zeros rather than synthetic
/// variance. Buckets outside the window are preserved as-is at the tail.
pub fn zero_fill(
    buckets: Vec<TimeBucket>,
    window: MetricWindow,
    granularity: Granularity,
) -> Vec<TimeBucket> {
    let step = granularity.step();
    let Ok(mut cursor) = window.from.duration_trunc(step) else {
        return buckets;
    };

    let mut by_time: std::collections::BTreeMap<DateTime<Utc>, TimeBucket> = buckets
        .into_iter()
        .map(|bucket| (bucket.bucket, bucket))
        .collect();

    let mut filled = Vec::new();
    while cursor < window.to {
        match by_time.remove(&cursor) {
            Some(bucket) => filled.push(bucket),
            None => filled.push(TimeBucket::empty(cursor, granularity)),
        }
        cursor += step;
    }
    // Buckets off the aligned grid (shouldn't happen for date_trunc output)
    // are kept rather than dropped.
    filled.extend(by_time.into_values());
    filled.sort_by_key(|bucket| bucket.bucket);
    filled
}
