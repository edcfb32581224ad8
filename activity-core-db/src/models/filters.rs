use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::activity::{Activity, ActivityAction, SourceKind};

/// Filters over the merged activity stream. Everything is optional; absent
/// options constrain nothing. Date range and organization are pushed down to
/// the source queries, the rest is applied in memory after the merge (the
/// stream spans heterogeneous tables, so predicates cannot be pushed down
/// uniformly).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityFilters {
    pub search: Option<String>,
    pub action: Option<ActivityAction>,
    pub source: Option<SourceKind>,
    pub actor_email: Option<String>,
    pub organization_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl ActivityFilters {
    /// The in-memory predicate applied over the concatenated stream.
    pub fn matches(&self, activity: &Activity) -> bool {
        if let Some(action) = self.action {
            if activity.action != action {
                return false;
            }
        }
        if let Some(source) = self.source {
            if activity.source != source {
                return false;
            }
        }
        if let Some(actor) = &self.actor_email {
            match &activity.actor_email {
                Some(email) if email.eq_ignore_ascii_case(actor) => {}
                _ => return false,
            }
        }
        if let Some(org) = self.organization_id {
            if activity.organization_id != Some(org) {
                return false;
            }
        }
        if let Some(from) = self.from {
            if activity.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if activity.timestamp >= to {
                return false;
            }
        }
        if let Some(needle) = &self.search {
            let needle = needle.to_lowercase();
            if !needle.is_empty() && !Self::text_matches(activity, &needle) {
                return false;
            }
        }
        true
    }

    fn text_matches(activity: &Activity, needle: &str) -> bool {
        let haystacks = [
            activity.actor_email.as_deref(),
            activity.actor_name.as_deref(),
            activity.entity_name.as_deref(),
            activity.organization_name.as_deref(),
            activity.metadata.get("event").and_then(Value::as_str),
        ];
        haystacks
            .into_iter()
            .flatten()
            .any(|hay| hay.to_lowercase().contains(needle))
    }
}

/// A half-open `[from, to)` analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl MetricWindow {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// Trailing window of `days` ending now.
    pub fn last_days(days: i64) -> Self {
        let to = Utc::now();
        Self {
            from: to - Duration::days(days),
            to,
        }
    }

    pub fn duration(&self) -> Duration {
        self.to - self.from
    }

    /// The contiguous, equal-length window immediately preceding this one:
    /// `previous().to == self.from` always holds.
    pub fn previous(&self) -> MetricWindow {
        MetricWindow {
            from: self.from - self.duration(),
            to: self.from,
        }
    }
}

/// Bucketing granularity for time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    Day,
}

impl Granularity {
    /// The `date_trunc` field name. A closed enum, so this never carries
    /// user input into query text.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Granularity::Hour => "hour",
            Granularity::Day => "day",
        }
    }

    pub fn step(&self) -> Duration {
        match self {
            Granularity::Hour => Duration::hours(1),
            Granularity::Day => Duration::days(1),
        }
    }

    pub fn label(&self, at: DateTime<Utc>) -> String {
        match self {
            Granularity::Hour => at.format("%Y-%m-%d %H:00").to_string(),
            Granularity::Day => at.format("%Y-%m-%d").to_string(),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Granularity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(Granularity::Hour),
            "day" => Ok(Granularity::Day),
            _ => Err(()),
        }
    }
}

/// The metric families available to the KPI calculator and bucketer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricSource {
    Authentication,
    Tasks,
    Documents,
    VendorScans,
    TestRuns,
    Audits,
}

impl MetricSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricSource::Authentication => "authentication",
            MetricSource::Tasks => "tasks",
            MetricSource::Documents => "documents",
            MetricSource::VendorScans => "vendor_scans",
            MetricSource::TestRuns => "test_runs",
            MetricSource::Audits => "audits",
        }
    }
}

impl fmt::Display for MetricSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricSource {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authentication" => Ok(MetricSource::Authentication),
            "tasks" => Ok(MetricSource::Tasks),
            "documents" => Ok(MetricSource::Documents),
            "vendor_scans" => Ok(MetricSource::VendorScans),
            "test_runs" => Ok(MetricSource::TestRuns),
            "audits" => Ok(MetricSource::Audits),
            _ => Err(()),
        }
    }
}

/// Filters for the vendor directory search. Absent values are omitted from
/// the predicate entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VendorSearchFilters {
    pub search: Option<String>,
    pub status: Option<String>,
    pub grade: Option<String>,
    pub min_score: Option<Decimal>,
    pub max_score: Option<Decimal>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}
