use activity_core_db::executor::{QueryError, QueryExecutor, SqlValue};
use activity_core_db::models::filters::{Granularity, MetricSource, MetricWindow};
use activity_core_db::models::timeseries::TimeBucket;
use std::sync::Arc;
use uuid::Uuid;

/// Groups one metric family's rows into fixed-granularity buckets.
///
/// Each call recomputes from scratch; there is no incremental state. The
/// returned series is sparse: intervals with no rows are absent, and callers
/// that need a continuous chart apply
/// [`activity_core_db::models::timeseries::zero_fill`]. No synthetic variance
/// is ever injected.
pub struct TimeSeriesBucketer {
    executor: Arc<dyn QueryExecutor>,
}

/// Table, timestamp column, and whether the source carries a score worth
/// averaging. All three are compile-time constants per family.
fn family(source: MetricSource) -> (&'static str, &'static str, bool) {
    match source {
        MetricSource::Authentication => ("security_log", "created_at", false),
        MetricSource::Tasks => ("tasks", "created_at", false),
        MetricSource::Documents => ("documents", "created_at", false),
        MetricSource::VendorScans => ("vendor_assessments", "created_at", true),
        MetricSource::TestRuns => ("test_runs", "created_at", false),
        MetricSource::Audits => ("assessment_history", "created_at", false),
    }
}

impl TimeSeriesBucketer {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    pub async fn series(
        &self,
        window: MetricWindow,
        source: MetricSource,
        granularity: Granularity,
        organization_id: Option<Uuid>,
    ) -> Result<Vec<TimeBucket>, QueryError> {
        let (table, ts_column, scored) = family(source);
        let score_select = if scored {
            ", AVG(score) AS average_score"
        } else {
            ""
        };

        let mut params: Vec<SqlValue> = vec![window.from.into(), window.to.into()];
        let org_clause = match organization_id {
            Some(org) => {
                params.push(org.into());
                " AND organization_id = $3"
            }
            None => "",
        };

        let sql = format!(
            "SELECT date_trunc('{granularity}', {ts_column}) AS bucket, COUNT(*) AS total{score_select} \
             FROM {table} WHERE {ts_column} >= $1 AND {ts_column} < $2{org_clause} \
             GROUP BY 1 ORDER BY 1",
            granularity = granularity.as_sql(),
        );

        let rows = self.executor.fetch_all(&sql, &params).await?;
        let mut buckets = Vec::with_capacity(rows.len());
        for row in rows {
            let bucket = row.try_timestamp("bucket")?;
            buckets.push(TimeBucket {
                label: granularity.label(bucket),
                bucket,
                count: row.try_count("total")?,
                average_score: if scored {
                    row.try_opt_numeric("average_score")?
                } else {
                    None
                },
            });
        }
        Ok(buckets)
    }
}
