use activity_core_db::executor::{QueryError, QueryExecutor, SqlRow, SqlValue};
use activity_core_db::models::filters::MetricWindow;
use activity_core_db::models::top_lists::{
    ActorActivityRank, StatusCount, TopLists, VendorRiskRank,
};
use std::sync::Arc;

/// Top-N rankings and per-status breakdowns. Every sub-query degrades to an
/// empty list on failure; an empty window yields empty lists, not an error.
pub struct TopListAggregator {
    executor: Arc<dyn QueryExecutor>,
}

impl TopListAggregator {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    pub async fn top_lists(&self, window: MetricWindow, limit: u32) -> TopLists {
        let (actors, vendors, vendor_status, task_status, document_status) = tokio::join!(
            self.most_active_actors(window, limit),
            self.riskiest_vendors(limit),
            self.status_breakdown("vendors", window),
            self.status_breakdown("tasks", window),
            self.status_breakdown("documents", window),
        );

        TopLists {
            most_active_actors: Self::or_empty("most_active_actors", actors),
            riskiest_vendors: Self::or_empty("riskiest_vendors", vendors),
            vendor_status: Self::or_empty("vendor_status", vendor_status),
            task_status: Self::or_empty("task_status", task_status),
            document_status: Self::or_empty("document_status", document_status),
        }
    }

    fn or_empty<T>(list: &str, result: Result<Vec<T>, QueryError>) -> Vec<T> {
        match result {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(list, error = %err, "top list query failed; returning empty");
                Vec::new()
            }
        }
    }

    /// Actors by event volume, most-recent-activity breaking ties.
    pub async fn most_active_actors(
        &self,
        window: MetricWindow,
        limit: u32,
    ) -> Result<Vec<ActorActivityRank>, QueryError> {
        let params: Vec<SqlValue> = vec![
            window.from.into(),
            window.to.into(),
            SqlValue::Int(i64::from(limit)),
        ];
        let sql = "SELECT user_email, COUNT(*) AS total, MAX(created_at) AS last_seen \
             FROM security_log \
             WHERE user_email IS NOT NULL AND created_at >= $1 AND created_at < $2 \
             GROUP BY user_email ORDER BY total DESC, last_seen DESC LIMIT $3";

        let rows = self.executor.fetch_all(sql, &params).await?;
        rows.iter().map(actor_rank).collect()
    }

    /// Vendors ranked worst-first by risk score, most recent scan breaking
    /// ties; unscored vendors sort last.
    pub async fn riskiest_vendors(&self, limit: u32) -> Result<Vec<VendorRiskRank>, QueryError> {
        let params = vec![SqlValue::Int(i64::from(limit))];
        let sql = "SELECT id, name, risk_score, risk_grade, last_assessed_at \
             FROM vendors WHERE deleted_at IS NULL \
             ORDER BY risk_score ASC NULLS LAST, last_assessed_at DESC NULLS LAST LIMIT $1";

        let rows = self.executor.fetch_all(sql, &params).await?;
        rows.iter().map(vendor_rank).collect()
    }

    async fn status_breakdown(
        &self,
        table: &'static str,
        window: MetricWindow,
    ) -> Result<Vec<StatusCount>, QueryError> {
        let params: Vec<SqlValue> = vec![window.from.into(), window.to.into()];
        let sql = format!(
            "SELECT status, COUNT(*) AS total FROM {table} \
             WHERE created_at >= $1 AND created_at < $2 \
             GROUP BY status ORDER BY total DESC"
        );
        let rows = self.executor.fetch_all(&sql, &params).await?;
        rows.iter()
            .map(|row| {
                Ok(StatusCount {
                    status: row.try_text("status")?,
                    count: row.try_count("total")?,
                })
            })
            .collect()
    }
}

fn actor_rank(row: &SqlRow) -> Result<ActorActivityRank, QueryError> {
    Ok(ActorActivityRank {
        actor_email: row.try_text("user_email")?,
        event_count: row.try_count("total")?,
        last_activity_at: row.try_timestamp("last_seen")?,
    })
}

fn vendor_rank(row: &SqlRow) -> Result<VendorRiskRank, QueryError> {
    Ok(VendorRiskRank {
        vendor_id: row.try_uuid("id")?,
        name: row.try_text("name")?,
        risk_score: row.try_opt_numeric("risk_score")?,
        risk_grade: row.try_opt_text("risk_grade")?,
        last_assessed_at: row.try_opt_timestamp("last_assessed_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helper::{row, FakeExecutor};
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn window() -> MetricWindow {
        MetricWindow::new(
            Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 5, 8, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn empty_window_returns_empty_lists() {
        let aggregator = TopListAggregator::new(Arc::new(FakeExecutor::new()));
        let lists = aggregator.top_lists(window(), 10).await;
        assert!(lists.most_active_actors.is_empty());
        assert!(lists.riskiest_vendors.is_empty());
        assert!(lists.vendor_status.is_empty());
        assert!(lists.task_status.is_empty());
        assert!(lists.document_status.is_empty());
    }

    #[tokio::test]
    async fn rankings_map_rows_in_order() {
        let last_seen = Utc.with_ymd_and_hms(2025, 5, 6, 9, 0, 0).unwrap();
        let executor = FakeExecutor::new()
            .on(
                "FROM security_log",
                vec![
                    row(vec![
                        ("user_email", SqlValue::Text("alice@example.com".into())),
                        ("total", SqlValue::Int(31)),
                        ("last_seen", SqlValue::Timestamp(last_seen)),
                    ]),
                    row(vec![
                        ("user_email", SqlValue::Text("bob@example.com".into())),
                        ("total", SqlValue::Int(4)),
                        ("last_seen", SqlValue::Timestamp(last_seen)),
                    ]),
                ],
            )
            .on(
                "FROM vendors WHERE deleted_at IS NULL",
                vec![row(vec![
                    ("id", SqlValue::Uuid(Uuid::new_v4())),
                    ("name", SqlValue::Text("Shady Hosting".into())),
                    ("risk_score", SqlValue::Numeric(Decimal::from(12))),
                    ("risk_grade", SqlValue::Text("F".into())),
                    ("last_assessed_at", SqlValue::Timestamp(last_seen)),
                ])],
            )
            .on(
                "FROM tasks",
                vec![row(vec![
                    ("status", SqlValue::Text("open".into())),
                    ("total", SqlValue::Int(9)),
                ])],
            );

        let aggregator = TopListAggregator::new(Arc::new(executor));
        let lists = aggregator.top_lists(window(), 10).await;

        assert_eq!(lists.most_active_actors.len(), 2);
        assert_eq!(lists.most_active_actors[0].actor_email, "alice@example.com");
        assert_eq!(lists.most_active_actors[0].event_count, 31);

        assert_eq!(lists.riskiest_vendors[0].name, "Shady Hosting");
        assert_eq!(lists.riskiest_vendors[0].risk_score, Some(Decimal::from(12)));

        assert_eq!(lists.task_status[0].status, "open");
        assert_eq!(lists.task_status[0].count, 9);
    }
}
