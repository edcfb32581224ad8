use activity_core_api::error::{ActivityError, ActivityResult};
use activity_core_db::executor::{QueryError, QueryExecutor, SqlValue};
use activity_core_db::models::filters::{ActivityFilters, MetricWindow};
use activity_core_db::models::journey::{
    sessions_from_logins, ActorProfile, DocumentJourney, FeatureUsage, Journey, LoginSession,
    RiskProfile, RiskSignals, SecuritySummary, TaskJourney, VendorJourney,
};
use activity_core_db::repository::pagination::PageRequest;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::federation::ActivityFederation;
use crate::org_directory::OrgDirectory;

/// How much of the merged stream one journey pulls in.
const ACTIVITY_SLICE_LIMIT: usize = 200;
/// Most recent logins considered for session reconstruction.
const SESSION_LOGIN_LIMIT: i64 = 50;
/// A vendor scored below this counts as a high-risk signal.
const HIGH_RISK_SCORE_CEILING: i64 = 40;

/// Composes the full per-actor view: profile, estimated sessions, the
/// actor's merged activity slice, per-domain sub-journeys, and the heuristic
/// risk profile. Everything after the profile lookup degrades independently;
/// an unresolvable profile is the journey's only hard failure.
pub struct JourneyComposer {
    executor: Arc<dyn QueryExecutor>,
    federation: Arc<ActivityFederation>,
    org_names: OrgDirectory,
}

impl JourneyComposer {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        federation: Arc<ActivityFederation>,
        org_names: OrgDirectory,
    ) -> Self {
        Self {
            executor,
            federation,
            org_names,
        }
    }

    pub async fn compose(&self, actor_email: &str, window: MetricWindow) -> ActivityResult<Journey> {
        let profile = match self.find_profile(actor_email).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                return Err(ActivityError::NotFound(format!("actor {actor_email}")));
            }
            Err(err) => {
                tracing::warn!(actor = actor_email, error = %err, "profile lookup failed");
                return Err(ActivityError::NotFound(format!("actor {actor_email}")));
            }
        };

        let (sessions, activities, vendors, tasks, documents, security) = tokio::join!(
            self.sessions(actor_email, window),
            self.activity_slice(actor_email, window),
            self.vendor_journey(actor_email, window),
            self.task_journey(actor_email, window),
            self.document_journey(actor_email, window),
            self.security_summary(actor_email, window),
        );

        let sessions = Self::or_default("sessions", sessions);
        let vendors = Self::or_default("vendors", vendors);
        let tasks = Self::or_default("tasks", tasks);
        let documents = Self::or_default("documents", documents);
        let security = Self::or_default("security", security);

        let feature_usage = FeatureUsage::from_activities(&activities);
        let risk = RiskProfile::from_signals(RiskSignals {
            high_risk_vendors: vendors.high_risk,
            high_risk_tasks: tasks.high_priority_open,
            high_severity_security_events: security.high_severity,
            failed_logins: security.failed_logins,
        });

        Ok(Journey {
            profile,
            window,
            sessions,
            activities,
            vendors,
            tasks,
            documents,
            security,
            feature_usage,
            risk,
        })
    }

    fn or_default<T: Default>(part: &str, result: Result<T, QueryError>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(part, error = %err, "journey sub-read failed; zeroing");
                T::default()
            }
        }
    }

    async fn find_profile(&self, actor_email: &str) -> Result<Option<ActorProfile>, QueryError> {
        let sql = "SELECT id, email, first_name, last_name, role, organization_id, \
                    created_at, last_login_at \
             FROM users WHERE lower(email) = $1";
        let Some(row) = self
            .executor
            .fetch_optional(sql, &[actor_email.to_lowercase().into()])
            .await?
        else {
            return Ok(None);
        };

        let organization_id = row.try_opt_uuid("organization_id")?;
        let organization_name = match organization_id {
            Some(org) => self.org_names.resolve(org).await,
            None => None,
        };
        let first_name = row.try_opt_text("first_name")?;
        let last_name = row.try_opt_text("last_name")?;
        let name = match (first_name, last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (first, last) => first.or(last),
        };

        Ok(Some(ActorProfile {
            id: row.try_uuid("id")?,
            email: row.try_text("email")?,
            name,
            role: row.try_text("role")?,
            organization_id,
            organization_name,
            created_at: row.try_timestamp("created_at")?,
            last_login_at: row.try_opt_timestamp("last_login_at")?,
        }))
    }

    async fn sessions(
        &self,
        actor_email: &str,
        window: MetricWindow,
    ) -> Result<Vec<LoginSession>, QueryError> {
        let sql = "SELECT created_at, ip_address FROM security_log \
             WHERE event_type = 'LOGIN_SUCCESS' AND lower(user_email) = $1 \
               AND created_at >= $2 AND created_at < $3 \
             ORDER BY created_at DESC LIMIT $4";
        let params: Vec<SqlValue> = vec![
            actor_email.to_lowercase().into(),
            window.from.into(),
            window.to.into(),
            SqlValue::Int(SESSION_LOGIN_LIMIT),
        ];
        let rows = self.executor.fetch_all(sql, &params).await?;

        let mut logins = Vec::with_capacity(rows.len());
        for row in &rows {
            logins.push((row.try_timestamp("created_at")?, row.try_opt_text("ip_address")?));
        }
        Ok(sessions_from_logins(&logins))
    }

    /// The merged stream post-filtered to this actor. The federation already
    /// degrades per source, so this slice cannot fail, only shrink.
    async fn activity_slice(
        &self,
        actor_email: &str,
        window: MetricWindow,
    ) -> Vec<activity_core_db::models::activity::Activity> {
        let filters = ActivityFilters {
            actor_email: Some(actor_email.to_string()),
            from: Some(window.from),
            to: Some(window.to),
            ..Default::default()
        };
        self.federation
            .merge(&filters, PageRequest::new(ACTIVITY_SLICE_LIMIT, 0))
            .await
            .items
    }

    async fn vendor_journey(
        &self,
        actor_email: &str,
        window: MetricWindow,
    ) -> Result<VendorJourney, QueryError> {
        let sql = "SELECT status, COUNT(*) AS total, \
               COUNT(*) FILTER (WHERE risk_score < $4) AS high_risk \
             FROM vendors \
             WHERE deleted_at IS NULL \
               AND (lower(created_by_email) = $1 OR lower(assigned_to_email) = $1) \
               AND created_at >= $2 AND created_at < $3 \
             GROUP BY status";
        let params: Vec<SqlValue> = vec![
            actor_email.to_lowercase().into(),
            window.from.into(),
            window.to.into(),
            SqlValue::Int(HIGH_RISK_SCORE_CEILING),
        ];
        let rows = self.executor.fetch_all(sql, &params).await?;

        let mut journey = VendorJourney::default();
        for row in &rows {
            let count = row.try_count("total")?;
            journey.by_status.insert(row.try_text("status")?, count);
            journey.total += count;
            journey.high_risk += row.try_count("high_risk")?;
        }
        Ok(journey)
    }

    async fn task_journey(
        &self,
        actor_email: &str,
        window: MetricWindow,
    ) -> Result<TaskJourney, QueryError> {
        let sql = "SELECT status, COUNT(*) AS total, \
               COUNT(*) FILTER (WHERE completed_at IS NOT NULL) AS completed, \
               COUNT(*) FILTER (WHERE priority IN ('high', 'critical') AND completed_at IS NULL) AS high_priority_open \
             FROM tasks \
             WHERE (lower(created_by_email) = $1 OR lower(assigned_to_email) = $1) \
               AND created_at >= $2 AND created_at < $3 \
             GROUP BY status";
        let params: Vec<SqlValue> = vec![
            actor_email.to_lowercase().into(),
            window.from.into(),
            window.to.into(),
        ];
        let rows = self.executor.fetch_all(sql, &params).await?;

        let mut journey = TaskJourney::default();
        for row in &rows {
            let count = row.try_count("total")?;
            journey.by_status.insert(row.try_text("status")?, count);
            journey.total += count;
            journey.completed += row.try_count("completed")?;
            journey.high_priority_open += row.try_count("high_priority_open")?;
        }
        Ok(journey)
    }

    async fn document_journey(
        &self,
        actor_email: &str,
        window: MetricWindow,
    ) -> Result<DocumentJourney, QueryError> {
        let sql = "SELECT status, COUNT(*) AS total FROM documents \
             WHERE lower(uploaded_by_email) = $1 \
               AND created_at >= $2 AND created_at < $3 \
             GROUP BY status";
        let params: Vec<SqlValue> = vec![
            actor_email.to_lowercase().into(),
            window.from.into(),
            window.to.into(),
        ];
        let rows = self.executor.fetch_all(sql, &params).await?;

        let mut by_status = BTreeMap::new();
        let mut total = 0;
        for row in &rows {
            let count = row.try_count("total")?;
            by_status.insert(row.try_text("status")?, count);
            total += count;
        }
        Ok(DocumentJourney { total, by_status })
    }

    async fn security_summary(
        &self,
        actor_email: &str,
        window: MetricWindow,
    ) -> Result<SecuritySummary, QueryError> {
        let sql = "SELECT COUNT(*) AS total, \
               COUNT(*) FILTER (WHERE event_type LIKE 'LOGIN_FAILED%') AS failed_logins, \
               COUNT(*) FILTER (WHERE event_type = 'ACCESS_DENIED') AS high_severity \
             FROM security_log \
             WHERE lower(user_email) = $1 AND created_at >= $2 AND created_at < $3";
        let params: Vec<SqlValue> = vec![
            actor_email.to_lowercase().into(),
            window.from.into(),
            window.to.into(),
        ];
        let row = self
            .executor
            .fetch_optional(sql, &params)
            .await?
            .unwrap_or_default();

        Ok(SecuritySummary {
            total_events: row.try_count("total")?,
            failed_logins: row.try_count("failed_logins")?,
            high_severity: row.try_count("high_severity")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helper::{row, user_row, FakeExecutor};
    use activity_core_db::models::journey::RiskLevel;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn window() -> MetricWindow {
        MetricWindow::new(
            Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 5, 8, 0, 0, 0).unwrap(),
        )
    }

    fn composer(executor: FakeExecutor) -> JourneyComposer {
        let executor: Arc<dyn QueryExecutor> = Arc::new(executor);
        JourneyComposer::new(
            executor.clone(),
            Arc::new(ActivityFederation::new(executor.clone())),
            OrgDirectory::new(executor),
        )
    }

    #[tokio::test]
    async fn unknown_actor_is_not_found() {
        let composer = composer(FakeExecutor::new());
        let result = composer.compose("ghost@example.com", window()).await;
        assert!(matches!(result, Err(ActivityError::NotFound(_))));
    }

    #[tokio::test]
    async fn quiet_actor_gets_zeroed_sub_journeys_and_full_score() {
        let at = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        let executor =
            FakeExecutor::new().on("FROM users WHERE lower(email)", vec![user_row("alice@example.com", "analyst", at)]);

        let journey = composer(executor)
            .compose("alice@example.com", window())
            .await
            .unwrap();

        assert_eq!(journey.profile.email, "alice@example.com");
        assert_eq!(journey.profile.name.as_deref(), Some("Alice Smith"));
        assert_eq!(journey.vendors.total, 0);
        assert_eq!(journey.tasks.total, 0);
        assert_eq!(journey.documents.total, 0);
        assert!(journey.sessions.is_empty());
        assert!(journey.activities.is_empty());
        assert_eq!(journey.risk.score, 100);
        assert_eq!(journey.risk.level, RiskLevel::Low);
    }

    #[tokio::test]
    async fn negative_signals_drag_the_risk_score_down() {
        let at = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        let executor = FakeExecutor::new()
            .on("FROM users WHERE lower(email)", vec![user_row("alice@example.com", "analyst", at)])
            .on(
                "FILTER (WHERE risk_score < $4)",
                vec![row(vec![
                    ("status", SqlValue::Text("active".into())),
                    ("total", SqlValue::Int(3)),
                    ("high_risk", SqlValue::Int(2)),
                ])],
            )
            .on(
                "AS high_severity",
                vec![row(vec![
                    ("total", SqlValue::Int(12)),
                    ("failed_logins", SqlValue::Int(5)),
                    ("high_severity", SqlValue::Int(1)),
                ])],
            );

        let journey = composer(executor)
            .compose("alice@example.com", window())
            .await
            .unwrap();

        assert_eq!(journey.vendors.high_risk, 2);
        assert_eq!(journey.security.failed_logins, 5);
        // 100 - 10*2 - 15*1 - 2*5 = 55
        assert_eq!(journey.risk.score, 55);
        assert_eq!(journey.risk.level, RiskLevel::High);
    }

    #[tokio::test]
    async fn sessions_are_reconstructed_from_login_pairs() {
        let at = Utc.with_ymd_and_hms(2025, 5, 2, 9, 0, 0).unwrap();
        let executor = FakeExecutor::new()
            .on("FROM users WHERE lower(email)", vec![user_row("alice@example.com", "analyst", at)])
            .on(
                "WHERE event_type = 'LOGIN_SUCCESS'",
                vec![
                    row(vec![
                        ("created_at", SqlValue::Timestamp(at + ChronoDuration::minutes(45))),
                        ("ip_address", SqlValue::Null),
                    ]),
                    row(vec![
                        ("created_at", SqlValue::Timestamp(at)),
                        ("ip_address", SqlValue::Text("10.0.0.8".into())),
                    ]),
                ],
            );

        let journey = composer(executor)
            .compose("alice@example.com", window())
            .await
            .unwrap();

        assert_eq!(journey.sessions.len(), 2);
        assert_eq!(journey.sessions[1].duration_minutes, 45);
        assert_eq!(journey.sessions[1].ip_address.as_deref(), Some("10.0.0.8"));
    }

    #[tokio::test]
    async fn failed_sub_read_degrades_instead_of_failing() {
        let at = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        let executor = FakeExecutor::new()
            .on("FROM users WHERE lower(email)", vec![user_row("alice@example.com", "analyst", at)])
            .failing_on("FROM documents", "permission denied");

        let journey = composer(executor)
            .compose("alice@example.com", window())
            .await
            .unwrap();
        assert_eq!(journey.documents.total, 0);
    }

    #[tokio::test]
    async fn security_summary_counts_successes_and_failures() {
        // the 3 LOGIN_SUCCESS + 2 LOGIN_FAILED_* scenario, aggregated the way
        // the database would
        let at = Utc.with_ymd_and_hms(2025, 5, 2, 9, 0, 0).unwrap();
        let executor = FakeExecutor::new()
            .on("FROM users WHERE lower(email)", vec![user_row("alice@example.com", "analyst", at)])
            .on(
                "AS high_severity",
                vec![row(vec![
                    ("total", SqlValue::Int(5)),
                    ("failed_logins", SqlValue::Int(2)),
                    ("high_severity", SqlValue::Int(0)),
                ])],
            );

        let journey = composer(executor)
            .compose("alice@example.com", window())
            .await
            .unwrap();
        assert_eq!(journey.security.total_events, 5);
        assert_eq!(journey.security.failed_logins, 2);
        assert_eq!(journey.risk.score, 100 - 2 * 2);
    }
}
