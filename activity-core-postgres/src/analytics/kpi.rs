use activity_core_db::executor::{QueryError, QueryExecutor, SqlValue};
use activity_core_db::models::filters::MetricWindow;
use activity_core_db::models::kpi::{
    ratio_pct, AuditKpi, AuthenticationKpi, DashboardKpis, DocumentKpi, KpiResult, LoginMetrics,
    TaskKpi, TestExecutionKpi, VendorScanKpi,
};
use std::sync::Arc;
use uuid::Uuid;

/// Period-over-period KPI deltas, one aggregate round trip per metric
/// family, all families issued concurrently. Positional parameters are fixed
/// per family: `$1` = window start, `$2` = window end, `$3` = previous-window
/// start, `$4` = optional tenant.
pub struct KpiCalculator {
    executor: Arc<dyn QueryExecutor>,
}

fn scope(
    window: MetricWindow,
    organization_id: Option<Uuid>,
) -> (Vec<SqlValue>, &'static str) {
    let previous = window.previous();
    let mut params: Vec<SqlValue> = vec![
        window.from.into(),
        window.to.into(),
        previous.from.into(),
    ];
    let clause = match organization_id {
        Some(org) => {
            params.push(org.into());
            " WHERE organization_id = $4"
        }
        None => "",
    };
    (params, clause)
}

impl KpiCalculator {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    /// All six families over one window. A family whose query fails degrades
    /// to zeroed counts so one missing table cannot take down the dashboard.
    pub async fn dashboard(
        &self,
        window: MetricWindow,
        organization_id: Option<Uuid>,
    ) -> DashboardKpis {
        let (authentication, tasks, documents, vendor_scans, test_executions, audits) = tokio::join!(
            self.authentication(window, organization_id),
            self.tasks(window, organization_id),
            self.documents(window, organization_id),
            self.vendor_scans(window, organization_id),
            self.test_executions(window, organization_id),
            self.audits(window, organization_id),
        );

        DashboardKpis {
            authentication: Self::or_default("authentication", authentication),
            tasks: Self::or_default("tasks", tasks),
            documents: Self::or_default("documents", documents),
            vendor_scans: Self::or_default("vendor_scans", vendor_scans),
            test_executions: Self::or_default("test_executions", test_executions),
            audits: Self::or_default("audits", audits),
        }
    }

    fn or_default<T: Default>(family: &str, result: Result<T, QueryError>) -> T {
        match result {
            Ok(kpi) => kpi,
            Err(err) => {
                tracing::warn!(family, error = %err, "KPI family query failed; zeroing");
                T::default()
            }
        }
    }

    async fn authentication(
        &self,
        window: MetricWindow,
        organization_id: Option<Uuid>,
    ) -> Result<AuthenticationKpi, QueryError> {
        let (params, scope) = scope(window, organization_id);
        let sql = format!(
            "SELECT \
               COUNT(*) FILTER (WHERE event_type = 'LOGIN_SUCCESS' AND created_at >= $1 AND created_at < $2) AS current_success, \
               COUNT(*) FILTER (WHERE event_type LIKE 'LOGIN_FAILED%' AND created_at >= $1 AND created_at < $2) AS current_failed, \
               COUNT(*) FILTER (WHERE event_type = 'LOGIN_SUCCESS' AND created_at >= $3 AND created_at < $1) AS previous_success, \
               COUNT(*) FILTER (WHERE event_type LIKE 'LOGIN_FAILED%' AND created_at >= $3 AND created_at < $1) AS previous_failed \
             FROM security_log{scope}"
        );
        let row = self
            .executor
            .fetch_optional(&sql, &params)
            .await?
            .unwrap_or_default();

        let current_success = row.try_count("current_success")?;
        let current_failed = row.try_count("current_failed")?;
        let previous_success = row.try_count("previous_success")?;
        let previous_failed = row.try_count("previous_failed")?;
        let current_total = current_success + current_failed;
        Ok(AuthenticationKpi {
            logins: KpiResult::from_counts(current_total, previous_success + previous_failed),
            successful: current_success,
            failed: current_failed,
            success_rate_pct: ratio_pct(current_success, current_total),
        })
    }

    async fn tasks(
        &self,
        window: MetricWindow,
        organization_id: Option<Uuid>,
    ) -> Result<TaskKpi, QueryError> {
        let (params, scope) = scope(window, organization_id);
        let sql = format!(
            "SELECT \
               COUNT(*) FILTER (WHERE created_at >= $1 AND created_at < $2) AS current_created, \
               COUNT(*) FILTER (WHERE created_at >= $3 AND created_at < $1) AS previous_created, \
               COUNT(*) FILTER (WHERE completed_at IS NOT NULL AND completed_at >= $1 AND completed_at < $2) AS current_completed \
             FROM tasks{scope}"
        );
        let row = self
            .executor
            .fetch_optional(&sql, &params)
            .await?
            .unwrap_or_default();

        let created = row.try_count("current_created")?;
        let completed = row.try_count("current_completed")?;
        Ok(TaskKpi {
            created: KpiResult::from_counts(created, row.try_count("previous_created")?),
            completed,
            completion_rate_pct: ratio_pct(completed, created),
        })
    }

    async fn documents(
        &self,
        window: MetricWindow,
        organization_id: Option<Uuid>,
    ) -> Result<DocumentKpi, QueryError> {
        let (params, scope) = scope(window, organization_id);
        let sql = format!(
            "SELECT \
               COUNT(*) FILTER (WHERE created_at >= $1 AND created_at < $2) AS current_created, \
               COUNT(*) FILTER (WHERE created_at >= $3 AND created_at < $1) AS previous_created, \
               COUNT(*) FILTER (WHERE updated_at <> created_at AND updated_at >= $1 AND updated_at < $2) AS current_updated \
             FROM documents{scope}"
        );
        let row = self
            .executor
            .fetch_optional(&sql, &params)
            .await?
            .unwrap_or_default();

        Ok(DocumentKpi {
            created: KpiResult::from_counts(
                row.try_count("current_created")?,
                row.try_count("previous_created")?,
            ),
            updated: row.try_count("current_updated")?,
        })
    }

    async fn vendor_scans(
        &self,
        window: MetricWindow,
        organization_id: Option<Uuid>,
    ) -> Result<VendorScanKpi, QueryError> {
        let (params, scope) = scope(window, organization_id);
        let sql = format!(
            "SELECT \
               COUNT(*) FILTER (WHERE status = 'completed' AND completed_at >= $1 AND completed_at < $2) AS current_completed, \
               COUNT(*) FILTER (WHERE status = 'completed' AND completed_at >= $3 AND completed_at < $1) AS previous_completed, \
               AVG(score) FILTER (WHERE status = 'completed' AND completed_at >= $1 AND completed_at < $2) AS average_score \
             FROM vendor_assessments{scope}"
        );
        let row = self
            .executor
            .fetch_optional(&sql, &params)
            .await?
            .unwrap_or_default();

        Ok(VendorScanKpi {
            completed: KpiResult::from_counts(
                row.try_count("current_completed")?,
                row.try_count("previous_completed")?,
            ),
            average_score: row.try_opt_numeric("average_score")?,
        })
    }

    async fn test_executions(
        &self,
        window: MetricWindow,
        organization_id: Option<Uuid>,
    ) -> Result<TestExecutionKpi, QueryError> {
        let (params, scope) = scope(window, organization_id);
        let sql = format!(
            "SELECT \
               COUNT(*) FILTER (WHERE created_at >= $1 AND created_at < $2) AS current_runs, \
               COUNT(*) FILTER (WHERE created_at >= $3 AND created_at < $1) AS previous_runs, \
               COUNT(*) FILTER (WHERE status = 'passed' AND created_at >= $1 AND created_at < $2) AS current_passed, \
               COUNT(*) FILTER (WHERE status = 'failed' AND created_at >= $1 AND created_at < $2) AS current_failed \
             FROM test_runs{scope}"
        );
        let row = self
            .executor
            .fetch_optional(&sql, &params)
            .await?
            .unwrap_or_default();

        let passed = row.try_count("current_passed")?;
        let failed = row.try_count("current_failed")?;
        Ok(TestExecutionKpi {
            runs: KpiResult::from_counts(
                row.try_count("current_runs")?,
                row.try_count("previous_runs")?,
            ),
            passed,
            failed,
            pass_rate_pct: ratio_pct(passed, passed + failed),
        })
    }

    async fn audits(
        &self,
        window: MetricWindow,
        organization_id: Option<Uuid>,
    ) -> Result<AuditKpi, QueryError> {
        let (params, scope) = scope(window, organization_id);
        let sql = format!(
            "SELECT \
               COUNT(*) FILTER (WHERE created_at >= $1 AND created_at < $2) AS current_recorded, \
               COUNT(*) FILTER (WHERE created_at >= $3 AND created_at < $1) AS previous_recorded \
             FROM assessment_history{scope}"
        );
        let row = self
            .executor
            .fetch_optional(&sql, &params)
            .await?
            .unwrap_or_default();

        Ok(AuditKpi {
            recorded: KpiResult::from_counts(
                row.try_count("current_recorded")?,
                row.try_count("previous_recorded")?,
            ),
        })
    }

    /// Single-window login totals, optionally scoped to one actor.
    pub async fn login_metrics(
        &self,
        window: MetricWindow,
        actor_email: Option<&str>,
    ) -> Result<LoginMetrics, QueryError> {
        let mut params: Vec<SqlValue> = vec![window.from.into(), window.to.into()];
        let actor_clause = match actor_email {
            Some(email) => {
                params.push(email.to_lowercase().into());
                " AND lower(user_email) = $3"
            }
            None => "",
        };
        let sql = format!(
            "SELECT \
               COUNT(*) FILTER (WHERE event_type = 'LOGIN_SUCCESS') AS success, \
               COUNT(*) FILTER (WHERE event_type LIKE 'LOGIN_FAILED%') AS failed \
             FROM security_log WHERE created_at >= $1 AND created_at < $2{actor_clause}"
        );
        let row = self
            .executor
            .fetch_optional(&sql, &params)
            .await?
            .unwrap_or_default();

        let success = row.try_count("success")?;
        let failed = row.try_count("failed")?;
        Ok(LoginMetrics {
            total: success + failed,
            success,
            failed,
        })
    }
}
