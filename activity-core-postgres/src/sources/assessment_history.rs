use activity_core_db::executor::{QueryError, QueryExecutor, SqlRow};
use activity_core_db::identity;
use activity_core_db::models::activity::{Activity, ActivityAction, SourceKind};
use activity_core_db::models::filters::ActivityFilters;
use activity_core_db::query::QueryBuilder;
use activity_core_db::repository::source::ActivitySource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heapless::String as HeaplessString;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::utils::{get_heapless_string, get_optional_heapless_string, TryFromRow};

const FETCH_CAP: i64 = 100;

const SELECT_COLUMNS: &str = "id, assessment_id, vendor_id, vendor_name, score, grade, \
     recorded_by_email, organization_id, created_at";

/// Point-in-time assessment snapshots, the closest thing the platform has
/// to a real audit trail, so each row maps one-to-one onto an activity.
pub struct AssessmentHistorySource {
    executor: Arc<dyn QueryExecutor>,
}

impl AssessmentHistorySource {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

struct HistoryRow {
    id: Uuid,
    assessment_id: Uuid,
    vendor_id: Uuid,
    vendor_name: HeaplessString<200>,
    score: Option<Decimal>,
    grade: Option<HeaplessString<5>>,
    recorded_by_email: Option<HeaplessString<100>>,
    organization_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFromRow for HistoryRow {
    fn try_from_row(row: &SqlRow) -> Result<Self, QueryError> {
        Ok(HistoryRow {
            id: row.try_uuid("id")?,
            assessment_id: row.try_uuid("assessment_id")?,
            vendor_id: row.try_uuid("vendor_id")?,
            vendor_name: get_heapless_string(row, "vendor_name")?,
            score: row.try_opt_numeric("score")?,
            grade: get_optional_heapless_string(row, "grade")?,
            recorded_by_email: get_optional_heapless_string(row, "recorded_by_email")?,
            organization_id: row.try_opt_uuid("organization_id")?,
            created_at: row.try_timestamp("created_at")?,
        })
    }
}

fn project(row: &HistoryRow) -> Activity {
    let mut metadata = Map::new();
    metadata.insert("event".to_string(), Value::from("Assessment snapshot recorded"));
    metadata.insert(
        "assessment_id".to_string(),
        Value::from(row.assessment_id.to_string()),
    );
    if let Some(score) = row.score {
        metadata.insert("score".to_string(), Value::from(score.to_string()));
    }
    if let Some(grade) = &row.grade {
        metadata.insert("grade".to_string(), Value::from(grade.as_str()));
    }
    Activity {
        id: identity::assign(SourceKind::History, ActivityAction::AuditRecorded, row.id),
        source: SourceKind::History,
        timestamp: row.created_at,
        actor_id: None,
        actor_email: row.recorded_by_email.as_ref().map(|e| e.as_str().to_string()),
        actor_name: None,
        organization_id: row.organization_id,
        action: ActivityAction::AuditRecorded,
        entity_type: "vendor".to_string(),
        entity_id: row.vendor_id.to_string(),
        entity_name: Some(row.vendor_name.as_str().to_string()),
        metadata,
        organization_name: None,
    }
}

fn collect(rows: &[SqlRow]) -> Result<Vec<Activity>, QueryError> {
    rows.iter()
        .map(|row| HistoryRow::try_from_row(row).map(|row| project(&row)))
        .collect()
}

#[async_trait]
impl ActivitySource for AssessmentHistorySource {
    fn kind(&self) -> SourceKind {
        SourceKind::History
    }

    async fn fetch(&self, filters: &ActivityFilters) -> Result<Vec<Activity>, QueryError> {
        let mut builder = QueryBuilder::new();
        super::push_scope(&mut builder, filters, Some("recorded_by_email"), "created_at");
        let limit = builder.bind(FETCH_CAP);
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM assessment_history{} ORDER BY created_at DESC LIMIT ${limit}",
            builder.where_clause()
        );
        let rows = self.executor.fetch_all(&sql, builder.params()).await?;
        collect(&rows)
    }

    async fn count(&self, filters: &ActivityFilters) -> Result<u64, QueryError> {
        let mut builder = QueryBuilder::new();
        super::push_scope(&mut builder, filters, Some("recorded_by_email"), "created_at");
        let sql = format!(
            "SELECT COUNT(*) AS total FROM assessment_history{}",
            builder.where_clause()
        );
        let row = self
            .executor
            .fetch_optional(&sql, builder.params())
            .await?
            .unwrap_or_default();
        Ok(row.try_count("total")? as u64)
    }

    async fn fetch_by_origin(&self, origin: Uuid) -> Result<Vec<Activity>, QueryError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM assessment_history WHERE id = $1");
        let rows = self.executor.fetch_all(&sql, &[origin.into()]).await?;
        collect(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    #[test]
    fn snapshot_projects_one_audit_event() {
        let row = HistoryRow {
            id: Uuid::new_v4(),
            assessment_id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            vendor_name: HeaplessString::from_str("Acme Hosting").unwrap(),
            score: Some(Decimal::from(64)),
            grade: None,
            recorded_by_email: Some(HeaplessString::from_str("dora@example.com").unwrap()),
            organization_id: None,
            created_at: Utc.with_ymd_and_hms(2025, 3, 9, 16, 45, 0).unwrap(),
        };
        let activity = project(&row);
        assert_eq!(activity.action, ActivityAction::AuditRecorded);
        assert!(activity.id.starts_with("history-recorded-"));
        assert_eq!(activity.metadata["assessment_id"], row.assessment_id.to_string());
    }
}
