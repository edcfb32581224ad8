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

const SELECT_COLUMNS: &str = "id, vendor_id, vendor_name, score, grade, status, \
     requested_by_email, organization_id, created_at, completed_at";

/// Risk-assessment snapshots. Scans are mostly automated, so the actor is
/// frequently absent.
pub struct AssessmentSource {
    executor: Arc<dyn QueryExecutor>,
}

impl AssessmentSource {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

struct AssessmentRow {
    id: Uuid,
    vendor_id: Uuid,
    vendor_name: HeaplessString<200>,
    score: Option<Decimal>,
    grade: Option<HeaplessString<5>>,
    status: HeaplessString<50>,
    requested_by_email: Option<HeaplessString<100>>,
    organization_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFromRow for AssessmentRow {
    fn try_from_row(row: &SqlRow) -> Result<Self, QueryError> {
        Ok(AssessmentRow {
            id: row.try_uuid("id")?,
            vendor_id: row.try_uuid("vendor_id")?,
            vendor_name: get_heapless_string(row, "vendor_name")?,
            score: row.try_opt_numeric("score")?,
            grade: get_optional_heapless_string(row, "grade")?,
            status: get_heapless_string(row, "status")?,
            requested_by_email: get_optional_heapless_string(row, "requested_by_email")?,
            organization_id: row.try_opt_uuid("organization_id")?,
            created_at: row.try_timestamp("created_at")?,
            completed_at: row.try_opt_timestamp("completed_at")?,
        })
    }
}

fn project(row: &AssessmentRow) -> Vec<Activity> {
    let finished_at = row.completed_at.unwrap_or(row.created_at);
    let make = |id: String, action, event: &str| {
        let mut metadata = Map::new();
        metadata.insert("event".to_string(), Value::from(event));
        metadata.insert("status".to_string(), Value::from(row.status.as_str()));
        if let Some(score) = row.score {
            metadata.insert("score".to_string(), Value::from(score.to_string()));
        }
        if let Some(grade) = &row.grade {
            metadata.insert("grade".to_string(), Value::from(grade.as_str()));
        }
        Activity {
            id,
            source: SourceKind::Assessments,
            timestamp: finished_at,
            actor_id: None,
            actor_email: row.requested_by_email.as_ref().map(|e| e.as_str().to_string()),
            actor_name: None,
            organization_id: row.organization_id,
            action,
            entity_type: "vendor".to_string(),
            entity_id: row.vendor_id.to_string(),
            entity_name: Some(row.vendor_name.as_str().to_string()),
            metadata,
            organization_name: None,
        }
    };

    let mut activities = Vec::new();
    if row.status.as_str() == "completed" {
        activities.push(make(
            identity::assign(SourceKind::Assessments, ActivityAction::ScanCompleted, row.id),
            ActivityAction::ScanCompleted,
            "Security scan completed",
        ));
    }
    if row.score.is_some() {
        activities.push(make(
            identity::assign(SourceKind::Assessments, ActivityAction::ScanResult, row.id),
            ActivityAction::ScanResult,
            "Security scan scored",
        ));
    }
    activities
}

fn collect(rows: &[SqlRow]) -> Result<Vec<Activity>, QueryError> {
    let mut activities = Vec::new();
    for row in rows {
        let row = AssessmentRow::try_from_row(row)?;
        activities.extend(project(&row));
    }
    Ok(activities)
}

#[async_trait]
impl ActivitySource for AssessmentSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Assessments
    }

    async fn fetch(&self, filters: &ActivityFilters) -> Result<Vec<Activity>, QueryError> {
        let mut builder = QueryBuilder::new();
        super::push_scope(&mut builder, filters, Some("requested_by_email"), "created_at");
        let limit = builder.bind(FETCH_CAP);
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM vendor_assessments{} ORDER BY created_at DESC LIMIT ${limit}",
            builder.where_clause()
        );
        let rows = self.executor.fetch_all(&sql, builder.params()).await?;
        collect(&rows)
    }

    async fn count(&self, filters: &ActivityFilters) -> Result<u64, QueryError> {
        let mut builder = QueryBuilder::new();
        super::push_scope(&mut builder, filters, Some("requested_by_email"), "created_at");
        let sql = format!(
            "SELECT COUNT(*) AS total FROM vendor_assessments{}",
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
        let sql = format!("SELECT {SELECT_COLUMNS} FROM vendor_assessments WHERE id = $1");
        let rows = self.executor.fetch_all(&sql, &[origin.into()]).await?;
        collect(&rows)
    }
}
