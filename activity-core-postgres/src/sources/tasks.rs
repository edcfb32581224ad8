use activity_core_db::executor::{QueryError, QueryExecutor, SqlRow};
use activity_core_db::identity;
use activity_core_db::models::activity::{Activity, ActivityAction, SourceKind};
use activity_core_db::models::filters::ActivityFilters;
use activity_core_db::query::QueryBuilder;
use activity_core_db::repository::source::ActivitySource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heapless::String as HeaplessString;
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::utils::{get_heapless_string, get_optional_heapless_string, TryFromRow};

const FETCH_CAP: i64 = 100;

const SELECT_COLUMNS: &str = "id, title, status, priority, assigned_to_email, \
     created_by_email, vendor_id, organization_id, created_at, updated_at, completed_at";

pub struct TaskSource {
    executor: Arc<dyn QueryExecutor>,
}

impl TaskSource {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

struct TaskRow {
    id: Uuid,
    title: HeaplessString<250>,
    status: HeaplessString<50>,
    priority: HeaplessString<20>,
    assigned_to_email: Option<HeaplessString<100>>,
    created_by_email: Option<HeaplessString<100>>,
    vendor_id: Option<Uuid>,
    organization_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFromRow for TaskRow {
    fn try_from_row(row: &SqlRow) -> Result<Self, QueryError> {
        Ok(TaskRow {
            id: row.try_uuid("id")?,
            title: get_heapless_string(row, "title")?,
            status: get_heapless_string(row, "status")?,
            priority: get_heapless_string(row, "priority")?,
            assigned_to_email: get_optional_heapless_string(row, "assigned_to_email")?,
            created_by_email: get_optional_heapless_string(row, "created_by_email")?,
            vendor_id: row.try_opt_uuid("vendor_id")?,
            organization_id: row.try_opt_uuid("organization_id")?,
            created_at: row.try_timestamp("created_at")?,
            updated_at: row.try_timestamp("updated_at")?,
            completed_at: row.try_opt_timestamp("completed_at")?,
        })
    }
}

impl TaskRow {
    fn activity(
        &self,
        id: String,
        action: ActivityAction,
        timestamp: DateTime<Utc>,
        actor_email: Option<String>,
        event: &str,
    ) -> Activity {
        let mut metadata = Map::new();
        metadata.insert("event".to_string(), Value::from(event));
        metadata.insert("status".to_string(), Value::from(self.status.as_str()));
        metadata.insert("priority".to_string(), Value::from(self.priority.as_str()));
        if let Some(vendor_id) = self.vendor_id {
            metadata.insert("vendor_id".to_string(), Value::from(vendor_id.to_string()));
        }
        Activity {
            id,
            source: SourceKind::Tasks,
            timestamp,
            actor_id: None,
            actor_email,
            actor_name: None,
            organization_id: self.organization_id,
            action,
            entity_type: "task".to_string(),
            entity_id: self.id.to_string(),
            entity_name: Some(self.title.as_str().to_string()),
            metadata,
            organization_name: None,
        }
    }
}

/// Creation always; a plain update only while the task is still open (a
/// completion bumps `updated_at` too and would double-report); completion
/// when the completion timestamp is set.
fn project(row: &TaskRow) -> Vec<Activity> {
    let mut activities = vec![row.activity(
        identity::assign(SourceKind::Tasks, ActivityAction::TaskCreate, row.id),
        ActivityAction::TaskCreate,
        row.created_at,
        row.created_by_email.as_ref().map(|e| e.as_str().to_string()),
        "Task created",
    )];

    if row.updated_at != row.created_at && row.completed_at.is_none() {
        activities.push(row.activity(
            identity::assign_at(SourceKind::Tasks, ActivityAction::TaskUpdate, row.id, row.updated_at),
            ActivityAction::TaskUpdate,
            row.updated_at,
            None,
            "Task updated",
        ));
    }

    if let Some(completed_at) = row.completed_at {
        activities.push(row.activity(
            identity::assign(SourceKind::Tasks, ActivityAction::TaskComplete, row.id),
            ActivityAction::TaskComplete,
            completed_at,
            row.assigned_to_email.as_ref().map(|e| e.as_str().to_string()),
            "Task completed",
        ));
    }

    activities
}

fn collect(rows: &[SqlRow]) -> Result<Vec<Activity>, QueryError> {
    let mut activities = Vec::new();
    for row in rows {
        let row = TaskRow::try_from_row(row)?;
        activities.extend(project(&row));
    }
    Ok(activities)
}

fn push_task_scope(builder: &mut QueryBuilder, filters: &ActivityFilters) {
    if let Some(org) = filters.organization_id {
        builder.push_eq("organization_id", org);
    }
    if let Some(actor) = &filters.actor_email {
        let position = builder.bind(actor.to_lowercase());
        builder.push_fragment(format!(
            "(lower(created_by_email) = ${position} OR lower(assigned_to_email) = ${position})"
        ));
    }
    builder.push_range("updated_at", filters.from, filters.to);
}

#[async_trait]
impl ActivitySource for TaskSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Tasks
    }

    async fn fetch(&self, filters: &ActivityFilters) -> Result<Vec<Activity>, QueryError> {
        let mut builder = QueryBuilder::new();
        push_task_scope(&mut builder, filters);
        let limit = builder.bind(FETCH_CAP);
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM tasks{} ORDER BY updated_at DESC LIMIT ${limit}",
            builder.where_clause()
        );
        let rows = self.executor.fetch_all(&sql, builder.params()).await?;
        collect(&rows)
    }

    async fn count(&self, filters: &ActivityFilters) -> Result<u64, QueryError> {
        let mut builder = QueryBuilder::new();
        push_task_scope(&mut builder, filters);
        let sql = format!("SELECT COUNT(*) AS total FROM tasks{}", builder.where_clause());
        let row = self
            .executor
            .fetch_optional(&sql, builder.params())
            .await?
            .unwrap_or_default();
        Ok(row.try_count("total")? as u64)
    }

    async fn fetch_by_origin(&self, origin: Uuid) -> Result<Vec<Activity>, QueryError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM tasks WHERE id = $1");
        let rows = self.executor.fetch_all(&sql, &[origin.into()]).await?;
        collect(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn task_row() -> TaskRow {
        let created_at = Utc.with_ymd_and_hms(2025, 5, 20, 14, 0, 0).unwrap();
        TaskRow {
            id: Uuid::new_v4(),
            title: HeaplessString::from_str("Review SOC 2 report").unwrap(),
            status: HeaplessString::from_str("open").unwrap(),
            priority: HeaplessString::from_str("high").unwrap(),
            assigned_to_email: Some(HeaplessString::from_str("bob@example.com").unwrap()),
            created_by_email: Some(HeaplessString::from_str("alice@example.com").unwrap()),
            vendor_id: None,
            organization_id: None,
            created_at,
            updated_at: created_at,
            completed_at: None,
        }
    }

    #[test]
    fn open_task_yields_create_only() {
        let activities = project(&task_row());
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].action, ActivityAction::TaskCreate);
        assert_eq!(activities[0].metadata["priority"], "high");
    }

    #[test]
    fn completion_suppresses_the_update_event() {
        let mut row = task_row();
        row.updated_at = row.created_at + chrono::Duration::hours(6);
        row.completed_at = Some(row.updated_at);
        let activities = project(&row);
        let actions: Vec<_> = activities.iter().map(|a| a.action).collect();
        assert_eq!(actions, vec![ActivityAction::TaskCreate, ActivityAction::TaskComplete]);
        assert_eq!(activities[1].actor_email.as_deref(), Some("bob@example.com"));
    }

    #[test]
    fn edited_open_task_yields_an_update() {
        let mut row = task_row();
        row.updated_at = row.created_at + chrono::Duration::hours(1);
        let activities = project(&row);
        assert_eq!(activities[1].action, ActivityAction::TaskUpdate);
    }
}
