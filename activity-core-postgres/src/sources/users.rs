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

const FETCH_CAP: i64 = 50;

const SELECT_COLUMNS: &str =
    "id, email, first_name, last_name, role, organization_id, created_at, updated_at";

pub struct UserAccountSource {
    executor: Arc<dyn QueryExecutor>,
}

impl UserAccountSource {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

struct UserRow {
    id: Uuid,
    email: HeaplessString<100>,
    first_name: Option<HeaplessString<100>>,
    last_name: Option<HeaplessString<100>>,
    role: HeaplessString<50>,
    organization_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFromRow for UserRow {
    fn try_from_row(row: &SqlRow) -> Result<Self, QueryError> {
        Ok(UserRow {
            id: row.try_uuid("id")?,
            email: get_heapless_string(row, "email")?,
            first_name: get_optional_heapless_string(row, "first_name")?,
            last_name: get_optional_heapless_string(row, "last_name")?,
            role: get_heapless_string(row, "role")?,
            organization_id: row.try_opt_uuid("organization_id")?,
            created_at: row.try_timestamp("created_at")?,
            updated_at: row.try_timestamp("updated_at")?,
        })
    }
}

fn display_name(row: &UserRow) -> Option<String> {
    match (&row.first_name, &row.last_name) {
        (Some(first), Some(last)) => Some(format!("{first} {last}")),
        (Some(first), None) => Some(first.as_str().to_string()),
        (None, Some(last)) => Some(last.as_str().to_string()),
        (None, None) => None,
    }
}

fn project(row: &UserRow) -> Vec<Activity> {
    let name = display_name(row);
    let make = |id: String, action, timestamp, event: &str| {
        let mut metadata = Map::new();
        metadata.insert("event".to_string(), Value::from(event));
        metadata.insert("role".to_string(), Value::from(row.role.as_str()));
        Activity {
            id,
            source: SourceKind::Users,
            timestamp,
            actor_id: Some(row.id),
            actor_email: Some(row.email.as_str().to_string()),
            actor_name: name.clone(),
            organization_id: row.organization_id,
            action,
            entity_type: "user".to_string(),
            entity_id: row.id.to_string(),
            entity_name: Some(row.email.as_str().to_string()),
            metadata,
            organization_name: None,
        }
    };

    let mut activities = vec![make(
        identity::assign(SourceKind::Users, ActivityAction::UserCreate, row.id),
        ActivityAction::UserCreate,
        row.created_at,
        "User account created",
    )];
    if row.updated_at != row.created_at {
        activities.push(make(
            identity::assign_at(
                SourceKind::Users,
                ActivityAction::UserUpdate,
                row.id,
                row.updated_at,
            ),
            ActivityAction::UserUpdate,
            row.updated_at,
            "User account updated",
        ));
    }
    activities
}

fn collect(rows: &[SqlRow]) -> Result<Vec<Activity>, QueryError> {
    let mut activities = Vec::new();
    for row in rows {
        let row = UserRow::try_from_row(row)?;
        activities.extend(project(&row));
    }
    Ok(activities)
}

#[async_trait]
impl ActivitySource for UserAccountSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Users
    }

    async fn fetch(&self, filters: &ActivityFilters) -> Result<Vec<Activity>, QueryError> {
        let mut builder = QueryBuilder::new();
        super::push_scope(&mut builder, filters, Some("email"), "created_at");
        let limit = builder.bind(FETCH_CAP);
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM users{} ORDER BY created_at DESC LIMIT ${limit}",
            builder.where_clause()
        );
        let rows = self.executor.fetch_all(&sql, builder.params()).await?;
        collect(&rows)
    }

    async fn count(&self, filters: &ActivityFilters) -> Result<u64, QueryError> {
        let mut builder = QueryBuilder::new();
        super::push_scope(&mut builder, filters, Some("email"), "created_at");
        let sql = format!("SELECT COUNT(*) AS total FROM users{}", builder.where_clause());
        let row = self
            .executor
            .fetch_optional(&sql, builder.params())
            .await?
            .unwrap_or_default();
        Ok(row.try_count("total")? as u64)
    }

    async fn fetch_by_origin(&self, origin: Uuid) -> Result<Vec<Activity>, QueryError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM users WHERE id = $1");
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
    fn fresh_account_projects_a_single_create() {
        let created_at = Utc.with_ymd_and_hms(2025, 2, 14, 9, 0, 0).unwrap();
        let row = UserRow {
            id: Uuid::new_v4(),
            email: HeaplessString::from_str("carol@example.com").unwrap(),
            first_name: Some(HeaplessString::from_str("Carol").unwrap()),
            last_name: None,
            role: HeaplessString::from_str("analyst").unwrap(),
            organization_id: None,
            created_at,
            updated_at: created_at,
        };
        let activities = project(&row);
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].action, ActivityAction::UserCreate);
        assert_eq!(activities[0].actor_name.as_deref(), Some("Carol"));
        assert_eq!(activities[0].metadata["role"], "analyst");
    }
}
