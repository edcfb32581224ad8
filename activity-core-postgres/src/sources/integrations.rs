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
    "id, provider, status, connected_by_email, organization_id, created_at, last_synced_at";

pub struct IntegrationSource {
    executor: Arc<dyn QueryExecutor>,
}

impl IntegrationSource {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

struct IntegrationRow {
    id: Uuid,
    provider: HeaplessString<100>,
    status: HeaplessString<50>,
    connected_by_email: Option<HeaplessString<100>>,
    organization_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    last_synced_at: Option<DateTime<Utc>>,
}

impl TryFromRow for IntegrationRow {
    fn try_from_row(row: &SqlRow) -> Result<Self, QueryError> {
        Ok(IntegrationRow {
            id: row.try_uuid("id")?,
            provider: get_heapless_string(row, "provider")?,
            status: get_heapless_string(row, "status")?,
            connected_by_email: get_optional_heapless_string(row, "connected_by_email")?,
            organization_id: row.try_opt_uuid("organization_id")?,
            created_at: row.try_timestamp("created_at")?,
            last_synced_at: row.try_opt_timestamp("last_synced_at")?,
        })
    }
}

/// Only the most recent sync is reconstructible; its timestamp moves as the
/// connection keeps syncing, while the event id stays pinned to the row.
fn project(row: &IntegrationRow) -> Vec<Activity> {
    let make = |id: String, action, timestamp, actor: Option<String>, event: &str| {
        let mut metadata = Map::new();
        metadata.insert("event".to_string(), Value::from(event));
        metadata.insert("provider".to_string(), Value::from(row.provider.as_str()));
        metadata.insert("status".to_string(), Value::from(row.status.as_str()));
        Activity {
            id,
            source: SourceKind::Integrations,
            timestamp,
            actor_id: None,
            actor_email: actor,
            actor_name: None,
            organization_id: row.organization_id,
            action,
            entity_type: "integration".to_string(),
            entity_id: row.id.to_string(),
            entity_name: Some(row.provider.as_str().to_string()),
            metadata,
            organization_name: None,
        }
    };

    let mut activities = vec![make(
        identity::assign(SourceKind::Integrations, ActivityAction::IntegrationConnect, row.id),
        ActivityAction::IntegrationConnect,
        row.created_at,
        row.connected_by_email.as_ref().map(|e| e.as_str().to_string()),
        "Integration connected",
    )];
    if let Some(synced_at) = row.last_synced_at {
        activities.push(make(
            identity::assign(SourceKind::Integrations, ActivityAction::IntegrationSync, row.id),
            ActivityAction::IntegrationSync,
            synced_at,
            None,
            "Integration synchronized",
        ));
    }
    activities
}

fn collect(rows: &[SqlRow]) -> Result<Vec<Activity>, QueryError> {
    let mut activities = Vec::new();
    for row in rows {
        let row = IntegrationRow::try_from_row(row)?;
        activities.extend(project(&row));
    }
    Ok(activities)
}

#[async_trait]
impl ActivitySource for IntegrationSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Integrations
    }

    async fn fetch(&self, filters: &ActivityFilters) -> Result<Vec<Activity>, QueryError> {
        let mut builder = QueryBuilder::new();
        super::push_scope(&mut builder, filters, Some("connected_by_email"), "created_at");
        let limit = builder.bind(FETCH_CAP);
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM integrations{} ORDER BY created_at DESC LIMIT ${limit}",
            builder.where_clause()
        );
        let rows = self.executor.fetch_all(&sql, builder.params()).await?;
        collect(&rows)
    }

    async fn count(&self, filters: &ActivityFilters) -> Result<u64, QueryError> {
        let mut builder = QueryBuilder::new();
        super::push_scope(&mut builder, filters, Some("connected_by_email"), "created_at");
        let sql = format!(
            "SELECT COUNT(*) AS total FROM integrations{}",
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
        let sql = format!("SELECT {SELECT_COLUMNS} FROM integrations WHERE id = $1");
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
    fn synced_connection_yields_connect_and_sync() {
        let created_at = Utc.with_ymd_and_hms(2025, 1, 5, 10, 0, 0).unwrap();
        let row = IntegrationRow {
            id: Uuid::new_v4(),
            provider: HeaplessString::from_str("okta").unwrap(),
            status: HeaplessString::from_str("connected").unwrap(),
            connected_by_email: Some(HeaplessString::from_str("frank@example.com").unwrap()),
            organization_id: None,
            created_at,
            last_synced_at: Some(created_at + chrono::Duration::days(3)),
        };
        let activities = project(&row);
        let actions: Vec<_> = activities.iter().map(|a| a.action).collect();
        assert_eq!(
            actions,
            vec![
                ActivityAction::IntegrationConnect,
                ActivityAction::IntegrationSync,
            ]
        );
        assert_eq!(activities[1].actor_email, None, "syncs are system-initiated");
    }
}
