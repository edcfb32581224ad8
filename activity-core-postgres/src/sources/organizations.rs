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

const SELECT_COLUMNS: &str = "id, name, industry, created_at, updated_at";

pub struct OrganizationSource {
    executor: Arc<dyn QueryExecutor>,
}

impl OrganizationSource {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

struct OrganizationRow {
    id: Uuid,
    name: HeaplessString<200>,
    industry: Option<HeaplessString<100>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFromRow for OrganizationRow {
    fn try_from_row(row: &SqlRow) -> Result<Self, QueryError> {
        Ok(OrganizationRow {
            id: row.try_uuid("id")?,
            name: get_heapless_string(row, "name")?,
            industry: get_optional_heapless_string(row, "industry")?,
            created_at: row.try_timestamp("created_at")?,
            updated_at: row.try_timestamp("updated_at")?,
        })
    }
}

/// Organization lifecycle events are system-initiated at this layer: no
/// actor attribution survives in the table.
fn project(row: &OrganizationRow) -> Vec<Activity> {
    let make = |id: String, action, timestamp, event: &str| {
        let mut metadata = Map::new();
        metadata.insert("event".to_string(), Value::from(event));
        if let Some(industry) = &row.industry {
            metadata.insert("industry".to_string(), Value::from(industry.as_str()));
        }
        Activity {
            id,
            source: SourceKind::Organizations,
            timestamp,
            actor_id: None,
            actor_email: None,
            actor_name: None,
            organization_id: Some(row.id),
            action,
            entity_type: "organization".to_string(),
            entity_id: row.id.to_string(),
            entity_name: Some(row.name.as_str().to_string()),
            metadata,
            organization_name: Some(row.name.as_str().to_string()),
        }
    };

    let mut activities = vec![make(
        identity::assign(SourceKind::Organizations, ActivityAction::OrganizationCreate, row.id),
        ActivityAction::OrganizationCreate,
        row.created_at,
        "Organization created",
    )];
    if row.updated_at != row.created_at {
        activities.push(make(
            identity::assign_at(
                SourceKind::Organizations,
                ActivityAction::OrganizationUpdate,
                row.id,
                row.updated_at,
            ),
            ActivityAction::OrganizationUpdate,
            row.updated_at,
            "Organization updated",
        ));
    }
    activities
}

fn collect(rows: &[SqlRow]) -> Result<Vec<Activity>, QueryError> {
    let mut activities = Vec::new();
    for row in rows {
        let row = OrganizationRow::try_from_row(row)?;
        activities.extend(project(&row));
    }
    Ok(activities)
}

fn push_org_scope(builder: &mut QueryBuilder, filters: &ActivityFilters) {
    // Tenant scoping matches the organization row itself here.
    if let Some(org) = filters.organization_id {
        builder.push_eq("id", org);
    }
    builder.push_range("created_at", filters.from, filters.to);
}

#[async_trait]
impl ActivitySource for OrganizationSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Organizations
    }

    async fn fetch(&self, filters: &ActivityFilters) -> Result<Vec<Activity>, QueryError> {
        // Organization events are actor-less; an actor filter can match nothing.
        if filters.actor_email.is_some() {
            return Ok(Vec::new());
        }
        let mut builder = QueryBuilder::new();
        push_org_scope(&mut builder, filters);
        let limit = builder.bind(FETCH_CAP);
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM organizations{} ORDER BY created_at DESC LIMIT ${limit}",
            builder.where_clause()
        );
        let rows = self.executor.fetch_all(&sql, builder.params()).await?;
        collect(&rows)
    }

    async fn count(&self, filters: &ActivityFilters) -> Result<u64, QueryError> {
        if filters.actor_email.is_some() {
            return Ok(0);
        }
        let mut builder = QueryBuilder::new();
        push_org_scope(&mut builder, filters);
        let sql = format!(
            "SELECT COUNT(*) AS total FROM organizations{}",
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
        let sql = format!("SELECT {SELECT_COLUMNS} FROM organizations WHERE id = $1");
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
    fn organization_events_carry_their_own_display_name() {
        let created_at = Utc.with_ymd_and_hms(2025, 1, 20, 0, 0, 0).unwrap();
        let row = OrganizationRow {
            id: Uuid::new_v4(),
            name: HeaplessString::from_str("Initech").unwrap(),
            industry: Some(HeaplessString::from_str("Software").unwrap()),
            created_at,
            updated_at: created_at + chrono::Duration::days(2),
        };
        let activities = project(&row);
        assert_eq!(activities.len(), 2);
        assert!(activities
            .iter()
            .all(|a| a.organization_name.as_deref() == Some("Initech")));
        assert!(activities.iter().all(|a| a.actor_email.is_none()));
    }
}
