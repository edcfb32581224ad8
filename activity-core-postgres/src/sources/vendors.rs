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

const SELECT_COLUMNS: &str = "id, name, status, risk_score, risk_grade, assigned_to_email, \
     created_by_email, organization_id, created_at, updated_at, deleted_at";

pub struct VendorSource {
    executor: Arc<dyn QueryExecutor>,
}

impl VendorSource {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

struct VendorRow {
    id: Uuid,
    name: HeaplessString<200>,
    status: HeaplessString<50>,
    risk_score: Option<Decimal>,
    risk_grade: Option<HeaplessString<5>>,
    assigned_to_email: Option<HeaplessString<100>>,
    created_by_email: Option<HeaplessString<100>>,
    organization_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFromRow for VendorRow {
    fn try_from_row(row: &SqlRow) -> Result<Self, QueryError> {
        Ok(VendorRow {
            id: row.try_uuid("id")?,
            name: get_heapless_string(row, "name")?,
            status: get_heapless_string(row, "status")?,
            risk_score: row.try_opt_numeric("risk_score")?,
            risk_grade: get_optional_heapless_string(row, "risk_grade")?,
            assigned_to_email: get_optional_heapless_string(row, "assigned_to_email")?,
            created_by_email: get_optional_heapless_string(row, "created_by_email")?,
            organization_id: row.try_opt_uuid("organization_id")?,
            created_at: row.try_timestamp("created_at")?,
            updated_at: row.try_timestamp("updated_at")?,
            deleted_at: row.try_opt_timestamp("deleted_at")?,
        })
    }
}

impl VendorRow {
    fn base_metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("status".to_string(), Value::from(self.status.as_str()));
        if let Some(score) = self.risk_score {
            metadata.insert("risk_score".to_string(), Value::from(score.to_string()));
        }
        if let Some(grade) = &self.risk_grade {
            metadata.insert("risk_grade".to_string(), Value::from(grade.as_str()));
        }
        metadata
    }

    fn activity(
        &self,
        id: String,
        action: ActivityAction,
        timestamp: DateTime<Utc>,
        actor_email: Option<String>,
        event: &str,
    ) -> Activity {
        let mut metadata = self.base_metadata();
        metadata.insert("event".to_string(), Value::from(event));
        Activity {
            id,
            source: SourceKind::Vendors,
            timestamp,
            actor_id: None,
            actor_email,
            actor_name: None,
            organization_id: self.organization_id,
            action,
            entity_type: "vendor".to_string(),
            entity_id: self.id.to_string(),
            entity_name: Some(self.name.as_str().to_string()),
            metadata,
            organization_name: None,
        }
    }
}

/// A vendor row fans out into up to four reconstructed events: its creation,
/// a (latest-known) update, its current assignment, and a soft deletion.
/// Update and assignment are re-derived from current-state columns, the
/// accepted approximation for a table that stores no history.
fn project(row: &VendorRow) -> Vec<Activity> {
    let mut activities = Vec::new();

    activities.push(row.activity(
        identity::assign(SourceKind::Vendors, ActivityAction::VendorCreate, row.id),
        ActivityAction::VendorCreate,
        row.created_at,
        row.created_by_email.as_ref().map(|e| e.as_str().to_string()),
        "Vendor record created",
    ));

    if row.updated_at != row.created_at {
        // A vendor can be updated many times; the update timestamp keeps the
        // synthetic id unique per observed revision.
        activities.push(row.activity(
            identity::assign_at(
                SourceKind::Vendors,
                ActivityAction::VendorUpdate,
                row.id,
                row.updated_at,
            ),
            ActivityAction::VendorUpdate,
            row.updated_at,
            None,
            "Vendor record updated",
        ));
    }

    if let Some(assignee) = &row.assigned_to_email {
        let mut activity = row.activity(
            identity::assign(SourceKind::Vendors, ActivityAction::VendorAssign, row.id),
            ActivityAction::VendorAssign,
            row.updated_at,
            None,
            "Vendor assigned for review",
        );
        activity
            .metadata
            .insert("assigned_to".to_string(), Value::from(assignee.as_str()));
        activities.push(activity);
    }

    if let Some(deleted_at) = row.deleted_at {
        activities.push(row.activity(
            identity::assign(SourceKind::Vendors, ActivityAction::VendorDelete, row.id),
            ActivityAction::VendorDelete,
            deleted_at,
            None,
            "Vendor record deleted",
        ));
    }

    activities
}

fn collect(rows: &[SqlRow]) -> Result<Vec<Activity>, QueryError> {
    let mut activities = Vec::new();
    for row in rows {
        let row = VendorRow::try_from_row(row)?;
        activities.extend(project(&row));
    }
    Ok(activities)
}

fn push_vendor_scope(builder: &mut QueryBuilder, filters: &ActivityFilters) {
    if let Some(org) = filters.organization_id {
        builder.push_eq("organization_id", org);
    }
    if let Some(actor) = &filters.actor_email {
        let position = builder.bind(actor.to_lowercase());
        builder.push_fragment(format!(
            "(lower(created_by_email) = ${position} OR lower(assigned_to_email) = ${position})"
        ));
    }
    // The row's newest reconstructed event sits at updated_at.
    builder.push_range("updated_at", filters.from, filters.to);
}

#[async_trait]
impl ActivitySource for VendorSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Vendors
    }

    async fn fetch(&self, filters: &ActivityFilters) -> Result<Vec<Activity>, QueryError> {
        let mut builder = QueryBuilder::new();
        push_vendor_scope(&mut builder, filters);
        let limit = builder.bind(FETCH_CAP);
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM vendors{} ORDER BY updated_at DESC LIMIT ${limit}",
            builder.where_clause()
        );
        let rows = self.executor.fetch_all(&sql, builder.params()).await?;
        collect(&rows)
    }

    async fn count(&self, filters: &ActivityFilters) -> Result<u64, QueryError> {
        let mut builder = QueryBuilder::new();
        push_vendor_scope(&mut builder, filters);
        let sql = format!(
            "SELECT COUNT(*) AS total FROM vendors{}",
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
        let sql = format!("SELECT {SELECT_COLUMNS} FROM vendors WHERE id = $1");
        let rows = self.executor.fetch_all(&sql, &[origin.into()]).await?;
        collect(&rows)
    }
}
