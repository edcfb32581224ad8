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

const SELECT_COLUMNS: &str = "id, title, doc_type, status, uploaded_by_email, vendor_id, \
     organization_id, created_at, updated_at";

pub struct DocumentSource {
    executor: Arc<dyn QueryExecutor>,
}

impl DocumentSource {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

struct DocumentRow {
    id: Uuid,
    title: HeaplessString<250>,
    doc_type: HeaplessString<50>,
    status: HeaplessString<50>,
    uploaded_by_email: Option<HeaplessString<100>>,
    vendor_id: Option<Uuid>,
    organization_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFromRow for DocumentRow {
    fn try_from_row(row: &SqlRow) -> Result<Self, QueryError> {
        Ok(DocumentRow {
            id: row.try_uuid("id")?,
            title: get_heapless_string(row, "title")?,
            doc_type: get_heapless_string(row, "doc_type")?,
            status: get_heapless_string(row, "status")?,
            uploaded_by_email: get_optional_heapless_string(row, "uploaded_by_email")?,
            vendor_id: row.try_opt_uuid("vendor_id")?,
            organization_id: row.try_opt_uuid("organization_id")?,
            created_at: row.try_timestamp("created_at")?,
            updated_at: row.try_timestamp("updated_at")?,
        })
    }
}

fn project(row: &DocumentRow) -> Vec<Activity> {
    let actor = row.uploaded_by_email.as_ref().map(|e| e.as_str().to_string());
    let make = |id: String, action, timestamp, event: &str| {
        let mut metadata = Map::new();
        metadata.insert("event".to_string(), Value::from(event));
        metadata.insert("doc_type".to_string(), Value::from(row.doc_type.as_str()));
        metadata.insert("status".to_string(), Value::from(row.status.as_str()));
        if let Some(vendor_id) = row.vendor_id {
            metadata.insert("vendor_id".to_string(), Value::from(vendor_id.to_string()));
        }
        Activity {
            id,
            source: SourceKind::Documents,
            timestamp,
            actor_id: None,
            actor_email: actor.clone(),
            actor_name: None,
            organization_id: row.organization_id,
            action,
            entity_type: "document".to_string(),
            entity_id: row.id.to_string(),
            entity_name: Some(row.title.as_str().to_string()),
            metadata,
            organization_name: None,
        }
    };

    let mut activities = vec![make(
        identity::assign(SourceKind::Documents, ActivityAction::DocumentCreate, row.id),
        ActivityAction::DocumentCreate,
        row.created_at,
        "Document uploaded",
    )];
    if row.updated_at != row.created_at {
        activities.push(make(
            identity::assign_at(
                SourceKind::Documents,
                ActivityAction::DocumentUpdate,
                row.id,
                row.updated_at,
            ),
            ActivityAction::DocumentUpdate,
            row.updated_at,
            "Document updated",
        ));
    }
    activities
}

fn collect(rows: &[SqlRow]) -> Result<Vec<Activity>, QueryError> {
    let mut activities = Vec::new();
    for row in rows {
        let row = DocumentRow::try_from_row(row)?;
        activities.extend(project(&row));
    }
    Ok(activities)
}

#[async_trait]
impl ActivitySource for DocumentSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Documents
    }

    async fn fetch(&self, filters: &ActivityFilters) -> Result<Vec<Activity>, QueryError> {
        let mut builder = QueryBuilder::new();
        super::push_scope(&mut builder, filters, Some("uploaded_by_email"), "updated_at");
        let limit = builder.bind(FETCH_CAP);
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM documents{} ORDER BY updated_at DESC LIMIT ${limit}",
            builder.where_clause()
        );
        let rows = self.executor.fetch_all(&sql, builder.params()).await?;
        collect(&rows)
    }

    async fn count(&self, filters: &ActivityFilters) -> Result<u64, QueryError> {
        let mut builder = QueryBuilder::new();
        super::push_scope(&mut builder, filters, Some("uploaded_by_email"), "updated_at");
        let sql = format!(
            "SELECT COUNT(*) AS total FROM documents{}",
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
        let sql = format!("SELECT {SELECT_COLUMNS} FROM documents WHERE id = $1");
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
    fn revised_document_yields_create_and_update() {
        let created_at = Utc.with_ymd_and_hms(2025, 7, 1, 11, 0, 0).unwrap();
        let row = DocumentRow {
            id: Uuid::new_v4(),
            title: HeaplessString::from_str("Pen-test evidence.pdf").unwrap(),
            doc_type: HeaplessString::from_str("evidence").unwrap(),
            status: HeaplessString::from_str("under_review").unwrap(),
            uploaded_by_email: Some(HeaplessString::from_str("erin@example.com").unwrap()),
            vendor_id: Some(Uuid::new_v4()),
            organization_id: None,
            created_at,
            updated_at: created_at + chrono::Duration::days(1),
        };
        let activities = project(&row);
        let actions: Vec<_> = activities.iter().map(|a| a.action).collect();
        assert_eq!(
            actions,
            vec![ActivityAction::DocumentCreate, ActivityAction::DocumentUpdate]
        );
        assert_eq!(activities[0].metadata["doc_type"], "evidence");
        assert_eq!(activities[0].metadata["vendor_id"], row.vendor_id.unwrap().to_string());
    }
}
