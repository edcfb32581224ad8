use activity_core_db::executor::{QueryError, QueryExecutor, SqlRow};
use activity_core_db::models::filters::VendorSearchFilters;
use activity_core_db::models::vendor::VendorRecord;
use activity_core_db::query::QueryBuilder;
use activity_core_db::repository::pagination::{Page, PageRequest};
use std::sync::Arc;

/// Vendor directory search: one COUNT and one page query sharing the same
/// built predicate, newest vendors first, soft-deleted rows excluded.
pub struct VendorSearch {
    executor: Arc<dyn QueryExecutor>,
}

const SELECT_COLUMNS: &str = "id, name, website, contact_email, status, risk_score, \
     risk_grade, organization_id, last_assessed_at, created_at, updated_at";

fn build_predicate(filters: &VendorSearchFilters) -> QueryBuilder {
    let mut builder = QueryBuilder::new();
    builder.push_is_null("deleted_at");
    if let Some(needle) = &filters.search {
        if !needle.is_empty() {
            builder.push_search(needle, &["name", "website", "contact_email"]);
        }
    }
    if let Some(status) = &filters.status {
        builder.push_eq("status", status.as_str());
    }
    if let Some(grade) = &filters.grade {
        builder.push_eq("risk_grade", grade.as_str());
    }
    if let Some(min) = filters.min_score {
        builder.push_min("risk_score", min);
    }
    if let Some(max) = filters.max_score {
        builder.push_max("risk_score", max);
    }
    builder.push_range("created_at", filters.from, filters.to);
    builder
}

fn record(row: &SqlRow) -> Result<VendorRecord, QueryError> {
    Ok(VendorRecord {
        id: row.try_uuid("id")?,
        name: row.try_text("name")?,
        website: row.try_opt_text("website")?,
        contact_email: row.try_opt_text("contact_email")?,
        status: row.try_text("status")?,
        risk_score: row.try_opt_numeric("risk_score")?,
        risk_grade: row.try_opt_text("risk_grade")?,
        organization_id: row.try_opt_uuid("organization_id")?,
        last_assessed_at: row.try_opt_timestamp("last_assessed_at")?,
        created_at: row.try_timestamp("created_at")?,
        updated_at: row.try_timestamp("updated_at")?,
    })
}

impl VendorSearch {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    pub async fn search(
        &self,
        filters: &VendorSearchFilters,
        page: PageRequest,
    ) -> Result<Page<VendorRecord>, QueryError> {
        let mut builder = build_predicate(filters);
        let where_clause = builder.where_clause();

        let count_sql = format!("SELECT COUNT(*) AS total FROM vendors{where_clause}");
        let total = self
            .executor
            .fetch_optional(&count_sql, builder.params())
            .await?
            .unwrap_or_default()
            .try_count("total")? as usize;

        let limit = builder.bind(page.limit as i64);
        let offset = builder.bind(page.offset as i64);
        let page_sql = format!(
            "SELECT {SELECT_COLUMNS} FROM vendors{where_clause} \
             ORDER BY created_at DESC LIMIT ${limit} OFFSET ${offset}"
        );
        let rows = self.executor.fetch_all(&page_sql, builder.params()).await?;
        let items = rows.iter().map(record).collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, total, page.limit, page.offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helper::{count_row, row, FakeExecutor};
    use activity_core_db::executor::SqlValue;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn vendor_result_row(name: &str) -> SqlRow {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        row(vec![
            ("id", SqlValue::Uuid(Uuid::new_v4())),
            ("name", SqlValue::Text(name.to_string())),
            ("website", SqlValue::Text("https://acme.example".into())),
            ("contact_email", SqlValue::Null),
            ("status", SqlValue::Text("active".into())),
            ("risk_score", SqlValue::Numeric(Decimal::from(55))),
            ("risk_grade", SqlValue::Text("C".into())),
            ("organization_id", SqlValue::Null),
            ("last_assessed_at", SqlValue::Null),
            ("created_at", SqlValue::Timestamp(at)),
            ("updated_at", SqlValue::Timestamp(at)),
        ])
    }

    #[test]
    fn predicate_composes_only_present_filters() {
        let filters = VendorSearchFilters {
            search: Some("acme".to_string()),
            status: Some("active".to_string()),
            min_score: Some(Decimal::from(10)),
            ..Default::default()
        };
        let builder = build_predicate(&filters);
        assert_eq!(
            builder.where_clause(),
            " WHERE deleted_at IS NULL \
             AND (name ILIKE $1 OR website ILIKE $1 OR contact_email ILIKE $1) \
             AND status = $2 AND risk_score >= $3"
        );
        assert_eq!(builder.params().len(), 3);
    }

    #[test]
    fn default_filters_only_exclude_soft_deleted_rows() {
        let builder = build_predicate(&VendorSearchFilters::default());
        assert_eq!(builder.where_clause(), " WHERE deleted_at IS NULL");
        assert!(builder.params().is_empty());
    }

    #[tokio::test]
    async fn search_returns_a_page_with_total() {
        let executor = FakeExecutor::new()
            .on("SELECT COUNT(*) AS total FROM vendors", vec![count_row(23)])
            .on(
                "ORDER BY created_at DESC LIMIT",
                vec![vendor_result_row("Acme Hosting"), vendor_result_row("Acme DNS")],
            );

        let search = VendorSearch::new(Arc::new(executor));
        let page = search
            .search(&VendorSearchFilters::default(), PageRequest::new(2, 0))
            .await
            .unwrap();

        assert_eq!(page.total, 23);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].name, "Acme Hosting");
        assert_eq!(page.total_pages(), 12);
    }
}
