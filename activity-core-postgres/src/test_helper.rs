//! Test support: a scriptable [`QueryExecutor`] fake and canned source rows.
//!
//! Every query-issuing component takes the executor as an injected trait
//! object, so tests pair a component with a `FakeExecutor` scripted per table
//! and never touch a live database.

use activity_core_db::executor::{QueryError, QueryExecutor, SqlRow, SqlValue};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use uuid::Uuid;

/// Responses are matched by SQL substring (table names are unique enough);
/// unmatched queries return an empty result set.
#[derive(Default)]
pub struct FakeExecutor {
    scripts: Vec<(String, Result<Vec<SqlRow>, String>)>,
    calls: Mutex<Vec<String>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, sql_contains: &str, rows: Vec<SqlRow>) -> Self {
        self.scripts.push((sql_contains.to_string(), Ok(rows)));
        self
    }

    pub fn failing_on(mut self, sql_contains: &str, message: &str) -> Self {
        self.scripts
            .push((sql_contains.to_string(), Err(message.to_string())));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for FakeExecutor {
    async fn fetch_all(&self, sql: &str, _params: &[SqlValue]) -> Result<Vec<SqlRow>, QueryError> {
        self.calls.lock().unwrap().push(sql.to_string());
        for (needle, result) in &self.scripts {
            if sql.contains(needle.as_str()) {
                return match result {
                    Ok(rows) => Ok(rows.clone()),
                    Err(message) => Err(message.clone().into()),
                };
            }
        }
        Ok(Vec::new())
    }
}

pub fn row(columns: Vec<(&str, SqlValue)>) -> SqlRow {
    SqlRow::new(
        columns
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
    )
}

pub fn count_row(total: i64) -> SqlRow {
    row(vec![("total", SqlValue::Int(total))])
}

/// A full-width `security_log` row.
pub fn security_log_row(email: &str, event_type: &str, at: DateTime<Utc>) -> SqlRow {
    row(vec![
        ("id", SqlValue::Uuid(Uuid::new_v4())),
        ("user_id", SqlValue::Uuid(Uuid::new_v4())),
        ("user_email", SqlValue::Text(email.to_string())),
        ("event_type", SqlValue::Text(event_type.to_string())),
        ("ip_address", SqlValue::Null),
        ("organization_id", SqlValue::Null),
        ("created_at", SqlValue::Timestamp(at)),
    ])
}

/// A full-width `vendors` row; `updated_at == created_at`, nothing assigned,
/// not deleted.
pub fn vendor_row(name: &str, created_at: DateTime<Utc>) -> SqlRow {
    row(vec![
        ("id", SqlValue::Uuid(Uuid::new_v4())),
        ("name", SqlValue::Text(name.to_string())),
        ("status", SqlValue::Text("active".to_string())),
        ("risk_score", SqlValue::Null),
        ("risk_grade", SqlValue::Null),
        ("assigned_to_email", SqlValue::Null),
        ("created_by_email", SqlValue::Text("alice@example.com".to_string())),
        ("organization_id", SqlValue::Null),
        ("created_at", SqlValue::Timestamp(created_at)),
        ("updated_at", SqlValue::Timestamp(created_at)),
        ("deleted_at", SqlValue::Null),
    ])
}

/// A full-width `users` row.
pub fn user_row(email: &str, role: &str, created_at: DateTime<Utc>) -> SqlRow {
    row(vec![
        ("id", SqlValue::Uuid(Uuid::new_v4())),
        ("email", SqlValue::Text(email.to_string())),
        ("first_name", SqlValue::Text("Alice".to_string())),
        ("last_name", SqlValue::Text("Smith".to_string())),
        ("role", SqlValue::Text(role.to_string())),
        ("organization_id", SqlValue::Null),
        ("created_at", SqlValue::Timestamp(created_at)),
        ("updated_at", SqlValue::Timestamp(created_at)),
        ("last_login_at", SqlValue::Null),
    ])
}
