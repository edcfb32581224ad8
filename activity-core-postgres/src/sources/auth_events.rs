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

/// Authentication events are the busiest table; they get the largest cap.
const FETCH_CAP: i64 = 150;

const SELECT_COLUMNS: &str =
    "id, user_id, user_email, event_type, ip_address, organization_id, created_at";

pub struct AuthEventSource {
    executor: Arc<dyn QueryExecutor>,
}

impl AuthEventSource {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

struct SecurityLogRow {
    id: Uuid,
    user_id: Option<Uuid>,
    user_email: Option<HeaplessString<100>>,
    event_type: HeaplessString<50>,
    ip_address: Option<HeaplessString<45>>,
    organization_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFromRow for SecurityLogRow {
    fn try_from_row(row: &SqlRow) -> Result<Self, QueryError> {
        Ok(SecurityLogRow {
            id: row.try_uuid("id")?,
            user_id: row.try_opt_uuid("user_id")?,
            user_email: get_optional_heapless_string(row, "user_email")?,
            event_type: get_heapless_string(row, "event_type")?,
            ip_address: get_optional_heapless_string(row, "ip_address")?,
            organization_id: row.try_opt_uuid("organization_id")?,
            created_at: row.try_timestamp("created_at")?,
        })
    }
}

/// One auth row reconstructs at most one activity. Event types outside the
/// login/logout family (password resets, access denials) stay out of the
/// merged stream; they are still counted by the security summarizers.
fn project(row: &SecurityLogRow) -> Option<Activity> {
    let event_type = row.event_type.as_str();
    let (action, event) = match event_type {
        "LOGIN_SUCCESS" => (ActivityAction::UserLogin, "Signed in"),
        "LOGOUT" => (ActivityAction::UserLogout, "Signed out"),
        t if t.starts_with("LOGIN_FAILED") => {
            (ActivityAction::UserLoginFailed, "Failed sign-in attempt")
        }
        _ => return None,
    };

    let email = row.user_email.as_ref().map(|e| e.as_str().to_string());
    let mut metadata = Map::new();
    metadata.insert("event".to_string(), Value::from(event));
    metadata.insert("event_type".to_string(), Value::from(event_type));
    if let Some(ip) = &row.ip_address {
        metadata.insert("ip_address".to_string(), Value::from(ip.as_str()));
    }

    Some(Activity {
        id: identity::assign(SourceKind::Auth, action, row.id),
        source: SourceKind::Auth,
        timestamp: row.created_at,
        actor_id: row.user_id,
        actor_email: email.clone(),
        actor_name: None,
        organization_id: row.organization_id,
        action,
        entity_type: "user".to_string(),
        entity_id: row
            .user_id
            .map(|id| id.to_string())
            .or_else(|| email.clone())
            .unwrap_or_else(|| row.id.to_string()),
        entity_name: email,
        metadata,
        organization_name: None,
    })
}

fn collect(rows: &[SqlRow]) -> Result<Vec<Activity>, QueryError> {
    let mut activities = Vec::new();
    for row in rows {
        let row = SecurityLogRow::try_from_row(row)?;
        activities.extend(project(&row));
    }
    Ok(activities)
}

#[async_trait]
impl ActivitySource for AuthEventSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Auth
    }

    async fn fetch(&self, filters: &ActivityFilters) -> Result<Vec<Activity>, QueryError> {
        let mut builder = QueryBuilder::new();
        super::push_scope(&mut builder, filters, Some("user_email"), "created_at");
        let limit = builder.bind(FETCH_CAP);
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM security_log{} ORDER BY created_at DESC LIMIT ${limit}",
            builder.where_clause()
        );
        let rows = self.executor.fetch_all(&sql, builder.params()).await?;
        collect(&rows)
    }

    async fn count(&self, filters: &ActivityFilters) -> Result<u64, QueryError> {
        let mut builder = QueryBuilder::new();
        super::push_scope(&mut builder, filters, Some("user_email"), "created_at");
        let sql = format!(
            "SELECT COUNT(*) AS total FROM security_log{}",
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
        let sql = format!("SELECT {SELECT_COLUMNS} FROM security_log WHERE id = $1");
        let rows = self.executor.fetch_all(&sql, &[origin.into()]).await?;
        collect(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn log_row(event_type: &str) -> SecurityLogRow {
        SecurityLogRow {
            id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            user_email: Some(HeaplessString::from_str("alice@example.com").unwrap()),
            event_type: HeaplessString::from_str(event_type).unwrap(),
            ip_address: Some(HeaplessString::from_str("10.1.2.3").unwrap()),
            organization_id: None,
            created_at: Utc.with_ymd_and_hms(2025, 5, 2, 8, 30, 0).unwrap(),
        }
    }

    #[test]
    fn login_success_projects_to_user_login() {
        let row = log_row("LOGIN_SUCCESS");
        let activity = project(&row).unwrap();
        assert_eq!(activity.action, ActivityAction::UserLogin);
        assert_eq!(activity.actor_email.as_deref(), Some("alice@example.com"));
        assert_eq!(activity.metadata["ip_address"], "10.1.2.3");
        assert!(activity.id.starts_with("auth-login-"));
    }

    #[test]
    fn any_login_failed_variant_projects_to_login_failed() {
        for event_type in ["LOGIN_FAILED_PASSWORD", "LOGIN_FAILED_MFA"] {
            let activity = project(&log_row(event_type)).unwrap();
            assert_eq!(activity.action, ActivityAction::UserLoginFailed);
            assert_eq!(activity.metadata["event_type"], event_type);
        }
    }

    #[test]
    fn non_login_events_are_skipped() {
        assert!(project(&log_row("PASSWORD_RESET")).is_none());
        assert!(project(&log_row("ACCESS_DENIED")).is_none());
    }

    #[test]
    fn reconstruction_is_idempotent() {
        let row = log_row("LOGIN_SUCCESS");
        let first = project(&row).unwrap();
        let second = project(&row).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.entity_id, second.entity_id);
    }
}
