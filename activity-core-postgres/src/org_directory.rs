use activity_core_db::executor::{QueryExecutor, SqlValue};
use activity_core_db::models::activity::Activity;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const CACHE_CAPACITY: u64 = 1024;
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Best-effort organization display-name resolution with a short-lived
/// positive/negative cache. A failed lookup resolves to `None` and is not
/// retried until the entry expires.
#[derive(Clone)]
pub struct OrgDirectory {
    executor: Arc<dyn QueryExecutor>,
    cache: Cache<Uuid, Option<String>>,
}

impl OrgDirectory {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            executor,
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    pub async fn resolve(&self, organization_id: Uuid) -> Option<String> {
        self.cache
            .get_with(organization_id, async {
                let lookup = self
                    .executor
                    .fetch_optional(
                        "SELECT name FROM organizations WHERE id = $1",
                        &[SqlValue::Uuid(organization_id)],
                    )
                    .await;
                match lookup {
                    Ok(Some(row)) => row.try_opt_text("name").ok().flatten(),
                    Ok(None) => None,
                    Err(err) => {
                        tracing::warn!(%organization_id, error = %err, "organization name lookup failed");
                        None
                    }
                }
            })
            .await
    }

    /// Fill in missing display names on a page of activities.
    pub async fn decorate(&self, activities: &mut [Activity]) {
        for activity in activities {
            if activity.organization_name.is_none() {
                if let Some(organization_id) = activity.organization_id {
                    activity.organization_name = self.resolve(organization_id).await;
                }
            }
        }
    }
}
