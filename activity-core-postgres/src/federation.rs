use activity_core_db::executor::{QueryError, QueryExecutor};
use activity_core_db::identity;
use activity_core_db::models::activity::Activity;
use activity_core_db::models::filters::ActivityFilters;
use activity_core_db::repository::pagination::{Page, PageRequest};
use activity_core_db::repository::source::ActivitySource;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::org_directory::OrgDirectory;
use crate::sources::{
    AssessmentHistorySource, AssessmentSource, AuthEventSource, DocumentSource,
    IntegrationSource, OrganizationSource, TaskSource, UserAccountSource, VendorSource,
};

/// A slow source degrades to empty after this long instead of stalling the
/// join barrier.
pub const SOURCE_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Merges the nine per-table reconstructions into one chronologically
/// ordered stream.
///
/// Each source is independently capped, and the merge/slice happens after
/// concatenating those capped sets: pages beyond the first can omit rows
/// that fell outside a per-source cap. That is the accepted cost of a
/// reconstruction-based view; it is documented rather than hidden, and the
/// total is likewise a per-table count estimate, not an exact count of the
/// merged stream.
pub struct ActivityFederation {
    sources: Vec<Arc<dyn ActivitySource>>,
    org_names: OrgDirectory,
}

impl ActivityFederation {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        let sources: Vec<Arc<dyn ActivitySource>> = vec![
            Arc::new(AuthEventSource::new(executor.clone())),
            Arc::new(UserAccountSource::new(executor.clone())),
            Arc::new(OrganizationSource::new(executor.clone())),
            Arc::new(VendorSource::new(executor.clone())),
            Arc::new(AssessmentSource::new(executor.clone())),
            Arc::new(AssessmentHistorySource::new(executor.clone())),
            Arc::new(TaskSource::new(executor.clone())),
            Arc::new(DocumentSource::new(executor.clone())),
            Arc::new(IntegrationSource::new(executor.clone())),
        ];
        let org_names = OrgDirectory::new(executor);
        Self { sources, org_names }
    }

    /// Assemble a federation over an explicit source set (test seam).
    pub fn with_sources(sources: Vec<Arc<dyn ActivitySource>>, org_names: OrgDirectory) -> Self {
        Self { sources, org_names }
    }

    /// Fan out, join, filter, sort, slice.
    pub async fn merge(&self, filters: &ActivityFilters, page: PageRequest) -> Page<Activity> {
        let (collected, total) =
            tokio::join!(self.fan_out_fetch(filters), self.count_estimate(filters));

        let mut merged: Vec<Activity> = collected
            .into_iter()
            .filter(|activity| filters.matches(activity))
            .collect();
        // Deterministic ordering: newest first, synthetic id breaks ties.
        merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));

        let mut items: Vec<Activity> = merged
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect();
        self.org_names.decorate(&mut items).await;

        Page::new(items, total as usize, page.limit, page.offset)
    }

    /// Sum of per-table row counts under the pushed-down filters, a
    /// documented estimate (in-memory predicates are not reflected).
    pub async fn count_estimate(&self, filters: &ActivityFilters) -> u64 {
        let mut handles = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let source = Arc::clone(source);
            let filters = filters.clone();
            handles.push(tokio::spawn(async move {
                let kind = source.kind();
                match timeout(SOURCE_FETCH_TIMEOUT, source.count(&filters)).await {
                    Ok(Ok(count)) => count,
                    Ok(Err(err)) => {
                        tracing::warn!(source = %kind, error = %err, "source count failed; counting zero");
                        0
                    }
                    Err(_) => {
                        tracing::warn!(source = %kind, "source count timed out; counting zero");
                        0
                    }
                }
            }));
        }
        let mut total = 0u64;
        for handle in handles {
            if let Ok(count) = handle.await {
                total += count;
            }
        }
        total
    }

    /// Resolve one synthetic id back to its activity by re-reading the
    /// owning origin row. Unknown or stale ids resolve to `None`.
    pub async fn activity_by_id(&self, id: &str) -> Result<Option<Activity>, QueryError> {
        let Some(parsed) = identity::parse(id) else {
            return Ok(None);
        };
        let Some(source) = self
            .sources
            .iter()
            .find(|source| source.kind() == parsed.source)
        else {
            return Ok(None);
        };

        let activities = source.fetch_by_origin(parsed.origin).await?;
        let mut found = activities.into_iter().find(|activity| activity.id == id);
        if let Some(activity) = found.as_mut() {
            if activity.organization_name.is_none() {
                if let Some(organization_id) = activity.organization_id {
                    activity.organization_name = self.org_names.resolve(organization_id).await;
                }
            }
        }
        Ok(found)
    }

    async fn fan_out_fetch(&self, filters: &ActivityFilters) -> Vec<Activity> {
        let mut handles = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let source = Arc::clone(source);
            let filters = filters.clone();
            handles.push(tokio::spawn(async move {
                let kind = source.kind();
                match timeout(SOURCE_FETCH_TIMEOUT, source.fetch(&filters)).await {
                    Ok(Ok(activities)) => activities,
                    Ok(Err(err)) => {
                        tracing::warn!(source = %kind, error = %err, "source read failed; degrading to empty");
                        Vec::new()
                    }
                    Err(_) => {
                        tracing::warn!(
                            source = %kind,
                            timeout_secs = SOURCE_FETCH_TIMEOUT.as_secs(),
                            "source read timed out; degrading to empty"
                        );
                        Vec::new()
                    }
                }
            }));
        }

        let mut collected = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(activities) => collected.extend(activities),
                Err(err) => tracing::warn!(error = %err, "source fetch task aborted"),
            }
        }
        collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helper::{count_row, security_log_row, vendor_row, FakeExecutor};
    use activity_core_db::models::activity::{ActivityAction, SourceKind};
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn base_time() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 10, 12, 0, 0).unwrap()
    }

    fn federation(executor: FakeExecutor) -> ActivityFederation {
        ActivityFederation::new(Arc::new(executor))
    }

    #[tokio::test]
    async fn merged_page_is_sorted_newest_first() {
        let at = base_time();
        let executor = FakeExecutor::new()
            .on(
                "FROM security_log ",
                vec![
                    security_log_row("alice@example.com", "LOGIN_SUCCESS", at - ChronoDuration::hours(2)),
                    security_log_row("bob@example.com", "LOGIN_SUCCESS", at),
                ],
            )
            .on("FROM vendors ", vec![vendor_row("Acme", at - ChronoDuration::hours(1))]);

        let page = federation(executor)
            .merge(&ActivityFilters::default(), PageRequest::new(10, 0))
            .await;

        assert_eq!(page.items.len(), 3);
        for pair in page.items.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
        assert_eq!(page.items[0].actor_email.as_deref(), Some("bob@example.com"));
        assert_eq!(page.items[1].action, ActivityAction::VendorCreate);
    }

    #[tokio::test]
    async fn failing_source_degrades_to_empty() {
        let at = base_time();
        let executor = FakeExecutor::new()
            .on(
                "FROM security_log ",
                vec![security_log_row("alice@example.com", "LOGIN_SUCCESS", at)],
            )
            .failing_on("FROM vendors", "relation is on fire");

        let page = federation(executor)
            .merge(&ActivityFilters::default(), PageRequest::new(10, 0))
            .await;

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].source, SourceKind::Auth);
    }

    #[tokio::test]
    async fn page_past_the_end_is_empty_with_total_echoed() {
        let at = base_time();
        let executor = FakeExecutor::new()
            .on(
                "FROM security_log ",
                vec![security_log_row("alice@example.com", "LOGIN_SUCCESS", at)],
            )
            .on("SELECT COUNT(*) AS total FROM security_log", vec![count_row(1)]);

        let page = federation(executor)
            .merge(&ActivityFilters::default(), PageRequest::new(10, 50))
            .await;

        assert!(page.items.is_empty());
        assert_eq!(page.total, 1);
        assert_eq!(page.limit, 10);
        assert_eq!(page.offset, 50);
    }

    #[tokio::test]
    async fn count_estimate_sums_per_source_counts() {
        let executor = FakeExecutor::new()
            .on("SELECT COUNT(*) AS total FROM security_log", vec![count_row(40)])
            .on("SELECT COUNT(*) AS total FROM vendors", vec![count_row(2)]);

        let total = federation(executor)
            .count_estimate(&ActivityFilters::default())
            .await;
        assert_eq!(total, 42);
    }

    #[tokio::test]
    async fn in_memory_predicate_filters_the_merged_set() {
        let at = base_time();
        let executor = FakeExecutor::new()
            .on(
                "FROM security_log ",
                vec![
                    security_log_row("alice@example.com", "LOGIN_SUCCESS", at),
                    security_log_row("bob@example.com", "LOGIN_FAILED_PASSWORD", at),
                ],
            )
            .on("FROM vendors ", vec![vendor_row("Acme", at)]);

        let filters = ActivityFilters {
            action: Some(ActivityAction::UserLoginFailed),
            ..Default::default()
        };
        let page = federation(executor).merge(&filters, PageRequest::new(10, 0)).await;

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].actor_email.as_deref(), Some("bob@example.com"));
    }

    #[tokio::test]
    async fn activity_by_id_round_trips_through_the_owning_source() {
        let at = base_time();
        let vendor = vendor_row("Acme", at);
        let executor = FakeExecutor::new().on("FROM vendors WHERE id = $1", vec![vendor.clone()]);
        let federation = federation(executor);

        let vendor_id = vendor.try_uuid("id").unwrap();
        let id = activity_core_db::identity::assign(
            SourceKind::Vendors,
            ActivityAction::VendorCreate,
            vendor_id,
        );
        let found = federation.activity_by_id(&id).await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.entity_name.as_deref(), Some("Acme"));

        assert!(federation.activity_by_id("not-a-synthetic-id").await.unwrap().is_none());
    }
}
