use activity_core_api::error::{ActivityError, ActivityResult};
use activity_core_db::executor::QueryExecutor;
use activity_core_db::models::activity::Activity;
use activity_core_db::models::filters::{
    ActivityFilters, Granularity, MetricSource, MetricWindow, VendorSearchFilters,
};
use activity_core_db::models::journey::Journey;
use activity_core_db::models::kpi::DashboardKpis;
use activity_core_db::models::timeseries::TimeBucket;
use activity_core_db::models::top_lists::TopLists;
use activity_core_db::models::vendor::VendorRecord;
use activity_core_db::repository::pagination::{Page, PageRequest};
use std::sync::Arc;
use uuid::Uuid;

use crate::analytics::{KpiCalculator, TimeSeriesBucketer, TopListAggregator};
use crate::federation::ActivityFederation;
use crate::journey::JourneyComposer;
use crate::org_directory::OrgDirectory;
use crate::vendor_search::VendorSearch;

/// The surface handed to the HTTP layer: pure async methods over
/// already-validated arguments, plain data in and out, no framework types.
/// Everything is wired off one injected [`QueryExecutor`].
pub struct AnalyticsService {
    federation: Arc<ActivityFederation>,
    kpis: KpiCalculator,
    series: TimeSeriesBucketer,
    top: TopListAggregator,
    journeys: JourneyComposer,
    vendors: VendorSearch,
}

impl AnalyticsService {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        let federation = Arc::new(ActivityFederation::new(executor.clone()));
        let org_names = OrgDirectory::new(executor.clone());
        Self {
            kpis: KpiCalculator::new(executor.clone()),
            series: TimeSeriesBucketer::new(executor.clone()),
            top: TopListAggregator::new(executor.clone()),
            journeys: JourneyComposer::new(executor.clone(), federation.clone(), org_names),
            vendors: VendorSearch::new(executor),
            federation,
        }
    }

    /// The merged activity stream. Degraded sources shrink the result rather
    /// than failing it, so this call is infallible.
    pub async fn activities(
        &self,
        filters: &ActivityFilters,
        page: PageRequest,
    ) -> Page<Activity> {
        self.federation.merge(filters, page).await
    }

    /// Resolve one synthetic activity id; `None` for unknown or stale ids.
    pub async fn activity_by_id(&self, id: &str) -> ActivityResult<Option<Activity>> {
        self.federation
            .activity_by_id(id)
            .await
            .map_err(|err| ActivityError::SourceRead(err.to_string()))
    }

    pub async fn dashboard_kpis(
        &self,
        window: MetricWindow,
        organization_id: Option<Uuid>,
    ) -> DashboardKpis {
        self.kpis.dashboard(window, organization_id).await
    }

    pub async fn time_series(
        &self,
        window: MetricWindow,
        source: MetricSource,
        granularity: Granularity,
        organization_id: Option<Uuid>,
    ) -> ActivityResult<Vec<TimeBucket>> {
        self.series
            .series(window, source, granularity, organization_id)
            .await
            .map_err(|err| ActivityError::SourceRead(err.to_string()))
    }

    pub async fn top_lists(&self, window: MetricWindow, limit: u32) -> TopLists {
        self.top.top_lists(window, limit).await
    }

    pub async fn user_journey(
        &self,
        actor_email: &str,
        window: MetricWindow,
    ) -> ActivityResult<Journey> {
        self.journeys.compose(actor_email, window).await
    }

    pub async fn search_vendors(
        &self,
        filters: &VendorSearchFilters,
        page: PageRequest,
    ) -> ActivityResult<Page<VendorRecord>> {
        self.vendors
            .search(filters, page)
            .await
            .map_err(|err| ActivityError::SourceRead(err.to_string()))
    }
}
