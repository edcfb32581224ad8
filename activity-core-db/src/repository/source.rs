use async_trait::async_trait;
use uuid::Uuid;

use crate::executor::QueryError;
use crate::models::activity::{Activity, SourceKind};
use crate::models::filters::ActivityFilters;

/// One origin table's view into the federated activity stream.
///
/// An adapter reads a bounded, timestamp-descending slice of its table and
/// projects each raw row into one or more canonical activities. Reads are
/// pure; errors are returned to the merger, which degrades that source to an
/// empty result rather than failing the federation.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Bounded reconstruction: at most the source's per-call cap of rows,
    /// newest first, with organization and date-range filters pushed down.
    async fn fetch(&self, filters: &ActivityFilters) -> Result<Vec<Activity>, QueryError>;

    /// Cheap per-table row count under the same pushed-down filters; feeds
    /// the federation's total estimate.
    async fn count(&self, filters: &ActivityFilters) -> Result<u64, QueryError>;

    /// Reconstruct the activities of a single origin row, for synthetic-id
    /// lookups.
    async fn fetch_by_origin(&self, origin: Uuid) -> Result<Vec<Activity>, QueryError>;
}
