//! One adapter per origin table. Each reads a bounded, newest-first slice of
//! its table and projects raw rows into canonical activities; the projection
//! functions are pure and tested row-by-row.

pub mod assessment_history;
pub mod assessments;
pub mod auth_events;
pub mod documents;
pub mod integrations;
pub mod organizations;
pub mod tasks;
pub mod users;
pub mod vendors;

pub use assessment_history::AssessmentHistorySource;
pub use assessments::AssessmentSource;
pub use auth_events::AuthEventSource;
pub use documents::DocumentSource;
pub use integrations::IntegrationSource;
pub use organizations::OrganizationSource;
pub use tasks::TaskSource;
pub use users::UserAccountSource;
pub use vendors::VendorSource;

use activity_core_db::models::filters::ActivityFilters;
use activity_core_db::query::QueryBuilder;

/// Push the uniformly supported filters down into a source query:
/// organization scoping, the actor column where the table has one, and the
/// date range on the table's own timestamp column.
pub(crate) fn push_scope(
    builder: &mut QueryBuilder,
    filters: &ActivityFilters,
    actor_column: Option<&str>,
    timestamp_column: &str,
) {
    if let Some(org) = filters.organization_id {
        builder.push_eq("organization_id", org);
    }
    if let (Some(column), Some(actor)) = (actor_column, &filters.actor_email) {
        let position = builder.bind(actor.to_lowercase());
        builder.push_fragment(format!("lower({column}) = ${position}"));
    }
    builder.push_range(timestamp_column, filters.from, filters.to);
}
