pub mod analytics;
pub mod federation;
pub mod journey;
pub mod org_directory;
pub mod pg_executor;
pub mod service;
pub mod sources;
pub mod utils;
pub mod vendor_search;

pub use pg_executor::PgExecutor;
pub use service::AnalyticsService;

#[cfg(test)]
pub mod test_helper;
