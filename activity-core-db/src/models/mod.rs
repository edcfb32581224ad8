pub mod activity;
pub mod filters;
pub mod journey;
pub mod kpi;
pub mod timeseries;
pub mod top_lists;
pub mod vendor;

// Re-exports
pub use activity::*;
pub use filters::*;
pub use journey::*;
pub use kpi::*;
pub use timeseries::*;
pub use top_lists::*;
pub use vendor::*;
