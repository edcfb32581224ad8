pub mod kpi;
pub mod timeseries;
pub mod top_lists;

pub use kpi::KpiCalculator;
pub use timeseries::TimeSeriesBucketer;
pub use top_lists::TopListAggregator;
