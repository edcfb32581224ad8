pub mod executor;
pub mod identity;
pub mod models;
pub mod query;
pub mod repository;

pub use executor::{QueryError, QueryExecutor, SqlRow, SqlValue};
pub use query::QueryBuilder;
pub use repository::pagination::{Page, PageRequest};
pub use repository::source::ActivitySource;
