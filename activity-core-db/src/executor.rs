use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::error::Error;
use uuid::Uuid;

pub type QueryError = Box<dyn Error + Send + Sync>;

/// A database value crossing the query boundary in either direction:
/// as a positional parameter on the way in, as a decoded column on the
/// way out.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Numeric(Decimal),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Json(JsonValue),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<Uuid> for SqlValue {
    fn from(value: Uuid) -> Self {
        SqlValue::Uuid(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl From<Decimal> for SqlValue {
    fn from(value: Decimal) -> Self {
        SqlValue::Numeric(value)
    }
}

/// One decoded result row: column name to value, in select order.
#[derive(Debug, Clone, Default)]
pub struct SqlRow {
    columns: Vec<(String, SqlValue)>,
}

impl SqlRow {
    pub fn new(columns: Vec<(String, SqlValue)>) -> Self {
        Self { columns }
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, value)| value)
    }

    fn required(&self, name: &str) -> Result<&SqlValue, QueryError> {
        self.get(name)
            .ok_or_else(|| format!("column '{name}' missing from row").into())
    }

    fn mismatch(name: &str, expected: &str, got: &SqlValue) -> QueryError {
        format!("column '{name}': expected {expected}, got {got:?}").into()
    }

    pub fn try_uuid(&self, name: &str) -> Result<Uuid, QueryError> {
        match self.required(name)? {
            SqlValue::Uuid(value) => Ok(*value),
            other => Err(Self::mismatch(name, "uuid", other)),
        }
    }

    pub fn try_opt_uuid(&self, name: &str) -> Result<Option<Uuid>, QueryError> {
        match self.get(name) {
            None | Some(SqlValue::Null) => Ok(None),
            Some(SqlValue::Uuid(value)) => Ok(Some(*value)),
            Some(other) => Err(Self::mismatch(name, "uuid", other)),
        }
    }

    pub fn try_text(&self, name: &str) -> Result<String, QueryError> {
        match self.required(name)? {
            SqlValue::Text(value) => Ok(value.clone()),
            other => Err(Self::mismatch(name, "text", other)),
        }
    }

    pub fn try_opt_text(&self, name: &str) -> Result<Option<String>, QueryError> {
        match self.get(name) {
            None | Some(SqlValue::Null) => Ok(None),
            Some(SqlValue::Text(value)) => Ok(Some(value.clone())),
            Some(other) => Err(Self::mismatch(name, "text", other)),
        }
    }

    pub fn try_i64(&self, name: &str) -> Result<i64, QueryError> {
        match self.required(name)? {
            SqlValue::Int(value) => Ok(*value),
            other => Err(Self::mismatch(name, "integer", other)),
        }
    }

    /// Aggregates can come back NULL on empty groups; treat that as zero.
    pub fn try_count(&self, name: &str) -> Result<i64, QueryError> {
        match self.get(name) {
            None | Some(SqlValue::Null) => Ok(0),
            Some(SqlValue::Int(value)) => Ok(*value),
            Some(other) => Err(Self::mismatch(name, "integer", other)),
        }
    }

    pub fn try_timestamp(&self, name: &str) -> Result<DateTime<Utc>, QueryError> {
        match self.required(name)? {
            SqlValue::Timestamp(value) => Ok(*value),
            other => Err(Self::mismatch(name, "timestamp", other)),
        }
    }

    pub fn try_opt_timestamp(&self, name: &str) -> Result<Option<DateTime<Utc>>, QueryError> {
        match self.get(name) {
            None | Some(SqlValue::Null) => Ok(None),
            Some(SqlValue::Timestamp(value)) => Ok(Some(*value)),
            Some(other) => Err(Self::mismatch(name, "timestamp", other)),
        }
    }

    /// NUMERIC columns, tolerating integer-typed expressions.
    pub fn try_opt_numeric(&self, name: &str) -> Result<Option<Decimal>, QueryError> {
        match self.get(name) {
            None | Some(SqlValue::Null) => Ok(None),
            Some(SqlValue::Numeric(value)) => Ok(Some(*value)),
            Some(SqlValue::Int(value)) => Ok(Some(Decimal::from(*value))),
            Some(other) => Err(Self::mismatch(name, "numeric", other)),
        }
    }
}

/// The storage layer seen from this subsystem: execute parameterized SQL,
/// get decoded rows back. All user-supplied values travel through `params`
/// as positional placeholders, never inside `sql`.
///
/// Injected into every query-issuing component so adapters and calculators
/// are testable against fakes.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn fetch_all(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>, QueryError>;

    async fn fetch_optional(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Option<SqlRow>, QueryError> {
        Ok(self.fetch_all(sql, params).await?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> SqlRow {
        SqlRow::new(vec![
            ("id".to_string(), SqlValue::Uuid(Uuid::nil())),
            ("name".to_string(), SqlValue::Text("Acme".to_string())),
            ("score".to_string(), SqlValue::Null),
            ("total".to_string(), SqlValue::Int(42)),
        ])
    }

    #[test]
    fn typed_accessors() {
        let row = sample_row();
        assert_eq!(row.try_uuid("id").unwrap(), Uuid::nil());
        assert_eq!(row.try_text("name").unwrap(), "Acme");
        assert_eq!(row.try_opt_numeric("score").unwrap(), None);
        assert_eq!(row.try_i64("total").unwrap(), 42);
    }

    #[test]
    fn missing_column_is_an_error() {
        let row = sample_row();
        assert!(row.try_text("nope").is_err());
    }

    #[test]
    fn null_aggregate_counts_as_zero() {
        let row = sample_row();
        assert_eq!(row.try_count("score").unwrap(), 0);
        assert_eq!(row.try_count("absent").unwrap(), 0);
        assert_eq!(row.try_count("total").unwrap(), 42);
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let row = sample_row();
        assert!(row.try_uuid("name").is_err());
        assert!(row.try_timestamp("total").is_err());
    }
}
