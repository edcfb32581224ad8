use activity_core_db::executor::{QueryError, QueryExecutor, SqlRow, SqlValue};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row, TypeInfo};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// The live [`QueryExecutor`]: positional binds against a shared `PgPool`,
/// decoding result rows into the neutral [`SqlRow`] shape by column type.
pub struct PgExecutor {
    pool: Arc<PgPool>,
}

impl PgExecutor {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, QueryError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await?;
        Ok(Self::new(Arc::new(pool)))
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        SqlValue::Null => query.bind(Option::<String>::None),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Numeric(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Uuid(v) => query.bind(*v),
        SqlValue::Timestamp(v) => query.bind(*v),
        SqlValue::Json(v) => query.bind(v.clone()),
    }
}

fn decode_column(row: &PgRow, index: usize, type_name: &str) -> Result<SqlValue, QueryError> {
    let value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(SqlValue::Bool),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)?
            .map(|v| SqlValue::Int(i64::from(v))),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)?
            .map(|v| SqlValue::Int(i64::from(v))),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.map(SqlValue::Int),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)?
            .map(|v| SqlValue::Float(f64::from(v))),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(SqlValue::Float),
        "NUMERIC" => row
            .try_get::<Option<Decimal>, _>(index)?
            .map(SqlValue::Numeric),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "CITEXT" => row
            .try_get::<Option<String>, _>(index)?
            .map(SqlValue::Text),
        "UUID" => row.try_get::<Option<Uuid>, _>(index)?.map(SqlValue::Uuid),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)?
            .map(SqlValue::Timestamp),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)?
            .map(|v| SqlValue::Timestamp(v.and_utc())),
        "JSON" | "JSONB" => row
            .try_get::<Option<serde_json::Value>, _>(index)?
            .map(SqlValue::Json),
        other => {
            return Err(format!("unsupported column type '{other}' at index {index}").into());
        }
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

fn decode_row(row: &PgRow) -> Result<SqlRow, QueryError> {
    let mut columns = Vec::with_capacity(row.columns().len());
    for (index, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, index, column.type_info().name())?;
        columns.push((column.name().to_string(), value));
    }
    Ok(SqlRow::new(columns))
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn fetch_all(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>, QueryError> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_value(query, param);
        }
        let rows = query.fetch_all(&*self.pool).await?;
        rows.iter().map(decode_row).collect()
    }
}
