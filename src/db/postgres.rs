//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient` trait
//! for PostgreSQL databases using sqlx.

use crate::config::ConnectionConfig;
use crate::db::{
    map_connection_error, ColumnInfo, DatabaseClient, QueryResult, Row, Schema, Table, Value,
    MAX_ROWS,
};
use crate::error::{AskSqlError, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, Uuid};
use sqlx::{Column as SqlxColumn, Executor, Postgres, Row as SqlxRow, Statement, TypeInfo};
use std::time::Instant;
use tracing::{debug, warn};

/// PostgreSQL database client.
#[derive(Debug)]
pub struct PostgresClient {
    pool: PgPool,
    schema: String,
}

impl PostgresClient {
    /// Opens a single-connection pool for the given configuration.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(config.password.expose())
            .database(&config.database);

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| map_connection_error(&e, config))?;

        debug!(host = %config.host, database = %config.database, "Connected to PostgreSQL");

        Ok(Self {
            pool,
            schema: config.schema_name().to_string(),
        })
    }

    /// Creates a client from an existing pool, introspecting `schema`.
    pub fn from_pool(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    /// Lists base tables in the configured schema, ordered by name.
    async fn fetch_table_names(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(
            r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = $1 AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
        )
        .bind(&self.schema)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AskSqlError::query(format!("Failed to fetch tables: {e}")))
    }

    /// Fetches column names for a table in ordinal order.
    async fn fetch_columns(&self, table_name: &str) -> Result<Vec<String>> {
        sqlx::query_scalar(
            r#"
            SELECT column_name::text
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
            "#,
        )
        .bind(&self.schema)
        .bind(table_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AskSqlError::query(format!("Failed to fetch columns for {table_name}: {e}")))
    }

    /// Column metadata from the prepared statement, for empty results.
    async fn fetch_column_metadata(&self, sql: &str) -> Vec<ColumnInfo> {
        match (&self.pool).prepare(sql).await {
            Ok(statement) => statement
                .columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect(),
            Err(e) => {
                debug!("Could not describe empty result: {e}");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn introspect_schema(&self) -> Result<Schema> {
        let table_names = self.fetch_table_names().await?;
        let mut tables = Vec::with_capacity(table_names.len());

        for name in table_names {
            let columns = self.fetch_columns(&name).await?;
            tables.push(Table { name, columns });
        }

        Ok(Schema { tables })
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();

        let result = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AskSqlError::query(format_query_error(e)))?;

        let execution_time = start.elapsed();

        let columns: Vec<ColumnInfo> = match result.first() {
            Some(first_row) => first_row
                .columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect(),
            None => self.fetch_column_metadata(sql).await,
        };

        let total_rows = result.len();
        let was_truncated = total_rows > MAX_ROWS;

        if was_truncated {
            warn!(
                "Query returned {} rows, truncating to {} rows",
                total_rows, MAX_ROWS
            );
        }

        let rows: Vec<Row> = result.iter().take(MAX_ROWS).map(convert_row).collect();
        let row_count = rows.len();

        Ok(QueryResult {
            columns,
            rows,
            execution_time,
            row_count,
            total_rows: Some(total_rows),
            was_truncated,
        })
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

fn get<'r, T>(row: &'r PgRow, index: usize) -> Option<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(index).ok().flatten()
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    let value = match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => get::<bool>(row, index).map(Value::Bool),
        "INT2" | "SMALLINT" => get::<i16>(row, index).map(|v| Value::Int(v as i64)),
        "INT4" | "INT" | "INTEGER" => get::<i32>(row, index).map(|v| Value::Int(v as i64)),
        "INT8" | "BIGINT" => get::<i64>(row, index).map(Value::Int),
        "FLOAT4" | "REAL" => get::<f32>(row, index).map(|v| Value::Float(v as f64)),
        "FLOAT8" | "DOUBLE PRECISION" => get::<f64>(row, index).map(Value::Float),
        "NUMERIC" => get::<Decimal>(row, index).map(|v| Value::String(v.to_string())),
        "TIMESTAMP" => get::<NaiveDateTime>(row, index).map(|v| Value::String(v.to_string())),
        "TIMESTAMPTZ" => get::<DateTime<Utc>>(row, index).map(|v| Value::String(v.to_rfc3339())),
        "DATE" => get::<NaiveDate>(row, index).map(|v| Value::String(v.to_string())),
        "TIME" => get::<NaiveTime>(row, index).map(|v| Value::String(v.to_string())),
        "UUID" => get::<Uuid>(row, index).map(|v| Value::String(v.to_string())),
        "JSON" | "JSONB" => {
            get::<serde_json::Value>(row, index).map(|v| Value::String(v.to_string()))
        }
        "BYTEA" => get::<Vec<u8>>(row, index).map(Value::Bytes),
        _ => get::<String>(row, index).map(Value::String).or_else(|| {
            // Enums and other text-like types.
            row.try_get_unchecked::<Option<String>, _>(index)
                .ok()
                .flatten()
                .map(Value::String)
        }),
    };

    value.unwrap_or(Value::Null)
}

/// Formats a query error with hints if available.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}
