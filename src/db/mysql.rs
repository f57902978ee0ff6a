//! MySQL database client implementation.
//!
//! Introspection runs over the text protocol (`SHOW TABLES`, `DESCRIBE`);
//! generated queries run as single prepared statements.

use crate::config::ConnectionConfig;
use crate::db::{
    map_connection_error, ColumnInfo, DatabaseClient, QueryResult, Row, Schema, Table, Value,
    MAX_ROWS,
};
use crate::error::{AskSqlError, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::Decimal;
use sqlx::{Column as SqlxColumn, Executor, MySql, Row as SqlxRow, Statement, TypeInfo};
use std::time::Instant;
use tracing::{debug, warn};

/// MySQL database client.
#[derive(Debug)]
pub struct MySqlClient {
    pool: MySqlPool,
}

impl MySqlClient {
    /// Opens a single-connection pool for the given configuration.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(config.password.expose())
            .database(&config.database);

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| map_connection_error(&e, config))?;

        debug!(host = %config.host, database = %config.database, "Connected to MySQL");

        Ok(Self { pool })
    }

    /// Creates a client from an existing pool.
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch_table_names(&self) -> Result<Vec<String>> {
        let rows = sqlx::raw_sql("SHOW TABLES")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AskSqlError::query(format!("Failed to fetch tables: {e}")))?;

        Ok(rows.iter().filter_map(|row| text_at(row, 0)).collect())
    }

    /// Column names in native order; `Field` is the first column of `DESCRIBE`.
    async fn fetch_columns(&self, table_name: &str) -> Result<Vec<String>> {
        let sql = format!("DESCRIBE {}", quote_identifier(table_name));
        let rows = sqlx::raw_sql(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AskSqlError::query(format!("Failed to fetch columns for {table_name}: {e}"))
            })?;

        Ok(rows.iter().filter_map(|row| text_at(row, 0)).collect())
    }

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
impl DatabaseClient for MySqlClient {
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

/// Quotes a MySQL identifier with backticks.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn get<'r, T>(row: &'r MySqlRow, index: usize) -> Option<T>
where
    T: sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
{
    row.try_get::<Option<T>, _>(index).ok().flatten()
}

/// Reads a column as text, tolerating binary collations.
fn text_at(row: &MySqlRow, index: usize) -> Option<String> {
    get::<String>(row, index)
        .or_else(|| get::<Vec<u8>>(row, index).map(|b| String::from_utf8_lossy(&b).into_owned()))
        .or_else(|| {
            row.try_get_unchecked::<Option<String>, _>(index)
                .ok()
                .flatten()
        })
}

fn convert_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

fn convert_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    let upper = type_name.to_uppercase();

    let value = match upper.as_str() {
        "BOOLEAN" => get::<bool>(row, index).map(Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            get::<i64>(row, index).map(Value::Int)
        }
        t if t.ends_with("UNSIGNED") => get::<u64>(row, index).map(|v| match i64::try_from(v) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::String(v.to_string()),
        }),
        "FLOAT" => get::<f32>(row, index).map(|v| Value::Float(v as f64)),
        "DOUBLE" => get::<f64>(row, index).map(Value::Float),
        "DECIMAL" => get::<Decimal>(row, index).map(|v| Value::String(v.to_string())),
        "DATETIME" => get::<NaiveDateTime>(row, index).map(|v| Value::String(v.to_string())),
        "TIMESTAMP" => get::<DateTime<Utc>>(row, index).map(|v| Value::String(v.to_rfc3339())),
        "DATE" => get::<NaiveDate>(row, index).map(|v| Value::String(v.to_string())),
        "TIME" => get::<NaiveTime>(row, index).map(|v| Value::String(v.to_string())),
        "JSON" => get::<serde_json::Value>(row, index).map(|v| Value::String(v.to_string())),
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
            get::<Vec<u8>>(row, index).map(Value::Bytes)
        }
        _ => None,
    };

    value
        .or_else(|| text_at(row, index).map(Value::String))
        .unwrap_or(Value::Null)
}

/// Formats a MySQL error as `ERROR <code>: <message>`.
fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => match db_error.code() {
            Some(code) => format!("ERROR {code}: {}", db_error.message()),
            None => format!("ERROR: {}", db_error.message()),
        },
        None => error.to_string(),
    }
}
