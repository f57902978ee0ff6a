//! Database abstraction layer for AskSQL.
//!
//! Provides a trait-based interface for database operations so the Postgres
//! and MySQL clients (and the test mocks) can be used interchangeably. Each
//! client owns exactly one connection for the duration of one operation.

mod mock;
mod mysql;
mod postgres;
mod schema;
mod types;

pub use mock::{FailingDatabaseClient, MockConnector, MockDatabaseClient};
pub use mysql::MySqlClient;
pub use postgres::PostgresClient;
pub use schema::{Schema, SchemaSnapshot, Table};
pub use types::{dedupe_column_names, ColumnInfo, QueryResult, Row, Value};

use crate::config::{ConnectionConfig, DEFAULT_PG_SCHEMA};
use crate::error::{AskSqlError, Result};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// Maximum rows any client materialises from a single query.
pub const MAX_ROWS: usize = 1000;

/// Supported database engines.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    #[default]
    #[serde(alias = "postgresql")]
    Postgres,
    MySql,
}

impl DatabaseKind {
    /// Returns the kind as a string for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
        }
    }

    /// Parses a kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            "mysql" => Some(Self::MySql),
            _ => None,
        }
    }

    /// Maps a connection-string scheme to a kind.
    pub fn from_url_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" => Some(Self::MySql),
            _ => None,
        }
    }

    /// Returns the default port for this engine.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Postgres => 5432,
            Self::MySql => 3306,
        }
    }

    /// Returns the default schema, if the engine has schemas.
    pub fn default_schema(&self) -> Option<&'static str> {
        match self {
            Self::Postgres => Some(DEFAULT_PG_SCHEMA),
            Self::MySql => None,
        }
    }

    /// Row ceiling written into generated queries.
    pub fn row_limit(&self) -> usize {
        match self {
            Self::Postgres => 100,
            Self::MySql => 1000,
        }
    }

    /// Human-readable dialect name used in prompts.
    pub fn dialect_name(&self) -> &'static str {
        match self {
            Self::Postgres => "PostgreSQL",
            Self::MySql => "MySQL 5.7",
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseKind {
    type Err = AskSqlError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| {
            AskSqlError::config(format!(
                "Unknown database kind '{s}'. Expected 'postgres' or 'mysql'"
            ))
        })
    }
}

/// Trait defining the interface for database clients.
///
/// All database operations are async and return Results with AskSqlError.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Lists base tables and their columns in ordinal order.
    async fn introspect_schema(&self) -> Result<Schema>;

    /// Executes a SQL query and returns the results.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}

/// Opens database clients. The seam that lets tests swap in mocks.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a client for the given configuration.
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>>;
}

/// Connector backed by the real sqlx drivers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxConnector;

#[async_trait]
impl Connector for SqlxConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
        connect(config).await
    }
}

/// Creates a database client for the configured engine.
///
/// This is the central factory function for database connections.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
    match config.kind {
        DatabaseKind::Postgres => {
            let client = PostgresClient::connect(config).await?;
            Ok(Box::new(client))
        }
        DatabaseKind::MySql => {
            let client = MySqlClient::connect(config).await?;
            Ok(Box::new(client))
        }
    }
}

/// Maps sqlx connection errors to user-friendly messages.
pub(crate) fn map_connection_error(error: &sqlx::Error, config: &ConnectionConfig) -> AskSqlError {
    let host = &config.host;
    let port = config.port;
    let user = &config.user;
    let database = &config.database;

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        AskSqlError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
        || error_str.contains("access denied")
    {
        AskSqlError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if (error_str.contains("does not exist") && error_str.contains("database"))
        || error_str.contains("unknown database")
    {
        AskSqlError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        AskSqlError::connection(format!("TLS negotiation with {host}:{port} failed: {error}"))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        AskSqlError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else if error_str.contains("failed to lookup address")
        || error_str.contains("name or service not known")
    {
        AskSqlError::connection(format!("Cannot resolve host '{host}'."))
    } else {
        AskSqlError::connection(error.to_string())
    }
}
