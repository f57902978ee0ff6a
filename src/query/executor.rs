//! Guarded query execution.
//!
//! Every statement passes the read-only guard before a connection is opened.
//! Each execution opens its own connection and closes it before returning.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::db::{Connector, QueryResult};
use crate::error::{AskSqlError, Result};
use crate::safety::check_read_only;

/// Runs generated SQL against a database.
pub struct QueryExecutor {
    connector: Arc<dyn Connector>,
}

impl QueryExecutor {
    /// Creates an executor that opens connections through `connector`.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// Executes `sql` against `config`.
    ///
    /// Never fails: blocked statements and execution failures are returned
    /// as distinct variants of [`ExecutionResult`].
    pub async fn execute(&self, config: &ConnectionConfig, sql: &str) -> ExecutionResult {
        let statement = match check_read_only(sql, config.kind) {
            Ok(statement) => statement,
            Err(e) => {
                warn!("Refusing to execute statement: {}", e.message());
                return ExecutionResult::Blocked {
                    sql: sql.to_string(),
                    reason: e.message().to_string(),
                };
            }
        };

        let start = Instant::now();
        match self.run(config, statement).await {
            Ok(mut result) => {
                if result.dedupe_columns() {
                    warn!(
                        "Renamed duplicate result columns: {}",
                        result.column_names().join(", ")
                    );
                }
                info!(
                    rows = result.row_count,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Query executed"
                );
                ExecutionResult::Success(result)
            }
            Err(e) => {
                warn!("Query execution failed: {e}");
                ExecutionResult::Failed(e)
            }
        }
    }

    async fn run(&self, config: &ConnectionConfig, sql: &str) -> Result<QueryResult> {
        let client = self.connector.connect(config).await?;
        debug!("Executing on {}", config.display_string());

        let result = client.execute_query(sql).await;

        if let Err(e) = client.close().await {
            warn!("Failed to close query connection: {e}");
        }

        result
    }
}

/// Outcome of executing one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    /// Query ran; column labels are unique.
    Success(QueryResult),
    /// The guard refused the statement; nothing was sent to the server.
    Blocked {
        /// The statement as received.
        sql: String,
        /// Why it was refused.
        reason: String,
    },
    /// Connecting or running the query failed.
    Failed(AskSqlError),
}

impl ExecutionResult {
    /// Returns true if the query ran.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The result set; empty unless the query ran.
    pub fn result(&self) -> QueryResult {
        match self {
            Self::Success(result) => result.clone(),
            _ => QueryResult::new(),
        }
    }

    /// The error to show the user, if any.
    pub fn error(&self) -> Option<AskSqlError> {
        match self {
            Self::Success(_) => None,
            Self::Blocked { reason, .. } => Some(AskSqlError::blocked(reason.clone())),
            Self::Failed(e) => Some(e.clone()),
        }
    }
}
