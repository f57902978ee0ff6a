//! Mock database clients for testing.
//!
//! Provides in-memory clients and a [`MockConnector`] that counts connects
//! and closes, so tests can check that every connection is released.

use super::{ColumnInfo, Connector, DatabaseClient, QueryResult, Schema, Value};
use crate::config::ConnectionConfig;
use crate::error::{AskSqlError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Counters shared between a connector and the clients it hands out.
#[derive(Debug, Clone, Default)]
struct Tracker {
    connects: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    executed: Arc<Mutex<Vec<String>>>,
}

impl Tracker {
    fn record_query(&self, sql: &str) {
        self.executed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(sql.to_string());
    }
}

/// A mock database client that returns predefined results.
#[derive(Debug, Clone, Default)]
pub struct MockDatabaseClient {
    schema: Schema,
    result: Option<QueryResult>,
    tracker: Tracker,
}

impl MockDatabaseClient {
    /// Creates a new mock database client with an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new mock database client with the given schema.
    pub fn with_schema(schema: Schema) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    /// Returns `result` for every query instead of the echo row.
    pub fn with_result(mut self, result: QueryResult) -> Self {
        self.result = Some(result);
        self
    }

    fn echo_result(sql: &str) -> QueryResult {
        QueryResult::with_data(
            vec![ColumnInfo::new("result", "text")],
            vec![vec![Value::String(format!("Mock result for: {sql}"))]],
        )
        .with_execution_time(Duration::from_millis(1))
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn introspect_schema(&self) -> Result<Schema> {
        Ok(self.schema.clone())
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        self.tracker.record_query(sql);
        Ok(self
            .result
            .clone()
            .unwrap_or_else(|| Self::echo_result(sql)))
    }

    async fn close(&self) -> Result<()> {
        self.tracker.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A client whose every operation fails with the same error.
#[derive(Debug, Clone)]
pub struct FailingDatabaseClient {
    error: AskSqlError,
    tracker: Tracker,
}

impl FailingDatabaseClient {
    /// Creates a client failing with `error`.
    pub fn new(error: AskSqlError) -> Self {
        Self {
            error,
            tracker: Tracker::default(),
        }
    }
}

#[async_trait]
impl DatabaseClient for FailingDatabaseClient {
    async fn introspect_schema(&self) -> Result<Schema> {
        Err(self.error.clone())
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        self.tracker.record_query(sql);
        Err(self.error.clone())
    }

    async fn close(&self) -> Result<()> {
        self.tracker.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Mode {
    Serve(MockDatabaseClient),
    Fail(AskSqlError),
    Refuse(AskSqlError),
}

/// A connector handing out mock clients.
#[derive(Debug, Clone)]
pub struct MockConnector {
    mode: Mode,
    tracker: Tracker,
}

impl MockConnector {
    /// Serves clients backed by `client`'s schema and result.
    pub fn new(client: MockDatabaseClient) -> Self {
        Self {
            mode: Mode::Serve(client),
            tracker: Tracker::default(),
        }
    }

    /// Connects successfully, but every operation fails with `error`.
    pub fn failing(error: AskSqlError) -> Self {
        Self {
            mode: Mode::Fail(error),
            tracker: Tracker::default(),
        }
    }

    /// Refuses every connection attempt.
    pub fn refusing(msg: impl Into<String>) -> Self {
        Self {
            mode: Mode::Refuse(AskSqlError::connection(msg)),
            tracker: Tracker::default(),
        }
    }

    /// Number of connection attempts so far.
    pub fn connect_count(&self) -> usize {
        self.tracker.connects.load(Ordering::SeqCst)
    }

    /// Number of clients closed so far.
    pub fn close_count(&self) -> usize {
        self.tracker.closes.load(Ordering::SeqCst)
    }

    /// SQL strings sent to clients, in order.
    pub fn executed(&self) -> Vec<String> {
        self.tracker
            .executed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
        self.tracker.connects.fetch_add(1, Ordering::SeqCst);

        match &self.mode {
            Mode::Serve(client) => {
                let mut client = client.clone();
                client.tracker = self.tracker.clone();
                Ok(Box::new(client))
            }
            Mode::Fail(error) => Ok(Box::new(FailingDatabaseClient {
                error: error.clone(),
                tracker: self.tracker.clone(),
            })),
            Mode::Refuse(error) => Err(error.clone()),
        }
    }
}
