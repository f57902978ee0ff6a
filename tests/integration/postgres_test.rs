//! PostgreSQL integration tests.
//!
//! Live tests need DATABASE_URL and skip without it. They create their own
//! tables in the `asksql_it` schema.

use asksql::config::{ConnectionConfig, ConnectionProfile};
use asksql::db::{
    Connector, DatabaseClient, DatabaseKind, PostgresClient, SchemaSnapshot, SqlxConnector, Value,
    MAX_ROWS,
};
use asksql::error::AskSqlError;
use asksql::introspect::{SchemaIntrospector, DEFAULT_SCHEMA_TTL};
use asksql::query::{ExecutionResult, QueryExecutor};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tokio::sync::OnceCell;

const TEST_SCHEMA: &str = "asksql_it";

const SETUP: &[&str] = &[
    "CREATE SCHEMA IF NOT EXISTS asksql_it",
    "CREATE TABLE IF NOT EXISTS asksql_it.customers (
        id integer PRIMARY KEY,
        name text,
        email text NOT NULL,
        signup_date date,
        balance numeric(10, 2)
    )",
    "CREATE TABLE IF NOT EXISTS asksql_it.orders (
        id integer PRIMARY KEY,
        customer_id integer NOT NULL,
        total numeric(10, 2)
    )",
    "CREATE OR REPLACE VIEW asksql_it.big_spenders AS
        SELECT customer_id FROM asksql_it.orders WHERE total > 100",
    "INSERT INTO asksql_it.customers VALUES
        (1, 'Ada', 'ada@example.com', '2024-01-15', 12.50),
        (2, NULL, 'carol@example.com', NULL, NULL)
        ON CONFLICT (id) DO NOTHING",
    "INSERT INTO asksql_it.orders VALUES (10, 1, 150.00), (11, 1, 20.00)
        ON CONFLICT (id) DO NOTHING",
];

static READY: OnceCell<bool> = OnceCell::const_new();

/// Returns a config for the test database, creating fixtures on first use.
async fn test_config() -> Option<ConnectionConfig> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let ready = READY
        .get_or_init(|| async {
            let Ok(pool) = sqlx::PgPool::connect(&url).await else {
                return false;
            };
            for statement in SETUP {
                if let Err(e) = sqlx::raw_sql(statement).execute(&pool).await {
                    eprintln!("Fixture setup failed: {e}");
                    return false;
                }
            }
            pool.close().await;
            true
        })
        .await;
    if !*ready {
        return None;
    }

    let config = ConnectionProfile::from_connection_string(&url)
        .ok()?
        .validate()
        .ok()?;
    Some(config.with_schema(TEST_SCHEMA))
}

async fn test_client() -> Option<PostgresClient> {
    PostgresClient::connect(&test_config().await?).await.ok()
}

fn unreachable() -> ConnectionConfig {
    ConnectionConfig::new(DatabaseKind::Postgres, "127.0.0.1", "nobody", "nowhere").with_port(59999)
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_refused_is_connection_error() {
    let result = PostgresClient::connect(&unreachable()).await;
    assert!(matches!(result, Err(AskSqlError::Connection(_))));
}

#[tokio::test(flavor = "current_thread")]
async fn test_introspect_unreachable_returns_sentinel() {
    let introspector = SchemaIntrospector::new(Arc::new(SqlxConnector), DEFAULT_SCHEMA_TTL);
    let snapshot = introspector.introspect(&unreachable()).await;
    assert!(!snapshot.is_available());
    assert!(snapshot.error().is_some());
}

#[tokio::test]
async fn test_introspect_base_tables_in_schema() {
    let Some(client) = test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let schema = client.introspect_schema().await.unwrap();

    let names: Vec<&str> = schema.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["customers", "orders"]);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_introspect_columns_in_ordinal_order() {
    let Some(client) = test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let schema = client.introspect_schema().await.unwrap();
    let customers = schema.table("customers").expect("customers table");

    assert_eq!(
        customers.columns,
        vec!["id", "name", "email", "signup_date", "balance"]
    );

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_execute_select_values() {
    let Some(client) = test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = client
        .execute_query(
            "SELECT id, name, signup_date, balance FROM asksql_it.customers ORDER BY id LIMIT 100",
        )
        .await
        .unwrap();

    assert_eq!(result.column_names(), vec!["id", "name", "signup_date", "balance"]);
    assert_eq!(result.row_count, 2);
    assert_eq!(result.rows[0][0], Value::Int(1));
    assert_eq!(result.rows[0][1], Value::String("Ada".to_string()));
    assert_eq!(result.rows[0][2], Value::String("2024-01-15".to_string()));
    assert_eq!(result.rows[0][3], Value::String("12.50".to_string()));
    assert!(result.rows[1][1].is_null());
    assert!(!result.was_truncated);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_empty_result_keeps_columns() {
    let Some(client) = test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = client
        .execute_query("SELECT id, email FROM asksql_it.customers WHERE 1 = 0")
        .await
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(result.column_names(), vec!["id", "email"]);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_nonexistent_table_is_query_error() {
    let Some(client) = test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = client
        .execute_query("SELECT * FROM nonexistent_table_xyz_123")
        .await;

    match result {
        Err(AskSqlError::Query(msg)) => assert!(msg.contains("does not exist"), "{msg}"),
        other => panic!("Expected query error, got {other:?}"),
    }

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_row_cap_truncates() {
    let Some(client) = test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = client
        .execute_query("SELECT generate_series(1, 1500) AS n")
        .await
        .unwrap();

    assert_eq!(result.row_count, MAX_ROWS);
    assert_eq!(result.total_rows, Some(1500));
    assert!(result.was_truncated);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_executor_renames_joined_ids() {
    let Some(config) = test_config().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let executor = QueryExecutor::new(Arc::new(SqlxConnector));

    let outcome = executor
        .execute(
            &config,
            "SELECT c.id, o.id FROM asksql_it.customers c JOIN asksql_it.orders o ON o.customer_id = c.id ORDER BY o.id LIMIT 100",
        )
        .await;

    let result = outcome.result();
    assert!(outcome.is_success());
    assert_eq!(result.column_names(), vec!["id", "id_1"]);
    assert_eq!(result.rows[0], vec![Value::Int(1), Value::Int(10)]);
}

#[tokio::test]
async fn test_executor_blocks_drop() {
    let Some(config) = test_config().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let executor = QueryExecutor::new(Arc::new(SqlxConnector));

    let outcome = executor.execute(&config, "DROP TABLE asksql_it.orders").await;
    assert!(matches!(outcome, ExecutionResult::Blocked { .. }));

    // The table is still there.
    let client = SqlxConnector.connect(&config).await.unwrap();
    let schema = client.introspect_schema().await.unwrap();
    assert!(schema.table("orders").is_some());
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_introspector_caches_snapshot() {
    let Some(config) = test_config().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let introspector = SchemaIntrospector::new(Arc::new(SqlxConnector), DEFAULT_SCHEMA_TTL);

    let first = introspector.introspect(&config).await;
    let second = introspector.introspect(&config).await;

    match (first, second) {
        (SchemaSnapshot::Ready(a), SchemaSnapshot::Ready(b)) => assert!(Arc::ptr_eq(&a, &b)),
        other => panic!("Expected two ready snapshots, got {other:?}"),
    }
}
