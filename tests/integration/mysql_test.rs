//! MySQL integration tests.
//!
//! Live tests need MYSQL_URL and skip without it. Fixture tables are
//! prefixed with `asksql_it_`.

use asksql::config::{ConnectionConfig, ConnectionProfile};
use asksql::db::{DatabaseClient, DatabaseKind, MySqlClient, SqlxConnector, Value};
use asksql::error::AskSqlError;
use asksql::query::{ExecutionResult, QueryExecutor};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tokio::sync::OnceCell;

const SETUP: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS asksql_it_customers (
        id INT PRIMARY KEY,
        name VARCHAR(100),
        email VARCHAR(255) NOT NULL,
        balance DECIMAL(10, 2)
    )",
    "CREATE TABLE IF NOT EXISTS asksql_it_orders (
        id INT PRIMARY KEY,
        customer_id INT NOT NULL,
        total DECIMAL(10, 2)
    )",
    "INSERT IGNORE INTO asksql_it_customers VALUES
        (1, 'Ada', 'ada@example.com', 12.50),
        (2, NULL, 'carol@example.com', NULL)",
    "INSERT IGNORE INTO asksql_it_orders VALUES (10, 1, 150.00), (11, 1, 20.00)",
];

static READY: OnceCell<bool> = OnceCell::const_new();

async fn test_config() -> Option<ConnectionConfig> {
    let url = std::env::var("MYSQL_URL").ok()?;
    let ready = READY
        .get_or_init(|| async {
            let Ok(pool) = sqlx::MySqlPool::connect(&url).await else {
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

    ConnectionProfile::from_connection_string(&url)
        .ok()?
        .validate()
        .ok()
}

async fn test_client() -> Option<MySqlClient> {
    MySqlClient::connect(&test_config().await?).await.ok()
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_refused_is_connection_error() {
    let config = ConnectionConfig::new(DatabaseKind::MySql, "127.0.0.1", "nobody", "nowhere")
        .with_port(59998);

    let result = MySqlClient::connect(&config).await;
    assert!(matches!(result, Err(AskSqlError::Connection(_))));
}

#[tokio::test]
async fn test_introspect_describe_order() {
    let Some(client) = test_client().await else {
        eprintln!("Skipping test: MYSQL_URL not set");
        return;
    };

    let schema = client.introspect_schema().await.unwrap();

    let customers = schema
        .table("asksql_it_customers")
        .expect("customers table");
    assert_eq!(customers.columns, vec!["id", "name", "email", "balance"]);
    assert!(schema.table("asksql_it_orders").is_some());

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_execute_select_values() {
    let Some(client) = test_client().await else {
        eprintln!("Skipping test: MYSQL_URL not set");
        return;
    };

    let result = client
        .execute_query("SELECT id, name, balance FROM asksql_it_customers ORDER BY id LIMIT 1000")
        .await
        .unwrap();

    assert_eq!(result.column_names(), vec!["id", "name", "balance"]);
    assert_eq!(result.row_count, 2);
    assert_eq!(result.rows[0][0], Value::Int(1));
    assert_eq!(result.rows[0][1], Value::String("Ada".to_string()));
    assert_eq!(result.rows[0][2], Value::String("12.50".to_string()));
    assert!(result.rows[1][1].is_null());

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_empty_result_keeps_columns() {
    let Some(client) = test_client().await else {
        eprintln!("Skipping test: MYSQL_URL not set");
        return;
    };

    let result = client
        .execute_query("SELECT id, email FROM asksql_it_customers WHERE 1 = 0")
        .await
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(result.column_names(), vec!["id", "email"]);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_query_error_carries_server_code() {
    let Some(client) = test_client().await else {
        eprintln!("Skipping test: MYSQL_URL not set");
        return;
    };

    let result = client
        .execute_query("SELECT * FROM nonexistent_table_xyz_123")
        .await;

    match result {
        Err(AskSqlError::Query(msg)) => assert!(msg.starts_with("ERROR "), "{msg}"),
        other => panic!("Expected query error, got {other:?}"),
    }

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_executor_renames_joined_ids() {
    let Some(config) = test_config().await else {
        eprintln!("Skipping test: MYSQL_URL not set");
        return;
    };
    let executor = QueryExecutor::new(Arc::new(SqlxConnector));

    let outcome = executor
        .execute(
            &config,
            "SELECT c.id, o.id FROM asksql_it_customers c JOIN asksql_it_orders o ON o.customer_id = c.id ORDER BY o.id LIMIT 1000",
        )
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.result().column_names(), vec!["id", "id_1"]);
}

#[tokio::test]
async fn test_executor_blocks_into_outfile() {
    let Some(config) = test_config().await else {
        eprintln!("Skipping test: MYSQL_URL not set");
        return;
    };
    let executor = QueryExecutor::new(Arc::new(SqlxConnector));

    let outcome = executor
        .execute(
            &config,
            "SELECT * FROM asksql_it_customers INTO OUTFILE '/tmp/asksql_it.csv'",
        )
        .await;

    assert!(matches!(outcome, ExecutionResult::Blocked { .. }));
}
