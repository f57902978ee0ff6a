//! End-to-end pipeline tests against mock collaborators.

use asksql::config::ConnectionConfig;
use asksql::db::{
    ColumnInfo, DatabaseKind, MockConnector, MockDatabaseClient, QueryResult, Schema, Table, Value,
};
use asksql::error::AskSqlError;
use asksql::introspect::DEFAULT_SCHEMA_TTL;
use asksql::llm::{MockLlmClient, QueryOrigin};
use asksql::query::ExecutionResult;
use asksql::session::{Pipeline, Session};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn shop_schema() -> Schema {
    Schema::new()
        .with_table(Table::new("customers", ["id", "name", "email"]))
        .with_table(Table::new("orders", ["id", "customer_id", "total"]))
}

fn postgres() -> ConnectionConfig {
    ConnectionConfig::new(DatabaseKind::Postgres, "localhost", "reader", "shop")
}

fn mysql() -> ConnectionConfig {
    ConnectionConfig::new(DatabaseKind::MySql, "localhost", "reader", "retail")
}

#[tokio::test]
async fn test_show_all_customers_on_postgres() {
    let connector = Arc::new(MockConnector::new(MockDatabaseClient::with_schema(
        shop_schema(),
    )));
    let pipeline = Pipeline::new(
        connector.clone(),
        Arc::new(MockLlmClient::new()),
        DEFAULT_SCHEMA_TTL,
    );
    let mut session = Session::new(postgres());

    let outcome = pipeline.ask(&mut session, "show all customers").await;

    assert_eq!(outcome.query.origin, QueryOrigin::Model);
    assert_eq!(
        outcome.query.sql,
        "SELECT id, name, email FROM customers LIMIT 100"
    );
    assert!(outcome.execution.is_success());
    assert_eq!(
        connector.executed(),
        vec!["SELECT id, name, email FROM customers LIMIT 100"]
    );
}

#[tokio::test]
async fn test_mysql_gets_larger_limit() {
    let pipeline = Pipeline::new(
        Arc::new(MockConnector::new(MockDatabaseClient::with_schema(
            shop_schema(),
        ))),
        Arc::new(MockLlmClient::new()),
        DEFAULT_SCHEMA_TTL,
    );
    let session = Session::new(mysql());

    let query = pipeline.generate(&session, "count the orders").await;

    assert_eq!(
        query.sql,
        "SELECT COUNT(*) AS order_count FROM orders LIMIT 1000"
    );
}

#[tokio::test]
async fn test_refused_connection_short_circuits_generation() {
    let llm = MockLlmClient::new();
    let connector = Arc::new(MockConnector::refusing(
        "Cannot connect to localhost:5432. Check that the server is running.",
    ));
    let pipeline = Pipeline::new(connector, Arc::new(llm.clone()), DEFAULT_SCHEMA_TTL);
    let mut session = Session::new(postgres());

    let outcome = pipeline.ask(&mut session, "show all customers").await;

    assert_eq!(
        outcome.query.sql,
        "SELECT 'Schema unavailable' AS error_message LIMIT 100"
    );
    assert!(outcome.query.is_placeholder());
    assert_eq!(llm.call_count(), 0);
    assert!(matches!(
        outcome.execution,
        ExecutionResult::Failed(AskSqlError::Connection(_))
    ));
    assert!(outcome.execution.result().is_empty());
}

#[tokio::test]
async fn test_generated_delete_becomes_placeholder() {
    let connector = Arc::new(MockConnector::new(MockDatabaseClient::with_schema(
        shop_schema(),
    )));
    let pipeline = Pipeline::new(
        connector.clone(),
        Arc::new(MockLlmClient::new()),
        DEFAULT_SCHEMA_TTL,
    );
    let mut session = Session::new(postgres());

    let outcome = pipeline.ask(&mut session, "delete customer 1").await;

    assert!(outcome.query.is_placeholder());
    assert_eq!(
        outcome.query.sql,
        "SELECT 'Error: no SELECT statement in model response: DELETE FROM customers WHERE id = 1' AS error_message LIMIT 100"
    );
    assert!(outcome.execution.is_success());
    assert!(!connector
        .executed()
        .iter()
        .any(|sql| sql.starts_with("DELETE")));
}

#[tokio::test]
async fn test_generated_outfile_is_blocked() {
    let connector = Arc::new(MockConnector::new(MockDatabaseClient::with_schema(
        shop_schema(),
    )));
    let llm = MockLlmClient::new().with_response(
        "export",
        "```sql\nSELECT * FROM customers INTO OUTFILE '/tmp/customers.csv'\n```",
    );
    let pipeline = Pipeline::new(connector.clone(), Arc::new(llm), DEFAULT_SCHEMA_TTL);
    let mut session = Session::new(mysql());

    let outcome = pipeline.ask(&mut session, "export the customers").await;

    assert!(matches!(outcome.execution, ExecutionResult::Blocked { .. }));
    assert!(matches!(
        outcome.execution.error(),
        Some(AskSqlError::Blocked(_))
    ));
    assert!(connector.executed().is_empty());
}

#[tokio::test]
async fn test_parenthesized_union_reaches_server_intact() {
    let union = "(SELECT id, total FROM orders ORDER BY total DESC LIMIT 1) UNION ALL \
                 (SELECT id, total FROM orders ORDER BY total ASC LIMIT 1) ORDER BY total";
    let connector = Arc::new(MockConnector::new(MockDatabaseClient::with_schema(
        shop_schema(),
    )));
    let llm = MockLlmClient::new().with_response("highest and lowest", format!("```sql\n{union};\n```"));
    let pipeline = Pipeline::new(connector.clone(), Arc::new(llm), DEFAULT_SCHEMA_TTL);
    let mut session = Session::new(mysql());

    let outcome = pipeline
        .ask(&mut session, "highest and lowest order totals")
        .await;

    assert_eq!(outcome.query.origin, QueryOrigin::Model);
    assert_eq!(outcome.query.sql, union);
    assert!(outcome.execution.is_success());
    assert_eq!(connector.executed(), vec![union]);
}

#[tokio::test]
async fn test_schema_is_cached_across_questions() {
    let connector = Arc::new(MockConnector::new(MockDatabaseClient::with_schema(
        shop_schema(),
    )));
    let pipeline = Pipeline::new(
        connector.clone(),
        Arc::new(MockLlmClient::new()),
        DEFAULT_SCHEMA_TTL,
    );
    let mut session = Session::new(postgres());

    pipeline.ask(&mut session, "show all customers").await;
    pipeline.ask(&mut session, "count the orders").await;

    // One introspection plus one connection per query.
    assert_eq!(connector.connect_count(), 3);
    assert_eq!(connector.close_count(), 3);

    pipeline.refresh_schema(&session);
    pipeline.generate(&session, "show all customers").await;
    assert_eq!(connector.connect_count(), 4);
}

#[tokio::test]
async fn test_llm_failure_surfaces_as_result_row() {
    let pipeline = Pipeline::new(
        Arc::new(MockConnector::new(MockDatabaseClient::with_schema(
            shop_schema(),
        ))),
        Arc::new(MockLlmClient::failing(AskSqlError::llm(
            "Invalid API key. Check your OpenAI API key configuration.",
        ))),
        DEFAULT_SCHEMA_TTL,
    );
    let mut session = Session::new(postgres());

    let outcome = pipeline.ask(&mut session, "show all customers").await;

    assert_eq!(
        outcome.query.sql,
        "SELECT 'Error: Invalid API key. Check your OpenAI API key configuration.' AS error_message LIMIT 100"
    );
    assert!(outcome.execution.is_success());
}

#[tokio::test]
async fn test_duplicate_columns_from_join_are_renamed() {
    let joined = QueryResult::with_data(
        vec![
            ColumnInfo::new("id", "int4"),
            ColumnInfo::new("name", "text"),
            ColumnInfo::new("id", "int4"),
        ],
        vec![vec![
            Value::Int(10),
            Value::String("Ada".to_string()),
            Value::Int(1),
        ]],
    );
    let pipeline = Pipeline::new(
        Arc::new(MockConnector::new(
            MockDatabaseClient::with_schema(shop_schema()).with_result(joined),
        )),
        Arc::new(MockLlmClient::new()),
        DEFAULT_SCHEMA_TTL,
    );
    let mut session = Session::new(postgres());

    let outcome = pipeline
        .ask(&mut session, "orders with their customer")
        .await;

    assert_eq!(
        outcome.execution.result().column_names(),
        vec!["id", "name", "id_1"]
    );
}

#[tokio::test]
async fn test_prompt_notes_do_not_change_sql_contract() {
    let pipeline = Pipeline::new(
        Arc::new(MockConnector::new(MockDatabaseClient::with_schema(
            shop_schema(),
        ))),
        Arc::new(MockLlmClient::new()),
        DEFAULT_SCHEMA_TTL,
    )
    .with_notes(vec![
        "Table 'region' does not exist; region is a column of store.".to_string(),
    ]);
    let session = Session::new(postgres());

    let query = pipeline.generate(&session, "show all customers").await;

    assert!(!query.sql.ends_with(';'));
    assert!(query.sql.to_uppercase().contains("LIMIT"));
}
