//! SQL parsing and classification logic.
//!
//! Uses sqlparser-rs with the target engine's dialect to parse SQL and
//! classify statements by their safety level.

use sqlparser::ast::{Query, Select, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;

use crate::db::DatabaseKind;
use crate::error::{AskSqlError, Result};

use super::{ClassificationResult, SafetyLevel, StatementType};

/// SQL classifier that parses and classifies SQL queries.
#[derive(Debug, Clone, Copy)]
pub struct SqlClassifier {
    kind: DatabaseKind,
}

impl SqlClassifier {
    /// Creates a classifier for the given engine's dialect.
    pub fn new(kind: DatabaseKind) -> Self {
        Self { kind }
    }

    fn dialect(&self) -> Box<dyn Dialect> {
        match self.kind {
            DatabaseKind::Postgres => Box::new(PostgreSqlDialect {}),
            DatabaseKind::MySql => Box::new(MySqlDialect {}),
        }
    }

    /// Classifies a SQL string, returning the parse error if it has one.
    ///
    /// An empty statement list classifies as destructive.
    pub fn classify(&self, sql: &str) -> Result<ClassificationResult> {
        let dialect = self.dialect();
        let statements = Parser::parse_sql(dialect.as_ref(), sql)
            .map_err(|e| AskSqlError::query(format!("SQL parse error: {e}")))?;

        match statements.as_slice() {
            [] => Ok(ClassificationResult::new(
                SafetyLevel::Destructive,
                StatementType::Unknown,
            )),
            [statement] => {
                let (level, stmt_type) = classify_statement(statement);
                Ok(ClassificationResult::new(level, stmt_type))
            }
            statements => {
                // Multiple statements: use the most dangerous classification
                let (level, stmt_type) = statements
                    .iter()
                    .map(classify_statement)
                    .fold((SafetyLevel::Safe, StatementType::Unknown), most_dangerous);
                Ok(ClassificationResult::new(
                    level,
                    StatementType::Multiple(Box::new(stmt_type)),
                ))
            }
        }
    }
}

/// Returns a priority value for safety levels (higher = more dangerous).
fn level_priority(level: &SafetyLevel) -> u8 {
    match level {
        SafetyLevel::Safe => 0,
        SafetyLevel::Mutating => 1,
        SafetyLevel::Destructive => 2,
    }
}

fn most_dangerous(
    current: (SafetyLevel, StatementType),
    candidate: (SafetyLevel, StatementType),
) -> (SafetyLevel, StatementType) {
    if level_priority(&candidate.0) > level_priority(&current.0) {
        candidate
    } else {
        current
    }
}

/// Classifies a single parsed statement.
fn classify_statement(statement: &Statement) -> (SafetyLevel, StatementType) {
    match statement {
        // Query: may contain data-modifying CTEs or SELECT INTO, so recurse
        Statement::Query(query) => classify_query(query),
        Statement::Explain {
            analyze, statement, ..
        } => {
            if *analyze {
                // EXPLAIN ANALYZE executes the statement
                let (inner_level, _) = classify_statement(statement);
                (inner_level, StatementType::Explain)
            } else {
                (SafetyLevel::Safe, StatementType::Explain)
            }
        }
        Statement::ShowVariable { .. }
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowCreate { .. } => (SafetyLevel::Safe, StatementType::Show),

        Statement::Insert { .. } => (SafetyLevel::Mutating, StatementType::Insert),
        Statement::Update { .. } => (SafetyLevel::Mutating, StatementType::Update),
        Statement::Merge { .. } => (SafetyLevel::Mutating, StatementType::Merge),

        Statement::Delete { .. } => (SafetyLevel::Destructive, StatementType::Delete),
        Statement::Drop { .. } => (SafetyLevel::Destructive, StatementType::Drop),
        Statement::Truncate { .. } => (SafetyLevel::Destructive, StatementType::Truncate),
        Statement::AlterTable { .. } | Statement::AlterView { .. } => {
            (SafetyLevel::Destructive, StatementType::Alter)
        }
        Statement::CreateTable { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateView { .. } => (SafetyLevel::Destructive, StatementType::Create),
        Statement::Grant { .. } => (SafetyLevel::Destructive, StatementType::Grant),
        Statement::Revoke { .. } => (SafetyLevel::Destructive, StatementType::Revoke),

        // Anything else is treated as destructive
        _ => (SafetyLevel::Destructive, StatementType::Unknown),
    }
}

/// Classifies a Query by recursively inspecting for data-modifying operations.
fn classify_query(query: &Query) -> (SafetyLevel, StatementType) {
    let ctes = query
        .with
        .iter()
        .flat_map(|with| with.cte_tables.iter())
        .map(|cte| classify_query(&cte.query));

    ctes.chain(std::iter::once(classify_set_expr(&query.body)))
        .fold((SafetyLevel::Safe, StatementType::Select), most_dangerous)
}

/// Classifies a SetExpr, detecting mutations and recursing into nested queries.
fn classify_set_expr(set_expr: &SetExpr) -> (SafetyLevel, StatementType) {
    match set_expr {
        SetExpr::Insert(stmt) | SetExpr::Update(stmt) => classify_statement(stmt),
        SetExpr::Query(query) => classify_query(query),
        SetExpr::Select(select) => classify_select(select),
        SetExpr::SetOperation { left, right, .. } => {
            most_dangerous(classify_set_expr(left), classify_set_expr(right))
        }
        _ => (SafetyLevel::Safe, StatementType::Select),
    }
}

/// Classifies a Select: `SELECT ... INTO` writes a table, and FROM may hold
/// derived tables.
fn classify_select(select: &Select) -> (SafetyLevel, StatementType) {
    let base = if select.into.is_some() {
        (SafetyLevel::Mutating, StatementType::SelectInto)
    } else {
        (SafetyLevel::Safe, StatementType::Select)
    };

    select
        .from
        .iter()
        .map(classify_table_with_joins)
        .fold(base, most_dangerous)
}

fn classify_table_with_joins(twj: &TableWithJoins) -> (SafetyLevel, StatementType) {
    std::iter::once(&twj.relation)
        .chain(twj.joins.iter().map(|join| &join.relation))
        .map(classify_table_factor)
        .fold((SafetyLevel::Safe, StatementType::Select), most_dangerous)
}

/// Classifies a TableFactor, recursing into derived tables (subqueries).
fn classify_table_factor(factor: &TableFactor) -> (SafetyLevel, StatementType) {
    match factor {
        TableFactor::Derived { subquery, .. } => classify_query(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => classify_table_with_joins(table_with_joins),
        _ => (SafetyLevel::Safe, StatementType::Select),
    }
}
