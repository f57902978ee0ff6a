//! SQL generation: one completion per question, then normalization.
//!
//! [`SqlGenerator::generate`] never fails. When no SQL can be produced it
//! returns a placeholder SELECT that carries the error text as a literal
//! `error_message` column.

use regex::Regex;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::db::DatabaseKind;
use crate::llm::parser::extract_sql;
use crate::llm::prompt::Prompt;
use crate::llm::LlmClient;

/// Message carried by the placeholder when introspection failed.
pub const SCHEMA_UNAVAILABLE: &str = "Schema unavailable";

/// Where a generated query came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOrigin {
    /// Produced by the model and normalized.
    Model,
    /// Synthesized because generation was impossible.
    Placeholder {
        /// Why no model query is available.
        reason: String,
    },
}

/// A single SELECT statement ready for the executor.
///
/// Never ends with a terminator and always contains a row limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuery {
    /// The SQL text.
    pub sql: String,
    /// Model output or placeholder.
    pub origin: QueryOrigin,
}

impl GeneratedQuery {
    fn placeholder(kind: DatabaseKind, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            sql: placeholder_sql(kind, &reason),
            origin: QueryOrigin::Placeholder { reason },
        }
    }

    /// Returns true if this is a placeholder rather than model output.
    pub fn is_placeholder(&self) -> bool {
        matches!(self.origin, QueryOrigin::Placeholder { .. })
    }
}

/// Builds `SELECT '<message>' AS error_message LIMIT <n>` with the message
/// escaped as a string literal for the dialect.
///
/// Terminators and line breaks are dropped from the message so the result
/// stays a single-line, single statement.
pub fn placeholder_sql(kind: DatabaseKind, message: &str) -> String {
    let flat: String = message
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(';', "");
    let mut literal = flat.replace('\'', "''");
    if kind == DatabaseKind::MySql {
        literal = literal.replace('\\', "\\\\");
    }
    format!(
        "SELECT '{}' AS error_message LIMIT {}",
        literal,
        kind.row_limit()
    )
}

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// A SELECT keyword, together with any opening parentheses directly before it.
fn statement_start() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&CELL, r"(?i)(?:\(\s*)*\bSELECT\b")
}

fn limit_keyword() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&CELL, r"(?i)\bLIMIT\b")
}

/// Normalizes extracted model text into a single SELECT.
///
/// Removes every `;`, drops anything before the first `SELECT` keyword (or
/// the parentheses opening it, as in `(SELECT ..) UNION (SELECT ..)`) and
/// appends the dialect's `LIMIT` when no LIMIT keyword is present. Returns
/// `None` if the text contains no SELECT at all.
pub fn normalize_sql(text: &str, kind: DatabaseKind) -> Option<String> {
    let stripped: String = text.chars().filter(|&c| c != ';').collect();
    let stripped = stripped.trim();

    let start = statement_start()?.find(stripped)?.start();
    let mut sql = stripped[start..].trim_end().to_string();

    if !limit_keyword().is_some_and(|re| re.is_match(&sql)) {
        sql.push_str(&format!(" LIMIT {}", kind.row_limit()));
    }

    Some(sql)
}

/// Turns questions into SQL through an LLM.
pub struct SqlGenerator {
    llm: Arc<dyn LlmClient>,
}

impl SqlGenerator {
    /// Creates a generator backed by `llm`.
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Generates a query for `question`.
    ///
    /// Skips the model entirely when the prompt has no schema.
    pub async fn generate(&self, question: &str, prompt: &Prompt) -> GeneratedQuery {
        if let Some(error) = &prompt.schema_error {
            warn!("Skipping generation, schema unavailable: {error}");
            return GeneratedQuery::placeholder(prompt.kind, SCHEMA_UNAVAILABLE);
        }

        let start = Instant::now();
        let response = match self.llm.complete(&prompt.messages(question)).await {
            Ok(response) => response,
            Err(e) => {
                warn!("LLM request failed: {e}");
                return GeneratedQuery::placeholder(prompt.kind, format!("Error: {}", e.message()));
            }
        };
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "LLM response received"
        );

        let extracted = extract_sql(&response);
        match normalize_sql(&extracted, prompt.kind) {
            Some(sql) => {
                info!("Generated SQL: {sql}");
                GeneratedQuery {
                    sql,
                    origin: QueryOrigin::Model,
                }
            }
            None => {
                warn!("LLM response contained no SELECT");
                GeneratedQuery::placeholder(
                    prompt.kind,
                    format!("Error: no SELECT statement in model response: {extracted}"),
                )
            }
        }
    }
}
