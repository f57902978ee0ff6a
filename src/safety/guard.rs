//! The read-only guard.
//!
//! Runs before every execution. Prompt instructions are not trusted: a query
//! reaches the server only if it is a single SELECT.

use crate::db::DatabaseKind;
use crate::error::{AskSqlError, Result};
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

use super::SqlClassifier;

fn writes_file(sql: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)\bINTO\s+(OUTFILE|DUMPFILE)\b").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(sql))
}

/// Trims whitespace and trailing statement terminators.
pub fn normalize_statement(sql: &str) -> &str {
    sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

/// The first word of `sql`, looking past the opening parentheses of a
/// parenthesized set operation such as `(SELECT ..) UNION (SELECT ..)`.
fn first_keyword(sql: &str) -> &str {
    let sql = sql.trim_start_matches(|c: char| c == '(' || c.is_whitespace());
    let end = sql
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .unwrap_or(sql.len());
    &sql[..end]
}

/// Checks that `sql` is a single read-only SELECT.
///
/// Returns the normalized statement to execute, or a `Blocked` error.
/// SQL that starts with SELECT but does not parse is let through; the
/// server will report the syntax error.
pub fn check_read_only(sql: &str, kind: DatabaseKind) -> Result<&str> {
    let normalized = normalize_statement(sql);

    if normalized.is_empty() {
        return Err(AskSqlError::blocked("empty statement"));
    }

    let keyword = first_keyword(normalized);
    if !keyword.eq_ignore_ascii_case("SELECT") {
        let shown = if keyword.is_empty() {
            normalized.chars().take(20).collect::<String>()
        } else {
            keyword.to_uppercase()
        };
        return Err(AskSqlError::blocked(format!(
            "only SELECT statements may be executed (got {shown})"
        )));
    }

    if normalized.contains(';') {
        return Err(AskSqlError::blocked("multiple statements are not allowed"));
    }

    if writes_file(normalized) {
        return Err(AskSqlError::blocked("SELECT ... INTO OUTFILE/DUMPFILE writes files"));
    }

    match SqlClassifier::new(kind).classify(normalized) {
        Ok(result) if result.is_single_read() => Ok(normalized),
        Ok(result) => Err(AskSqlError::blocked(format!(
            "{} statement is not read-only",
            result.statement_type
        ))),
        Err(e) => {
            warn!("Could not parse generated SQL, executing as-is: {e}");
            Ok(normalized)
        }
    }
}
