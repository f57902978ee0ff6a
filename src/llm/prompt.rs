//! Prompt construction for LLM requests.
//!
//! Builds the system prompt from the schema, the target dialect and the
//! configured schema-correction notes. Pure templating: the same inputs
//! always produce the same prompt.

use crate::db::{DatabaseKind, Schema, SchemaSnapshot};
use crate::llm::types::Message;

/// Rules shared by every dialect. `{dialect}` and `{limit}` are substituted.
const BASE_RULES: &str = r#"Rules:
1. Build exactly ONE valid {dialect} SELECT statement.
2. Use ONLY tables and columns from the schema above. Do NOT use schema or database prefixes.
3. Do NOT query system tables or catalogs (information_schema, pg_catalog, mysql, performance_schema).
4. Always include LIMIT {limit}. No semicolons.
5. Return only the SQL, with no explanation.

Aliases and columns:
- Every table alias used anywhere in the query must be declared in a FROM or JOIN clause before it is used.
- Use short, unique aliases. Never reuse one alias for two different tables.
- No duplicate output column names. When a column exists in more than one joined table, select it from one table only or give it a column alias (e.g. c.id AS customer_id).

UNION:
- ORDER BY and LIMIT may appear only once, after the whole UNION, never inside an individual SELECT of the UNION.
- Use UNION only to combine genuinely different result sets. For "highest and lowest" style requests, return one result set sorted by the measure instead."#;

/// Extra rules for MySQL 5.7.
const MYSQL_RULES: &str = r#"MySQL 5.7 compatibility:
- NO common table expressions (WITH ... AS). Use nested subqueries only.
- NO window functions: OVER (PARTITION BY ...), ROW_NUMBER(), RANK(), DENSE_RANK(), NTILE() are all forbidden.
- NO percentile functions. Use subqueries with ORDER BY and LIMIT instead.
- Do not compute top-N per group. Return the top rows overall instead, grouped and ordered by the grouping column, e.g. "top 3 customers per store" becomes GROUP BY store_id, customer_id ORDER BY store_id, SUM(amount) DESC.
- Never emulate ranking with user variables such as @rn."#;

/// Builds the system prompt with the database schema injected.
///
/// The schema is serialized as one `TABLE <name> (columns: ...)` line per
/// table, in schema order.
pub fn build_system_prompt(kind: DatabaseKind, schema: &Schema, notes: &[String]) -> String {
    let mut prompt = format!(
        "You are AskSQL, a {} expert who translates questions into SQL.\n\nDatabase schema:\n{}\n",
        kind.dialect_name(),
        schema.format_for_llm()
    );

    prompt.push_str(
        &BASE_RULES
            .replace("{dialect}", kind.dialect_name())
            .replace("{limit}", &kind.row_limit().to_string()),
    );

    if kind == DatabaseKind::MySql {
        prompt.push_str("\n\n");
        prompt.push_str(MYSQL_RULES);
    }

    let notes: Vec<&str> = notes
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .collect();
    if !notes.is_empty() {
        prompt.push_str("\n\nKnown schema corrections:\n");
        for note in notes {
            prompt.push_str("- ");
            prompt.push_str(note);
            prompt.push('\n');
        }
    }

    prompt
}

/// A system prompt plus what the generator needs to know about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Rendered system prompt; empty when the schema is unavailable.
    pub text: String,
    /// Target dialect.
    pub kind: DatabaseKind,
    /// Introspection error, when the schema could not be read.
    pub schema_error: Option<String>,
}

impl Prompt {
    /// Builds a prompt from an introspection result.
    pub fn from_snapshot(kind: DatabaseKind, snapshot: &SchemaSnapshot, notes: &[String]) -> Self {
        match snapshot {
            SchemaSnapshot::Ready(schema) => Self {
                text: build_system_prompt(kind, schema, notes),
                kind,
                schema_error: None,
            },
            SchemaSnapshot::Unavailable(error) => Self {
                text: String::new(),
                kind,
                schema_error: Some(error.clone()),
            },
        }
    }

    /// Returns true if the prompt carries a usable schema.
    pub fn schema_available(&self) -> bool {
        self.schema_error.is_none()
    }

    /// Builds the message list for one completion request.
    pub fn messages(&self, question: &str) -> Vec<Message> {
        vec![Message::system(self.text.clone()), Message::user(question)]
    }
}
