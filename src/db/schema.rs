//! Database schema types for AskSQL.
//!
//! A schema is the list of tables visible to the generator, each with its
//! column names in native ordinal order.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Minimum normalized Levenshtein similarity for a fuzzy table-name match.
const TABLE_MATCH_CUTOFF: f64 = 0.7;

/// Longest run of question words joined into one candidate table name.
const MAX_GRAM_WORDS: usize = 3;

/// Tables and their ordered column names.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schema {
    /// All tables in the schema.
    pub tables: Vec<Table>,
}

impl Schema {
    /// Creates a new empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table, returning the schema for chaining.
    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    /// Looks up a table by name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Returns true if the schema has no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Formats the schema for inclusion in an LLM system prompt.
    ///
    /// One `TABLE <name> (columns: a, b, c)` line per table, in schema order.
    pub fn format_for_llm(&self) -> String {
        self.tables
            .iter()
            .map(|table| {
                format!(
                    "TABLE {} (columns: {})\n",
                    table.name,
                    table.columns.join(", ")
                )
            })
            .collect()
    }

    /// Formats the schema for terminal display.
    pub fn format_for_display(&self) -> String {
        if self.tables.is_empty() {
            return "(no tables)\n".to_string();
        }

        self.tables
            .iter()
            .map(|table| {
                let columns = table
                    .columns
                    .iter()
                    .map(|c| format!("  - {c}\n"))
                    .collect::<String>();
                format!("{}\n{}", table.name, columns)
            })
            .collect()
    }

    /// Keeps only the tables a question appears to mention.
    ///
    /// Runs of one to three words are joined with `_` (`order items` becomes
    /// `order_items`) and matched against table names, exactly or fuzzily.
    /// Table order is preserved. Returns `None` when nothing matches.
    pub fn narrowed_to(&self, question: &str) -> Option<Schema> {
        let cleaned: String = question
            .to_lowercase()
            .chars()
            .map(|c| if matches!(c, '.' | ',' | ';' | '!' | '?') { ' ' } else { c })
            .collect();
        let words: Vec<&str> = cleaned.split_whitespace().collect();

        let mut matched = HashSet::new();
        for start in 0..words.len() {
            for len in 1..=MAX_GRAM_WORDS {
                let Some(run) = words.get(start..start + len) else {
                    break;
                };
                if let Some(name) = self.closest_table(&run.join("_")) {
                    matched.insert(name);
                }
            }
        }

        if matched.is_empty() {
            return None;
        }

        Some(Schema {
            tables: self
                .tables
                .iter()
                .filter(|t| matched.contains(t.name.as_str()))
                .cloned()
                .collect(),
        })
    }

    fn closest_table(&self, candidate: &str) -> Option<&str> {
        if let Some(table) = self
            .tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(candidate))
        {
            return Some(&table.name);
        }

        self.tables
            .iter()
            .map(|t| {
                let score = strsim::normalized_levenshtein(candidate, &t.name.to_lowercase());
                (t, score)
            })
            .filter(|(_, score)| *score >= TABLE_MATCH_CUTOFF)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(t, _)| t.name.as_str())
    }
}

/// A table and its column names in ordinal order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Column names, in the database's ordinal order.
    pub columns: Vec<String>,
}

impl Table {
    /// Creates a table from a name and column list.
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

/// The outcome of introspecting a database.
///
/// `Unavailable` is the authoritative failure signal: a database with zero
/// tables is `Ready` with an empty schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSnapshot {
    /// Introspection succeeded.
    Ready(Arc<Schema>),

    /// Introspection failed; carries the error message. No partial data.
    Unavailable(String),
}

impl SchemaSnapshot {
    /// Returns the schema if introspection succeeded.
    pub fn schema(&self) -> Option<&Schema> {
        match self {
            Self::Ready(schema) => Some(schema),
            Self::Unavailable(_) => None,
        }
    }

    /// Returns true if the schema can be used for generation.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Returns the introspection error, if any.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Ready(_) => None,
            Self::Unavailable(msg) => Some(msg),
        }
    }
}

impl From<Schema> for SchemaSnapshot {
    fn from(schema: Schema) -> Self {
        Self::Ready(Arc::new(schema))
    }
}
