//! Error types for AskSQL.
//!
//! Defines the main error enum used throughout the pipeline.

use thiserror::Error;

/// Main error type for AskSQL operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AskSqlError {
    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution errors (syntax errors, permission denied, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// LLM API errors (rate limits, auth, timeouts, unusable output, etc.)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Configuration errors (missing API key, incomplete connection, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential file errors (I/O, permissions, corrupt or undecryptable data).
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Statement refused by the read-only guard before reaching the server.
    #[error("Blocked statement: {0}")]
    Blocked(String),
}

impl AskSqlError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates an LLM error with the given message.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a persistence error with the given message.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Creates a blocked-statement error with the given reason.
    pub fn blocked(msg: impl Into<String>) -> Self {
        Self::Blocked(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Llm(_) => "LLM Error",
            Self::Config(_) => "Configuration Error",
            Self::Persistence(_) => "Persistence Error",
            Self::Blocked(_) => "Blocked Statement",
        }
    }

    /// Returns the message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Connection(m)
            | Self::Query(m)
            | Self::Llm(m)
            | Self::Config(m)
            | Self::Persistence(m)
            | Self::Blocked(m) => m,
        }
    }
}

/// Result type alias using AskSqlError.
pub type Result<T> = std::result::Result<T, AskSqlError>;
