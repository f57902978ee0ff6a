//! Query execution for AskSQL.
//!
//! Isolates guarded SQL execution from generation so each can be tested
//! independently.

pub mod executor;

pub use executor::{ExecutionResult, QueryExecutor};
