//! AskSQL - ask a database questions in plain English.
//!
//! This library exposes the core modules for use in integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod introspect;
pub mod llm;
pub mod logging;
pub mod output;
pub mod persistence;
pub mod query;
pub mod safety;
pub mod session;
