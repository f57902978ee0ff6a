//! Integration tests for AskSQL.

pub mod credentials_test;
pub mod mysql_test;
pub mod pipeline_test;
pub mod postgres_test;
