//! The question-to-result pipeline and the session it runs in.
//!
//! A [`Session`] is owned by the caller (the CLI loop) and passed into every
//! [`Pipeline::ask`]. The pipeline itself holds only shared, immutable
//! collaborators plus the schema cache.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::db::{Connector, SchemaSnapshot};
use crate::introspect::SchemaIntrospector;
use crate::llm::{GeneratedQuery, LlmClient, Prompt, SqlGenerator};
use crate::query::{ExecutionResult, QueryExecutor};

/// Per-user state: the active connection and the latest answer.
#[derive(Debug, Clone)]
pub struct Session {
    config: ConnectionConfig,
    last: Option<AskOutcome>,
}

impl Session {
    /// Starts a session against `config`.
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config, last: None }
    }

    /// The active connection.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// The most recent answer, if any.
    pub fn last(&self) -> Option<&AskOutcome> {
        self.last.as_ref()
    }

    /// Switches to another connection and forgets the last answer.
    ///
    /// Returns the previous connection.
    pub fn reconfigure(&mut self, config: ConnectionConfig) -> ConnectionConfig {
        self.last = None;
        std::mem::replace(&mut self.config, config)
    }
}

/// One answered question.
#[derive(Debug, Clone, PartialEq)]
pub struct AskOutcome {
    /// The question as asked.
    pub question: String,
    /// The SQL that was generated.
    pub query: GeneratedQuery,
    /// What happened when it ran.
    pub execution: ExecutionResult,
}

/// Ties introspection, prompting, generation and execution together.
pub struct Pipeline {
    introspector: SchemaIntrospector,
    generator: SqlGenerator,
    executor: QueryExecutor,
    notes: Vec<String>,
    narrow: bool,
}

impl Pipeline {
    /// Builds a pipeline that opens connections through `connector` and
    /// caches schemas for `schema_ttl`.
    pub fn new(
        connector: Arc<dyn Connector>,
        llm: Arc<dyn LlmClient>,
        schema_ttl: Duration,
    ) -> Self {
        Self {
            introspector: SchemaIntrospector::new(Arc::clone(&connector), schema_ttl),
            generator: SqlGenerator::new(llm),
            executor: QueryExecutor::new(connector),
            notes: Vec::new(),
            narrow: false,
        }
    }

    /// Adds schema-correction notes to every prompt.
    pub fn with_notes(mut self, notes: Vec<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Limits each prompt to the tables the question mentions.
    pub fn with_narrowing(mut self, narrow: bool) -> Self {
        self.narrow = narrow;
        self
    }

    /// Returns the schema for the session's connection.
    pub async fn schema(&self, session: &Session) -> SchemaSnapshot {
        self.introspector.introspect(session.config()).await
    }

    /// Generates SQL for `question` without running it.
    pub async fn generate(&self, session: &Session, question: &str) -> GeneratedQuery {
        let config = session.config();
        let mut snapshot = self.introspector.introspect(config).await;
        if self.narrow {
            snapshot = narrowed(snapshot, question);
        }
        let prompt = Prompt::from_snapshot(config.kind, &snapshot, &self.notes);
        self.generator.generate(question, &prompt).await
    }

    /// Answers `question`: generate, then execute through the guard.
    ///
    /// The outcome is also remembered as the session's last answer.
    pub async fn ask(&self, session: &mut Session, question: &str) -> AskOutcome {
        let query = self.generate(session, question).await;
        let execution = self.executor.execute(session.config(), &query.sql).await;

        info!(
            placeholder = query.is_placeholder(),
            success = execution.is_success(),
            "Answered question"
        );

        let outcome = AskOutcome {
            question: question.to_string(),
            query,
            execution,
        };
        session.last = Some(outcome.clone());
        outcome
    }

    /// Drops the cached schema for the session's connection.
    pub fn refresh_schema(&self, session: &Session) {
        self.introspector.invalidate(session.config());
    }
}

fn narrowed(snapshot: SchemaSnapshot, question: &str) -> SchemaSnapshot {
    let subset = snapshot.schema().and_then(|schema| schema.narrowed_to(question));
    match subset {
        Some(subset) => {
            debug!(tables = subset.tables.len(), "Narrowed schema to question");
            SchemaSnapshot::from(subset)
        }
        None => snapshot,
    }
}
