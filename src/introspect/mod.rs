//! Schema introspection with a time-to-live cache.
//!
//! [`SchemaIntrospector::introspect`] never fails: it returns either a usable
//! schema or [`SchemaSnapshot::Unavailable`].

mod cache;

pub use cache::TtlCache;

use crate::config::ConnectionConfig;
use crate::db::{Connector, Schema, SchemaSnapshot};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default lifetime of a cached schema.
pub const DEFAULT_SCHEMA_TTL: Duration = Duration::from_secs(300);

/// Introspects databases and memoizes successful results per connection.
pub struct SchemaIntrospector {
    connector: Arc<dyn Connector>,
    cache: TtlCache<ConnectionConfig, Schema>,
}

impl SchemaIntrospector {
    /// Creates an introspector with the given cache lifetime.
    pub fn new(connector: Arc<dyn Connector>, ttl: Duration) -> Self {
        Self {
            connector,
            cache: TtlCache::new(ttl),
        }
    }

    /// Returns the schema for `config`, from cache when fresh.
    pub async fn introspect(&self, config: &ConnectionConfig) -> SchemaSnapshot {
        if let Some(schema) = self.cache.get(config) {
            debug!(target = %config.display_string(), "Schema cache hit");
            return SchemaSnapshot::Ready(schema);
        }

        let start = Instant::now();
        match self.fetch(config).await {
            Ok(schema) => {
                info!(
                    tables = schema.tables.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Introspected {}",
                    config.display_string()
                );
                let schema = Arc::new(schema);
                self.cache.insert(config.clone(), Arc::clone(&schema));
                SchemaSnapshot::Ready(schema)
            }
            Err(e) => {
                warn!("Schema introspection failed for {}: {}", config.display_string(), e);
                SchemaSnapshot::Unavailable(e.message().to_string())
            }
        }
    }

    /// Forgets the cached schema for `config`, e.g. after reconnecting.
    pub fn invalidate(&self, config: &ConnectionConfig) {
        if self.cache.invalidate(config) {
            debug!("Invalidated cached schema for {}", config.display_string());
        }
    }

    async fn fetch(&self, config: &ConnectionConfig) -> crate::error::Result<Schema> {
        let client = self.connector.connect(config).await?;
        let result = client.introspect_schema().await;

        if let Err(e) = client.close().await {
            warn!("Failed to close introspection connection: {e}");
        }

        result
    }
}
