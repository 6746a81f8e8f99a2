//! Shared handles for every tuner component
//!
//! Built once at startup and cloned into each component; there is no global
//! state.

use crate::config::TunerConfig;
use crate::error::Result;
use crate::storage::{CacheStore, EventStore, InMemoryCache, InMemoryEventStore, LibsqlStore};
use std::sync::Arc;

/// Cache client, durable-store client, and configuration
#[derive(Clone)]
pub struct TunerContext {
    pub cache: Arc<dyn CacheStore>,
    pub events: Arc<dyn EventStore>,
    pub config: Arc<TunerConfig>,
}

impl TunerContext {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        events: Arc<dyn EventStore>,
        config: TunerConfig,
    ) -> Self {
        Self {
            cache,
            events,
            config: Arc::new(config),
        }
    }

    /// Context backed entirely by in-memory stores
    pub fn in_memory(config: TunerConfig) -> Self {
        Self::new(
            Arc::new(InMemoryCache::new()),
            Arc::new(InMemoryEventStore::new()),
            config,
        )
    }

    /// Context whose cache and durable store share one libSQL database
    pub async fn libsql(db_path: &str, config: TunerConfig) -> Result<Self> {
        let store = Arc::new(LibsqlStore::open(db_path).await?);
        Ok(Self::new(store.clone(), store, config))
    }
}

impl std::fmt::Debug for TunerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunerContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
