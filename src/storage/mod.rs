//! Storage layer for the retrieval tuner
//!
//! Two collaborators sit behind traits: an append-only durable event store
//! (performance records and audit events) and a short-lived cache (recent
//! records, the live applied configuration, impact reports).

pub mod libsql;
pub mod memory;
pub mod schema;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Event type for per-query performance records
pub const EVENT_RETRIEVAL_PERFORMANCE: &str = "retrieval_performance";

/// Event type for the audit trail of applied optimizations
pub const EVENT_OPTIMIZATION_APPLIED: &str = "retrieval_optimization_applied";

/// One row of the durable store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: String,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl StoredEvent {
    pub fn new(
        event_type: impl Into<String>,
        event_data: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            event_data,
            timestamp,
        }
    }
}

/// Append-only durable store
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append an event
    async fn append_event(&self, event: &StoredEvent) -> Result<()>;

    /// Events of one type with `start <= timestamp <= end`, oldest first
    async fn query_events(
        &self,
        event_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>>;
}

/// Short-lived key/value cache with expiring entries and bounded lists
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Value under `key`, if present and not expired
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Store a value that expires after `ttl`
    async fn set_with_ttl(&self, key: &str, value: serde_json::Value, ttl: Duration)
        -> Result<()>;

    /// Prepend to the list under `key`, keeping only the newest `max_len` items
    async fn push_bounded(&self, key: &str, value: serde_json::Value, max_len: usize)
        -> Result<()>;

    /// List under `key`, newest first
    async fn list(&self, key: &str, limit: usize) -> Result<Vec<serde_json::Value>>;
}

pub use self::libsql::LibsqlStore;
pub use memory::{InMemoryCache, InMemoryEventStore};
