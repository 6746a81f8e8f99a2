//! In-process storage backends
//!
//! Used by tests and by embedders that keep telemetry in memory. Both types
//! are cheap to share behind an `Arc`.

use crate::error::Result;
use crate::storage::{CacheStore, EventStore, StoredEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Append-only event log held in memory
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: RwLock<Vec<StoredEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored events of every type
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append_event(&self, event: &StoredEvent) -> Result<()> {
        let mut events = self.events.write().await;
        events.push(event.clone());
        Ok(())
    }

    async fn query_events(
        &self,
        event_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>> {
        let events = self.events.read().await;
        let mut matching: Vec<StoredEvent> = events
            .iter()
            .filter(|e| e.event_type == event_type && e.timestamp >= start && e.timestamp <= end)
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.timestamp);
        Ok(matching)
    }
}

#[derive(Debug)]
struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// Expiring key/value cache held in memory
///
/// Expired entries are dropped lazily on read.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    lists: RwLock<HashMap<String, VecDeque<serde_json::Value>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.value.clone()))
                }
                Some(_) => {}
            }
        }

        debug!("Cache entry expired: {}", key);
        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|entry| entry.expires_at <= Instant::now())
        {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn push_bounded(
        &self,
        key: &str,
        value: serde_json::Value,
        max_len: usize,
    ) -> Result<()> {
        let mut lists = self.lists.write().await;
        let list = lists.entry(key.to_string()).or_default();
        list.push_front(value);
        list.truncate(max_len);
        Ok(())
    }

    async fn list(&self, key: &str, limit: usize) -> Result<Vec<serde_json::Value>> {
        let lists = self.lists.read().await;
        Ok(lists
            .get(key)
            .map(|list| list.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    #[tokio::test]
    async fn test_event_range_query() {
        let store = InMemoryEventStore::new();
        let now = Utc::now();

        for hours_ago in [1, 5, 30] {
            let event = StoredEvent::new(
                "retrieval_performance",
                json!({ "hours_ago": hours_ago }),
                now - ChronoDuration::hours(hours_ago),
            );
            store.append_event(&event).await.unwrap();
        }
        store
            .append_event(&StoredEvent::new("other", json!({}), now))
            .await
            .unwrap();

        let events = store
            .query_events("retrieval_performance", now - ChronoDuration::hours(24), now)
            .await
            .unwrap();

        assert_eq!(events.len(), 2);
        // Oldest first
        assert_eq!(events[0].event_data["hours_ago"], 5);
        assert_eq!(events[1].event_data["hours_ago"], 1);
        assert_eq!(store.len().await, 4);
    }

    #[tokio::test]
    async fn test_cache_ttl_expiry() {
        let cache = InMemoryCache::new();

        cache
            .set_with_ttl("live", json!(1), Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set_with_ttl("stale", json!(2), Duration::from_millis(0))
            .await
            .unwrap();

        assert_eq!(cache.get("live").await.unwrap(), Some(json!(1)));
        assert_eq!(cache.get("stale").await.unwrap(), None);
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_bounded_list_keeps_newest() {
        let cache = InMemoryCache::new();

        for i in 0..10 {
            cache.push_bounded("ring", json!(i), 3).await.unwrap();
        }

        let items = cache.list("ring", 100).await.unwrap();
        assert_eq!(items, vec![json!(9), json!(8), json!(7)]);

        let limited = cache.list("ring", 1).await.unwrap();
        assert_eq!(limited, vec![json!(9)]);
    }
}
