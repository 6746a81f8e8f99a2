//! LibSQL storage backend implementation
//!
//! One local libSQL database serves as both the durable event store and the
//! short-lived cache, so the operator CLI keeps applied configurations across
//! invocations.

use crate::error::{Result, TunerError};
use crate::storage::schema::init_tuner_tables;
use crate::storage::{CacheStore, EventStore, StoredEvent};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use libsql::{params, Builder, Connection, Database};
use std::time::Duration;
use tracing::{debug, info};

/// LibSQL-backed event store and cache
pub struct LibsqlStore {
    db: Database,
}

impl LibsqlStore {
    /// Open (creating if missing) a local database and ensure the schema
    pub async fn open(db_path: &str) -> Result<Self> {
        let db = Builder::new_local(db_path)
            .build()
            .await
            .map_err(|e| TunerError::Database(format!("Failed to open database: {}", e)))?;

        let store = Self { db };
        let conn = store.get_conn()?;
        init_tuner_tables(&conn).await?;

        info!("Opened tuner database at {}", db_path);
        Ok(store)
    }

    /// Get database connection
    fn get_conn(&self) -> Result<Connection> {
        self.db
            .connect()
            .map_err(|e| TunerError::Database(format!("Failed to get connection: {}", e)))
    }

    fn row_to_event(row: &libsql::Row) -> Result<StoredEvent> {
        let id: String = row.get(0)?;
        let event_type: String = row.get(1)?;
        let event_data: String = row.get(2)?;
        let timestamp_ms: i64 = row.get(3)?;

        let timestamp = Utc
            .timestamp_millis_opt(timestamp_ms)
            .single()
            .ok_or_else(|| TunerError::Database(format!("Invalid timestamp: {}", timestamp_ms)))?;

        Ok(StoredEvent {
            id,
            event_type,
            event_data: serde_json::from_str(&event_data)?,
            timestamp,
        })
    }
}

#[async_trait]
impl EventStore for LibsqlStore {
    async fn append_event(&self, event: &StoredEvent) -> Result<()> {
        let conn = self.get_conn()?;
        let event_data = serde_json::to_string(&event.event_data)?;

        conn.execute(
            "INSERT INTO performance_events (id, event_type, event_data, timestamp_ms) VALUES (?, ?, ?, ?)",
            params![
                event.id.clone(),
                event.event_type.clone(),
                event_data,
                event.timestamp.timestamp_millis(),
            ],
        )
        .await
        .map_err(|e| TunerError::Database(format!("Failed to append event: {}", e)))?;

        debug!("Appended {} event {}", event.event_type, event.id);
        Ok(())
    }

    async fn query_events(
        &self,
        event_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>> {
        let conn = self.get_conn()?;

        let mut rows = conn
            .query(
                r#"
                SELECT id, event_type, event_data, timestamp_ms
                FROM performance_events
                WHERE event_type = ? AND timestamp_ms >= ? AND timestamp_ms <= ?
                ORDER BY timestamp_ms ASC
                "#,
                params![
                    event_type,
                    start.timestamp_millis(),
                    end.timestamp_millis()
                ],
            )
            .await
            .map_err(|e| TunerError::Database(format!("Failed to query events: {}", e)))?;

        let mut events = Vec::new();
        while let Some(row) = rows.next().await? {
            events.push(Self::row_to_event(&row)?);
        }
        Ok(events)
    }
}

#[async_trait]
impl CacheStore for LibsqlStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.get_conn()?;

        let mut rows = conn
            .query(
                "SELECT value, expires_at_ms FROM cache_entries WHERE key = ?",
                params![key],
            )
            .await
            .map_err(|e| TunerError::Database(format!("Failed to read cache entry: {}", e)))?;

        let row = match rows.next().await? {
            Some(row) => row,
            None => return Ok(None),
        };

        let value: String = row.get(0)?;
        let expires_at_ms: i64 = row.get(1)?;

        if expires_at_ms <= Utc::now().timestamp_millis() {
            debug!("Cache entry expired: {}", key);
            conn.execute("DELETE FROM cache_entries WHERE key = ?", params![key])
                .await
                .map_err(|e| {
                    TunerError::Database(format!("Failed to evict cache entry: {}", e))
                })?;
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&value)?))
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<()> {
        let conn = self.get_conn()?;
        let expires_at_ms = Utc::now().timestamp_millis() + ttl.as_millis() as i64;

        conn.execute(
            "INSERT OR REPLACE INTO cache_entries (key, value, expires_at_ms) VALUES (?, ?, ?)",
            params![key, serde_json::to_string(&value)?, expires_at_ms],
        )
        .await
        .map_err(|e| TunerError::Database(format!("Failed to write cache entry: {}", e)))?;

        Ok(())
    }

    async fn push_bounded(
        &self,
        key: &str,
        value: serde_json::Value,
        max_len: usize,
    ) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "INSERT INTO cache_lists (key, value) VALUES (?, ?)",
            params![key, serde_json::to_string(&value)?],
        )
        .await
        .map_err(|e| TunerError::Database(format!("Failed to push list item: {}", e)))?;

        conn.execute(
            r#"
            DELETE FROM cache_lists
            WHERE key = ? AND id NOT IN (
                SELECT id FROM cache_lists WHERE key = ? ORDER BY id DESC LIMIT ?
            )
            "#,
            params![key, key, max_len as i64],
        )
        .await
        .map_err(|e| TunerError::Database(format!("Failed to trim list: {}", e)))?;

        Ok(())
    }

    async fn list(&self, key: &str, limit: usize) -> Result<Vec<serde_json::Value>> {
        let conn = self.get_conn()?;

        let mut rows = conn
            .query(
                "SELECT value FROM cache_lists WHERE key = ? ORDER BY id DESC LIMIT ?",
                params![key, limit as i64],
            )
            .await
            .map_err(|e| TunerError::Database(format!("Failed to read list: {}", e)))?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            items.push(serde_json::from_str(&value)?);
        }
        Ok(items)
    }
}
