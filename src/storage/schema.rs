//! Database schema for the libSQL backend.
//!
//! Creates tables for:
//! - performance_events: append-only durable event log
//! - cache_entries: expiring key/value entries
//! - cache_lists: bounded newest-first lists

use crate::error::{Result, TunerError};

/// Initialize tuner tables on an open connection
///
/// Safe to call multiple times (uses IF NOT EXISTS).
pub async fn init_tuner_tables(conn: &libsql::Connection) -> Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS performance_events (
            id TEXT PRIMARY KEY,
            event_type TEXT NOT NULL,
            event_data TEXT NOT NULL,
            timestamp_ms INTEGER NOT NULL
        )
        "#,
        libsql::params![],
    )
    .await
    .map_err(|e| {
        TunerError::Database(format!("Failed to create performance_events table: {}", e))
    })?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_type_time ON performance_events(event_type, timestamp_ms)",
        libsql::params![],
    )
    .await
    .map_err(|e| TunerError::Database(format!("Failed to create index: {}", e)))?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS cache_entries (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            expires_at_ms INTEGER NOT NULL
        )
        "#,
        libsql::params![],
    )
    .await
    .map_err(|e| TunerError::Database(format!("Failed to create cache_entries table: {}", e)))?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS cache_lists (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            key TEXT NOT NULL,
            value TEXT NOT NULL
        )
        "#,
        libsql::params![],
    )
    .await
    .map_err(|e| TunerError::Database(format!("Failed to create cache_lists table: {}", e)))?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_cache_lists_key ON cache_lists(key, id)",
        libsql::params![],
    )
    .await
    .map_err(|e| TunerError::Database(format!("Failed to create index: {}", e)))?;

    tracing::info!("Tuner database schema initialized");
    Ok(())
}
