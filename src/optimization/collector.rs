//! Performance telemetry collection.
//!
//! Every completed query lands here once. Records go to the bounded
//! recent-records list in the cache and to the durable event store. The
//! write path never raises: a lost data point is logged and reported as
//! `false` so the serving pipeline is never interrupted.

use crate::context::TunerContext;
use crate::error::{Result, TunerError};
use crate::storage::{StoredEvent, EVENT_RETRIEVAL_PERFORMANCE};
use crate::types::{PerformanceMetrics, PerformanceRecord, RetrievalParameters, RetrievalStrategy};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Cache list holding the most recent records, newest first
pub const RECENT_RECORDS_KEY: &str = "retrieval_performance:recent";

fn shift_hours(at: DateTime<Utc>, hours: u64, forward: bool) -> Result<DateTime<Utc>> {
    i64::try_from(hours)
        .ok()
        .and_then(chrono::Duration::try_hours)
        .and_then(|span| {
            if forward {
                at.checked_add_signed(span)
            } else {
                at.checked_sub_signed(span)
            }
        })
        .ok_or(TunerError::WindowOutOfRange { window_hours: hours })
}

/// `at` moved back by `hours`, or `WindowOutOfRange` on overflow
pub fn hours_before(at: DateTime<Utc>, hours: u64) -> Result<DateTime<Utc>> {
    shift_hours(at, hours, false)
}

/// `at` moved forward by `hours`, or `WindowOutOfRange` on overflow
pub fn hours_after(at: DateTime<Utc>, hours: u64) -> Result<DateTime<Utc>> {
    shift_hours(at, hours, true)
}

/// Collector for per-query performance records
#[derive(Debug, Clone)]
pub struct PerformanceCollector {
    ctx: TunerContext,
}

impl PerformanceCollector {
    pub fn new(ctx: TunerContext) -> Self {
        Self { ctx }
    }

    /// Record the outcome of one query, stamped now
    ///
    /// Returns `false` if either the cache or the durable write failed.
    pub async fn record(
        &self,
        query_id: &str,
        parameters: RetrievalParameters,
        metrics: PerformanceMetrics,
    ) -> bool {
        self.record_entry(PerformanceRecord::new(query_id, parameters, metrics))
            .await
    }

    /// Record a fully built record, keeping its own timestamp
    pub async fn record_entry(&self, record: PerformanceRecord) -> bool {
        let payload = match serde_json::to_value(&record) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize record {}: {}", record.query_id, e);
                return false;
            }
        };

        let mut stored = true;
        let capacity = self.ctx.config.collector.recent_capacity;

        if let Err(e) = self
            .ctx
            .cache
            .push_bounded(RECENT_RECORDS_KEY, payload.clone(), capacity)
            .await
        {
            warn!("Failed to cache record {}: {}", record.query_id, e);
            stored = false;
        }

        let event = StoredEvent::new(EVENT_RETRIEVAL_PERFORMANCE, payload, record.timestamp);
        let write_timeout = Duration::from_millis(self.ctx.config.collector.write_timeout_ms);

        match timeout(write_timeout, self.ctx.events.append_event(&event)).await {
            Ok(Ok(())) => {
                debug!(
                    "Recorded {} query {} (overall {:.3})",
                    record.strategy(),
                    record.query_id,
                    record.overall_score()
                );
            }
            Ok(Err(e)) => {
                warn!("Failed to persist record {}: {}", record.query_id, e);
                stored = false;
            }
            Err(_) => {
                warn!(
                    "Persisting record {} timed out after {:?}",
                    record.query_id, write_timeout
                );
                stored = false;
            }
        }

        stored
    }

    /// Most recent records from the cache, newest first
    ///
    /// Cache failures and malformed entries yield fewer records, never an error.
    pub async fn recent(&self, limit: usize) -> Vec<PerformanceRecord> {
        match self.ctx.cache.list(RECENT_RECORDS_KEY, limit).await {
            Ok(items) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            Err(e) => {
                warn!("Failed to read recent records: {}", e);
                Vec::new()
            }
        }
    }

    /// Durable records in `[start, end]`, oldest first, optionally for one strategy
    pub async fn history(
        &self,
        strategy: Option<RetrievalStrategy>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PerformanceRecord>> {
        let events = self
            .ctx
            .events
            .query_events(EVENT_RETRIEVAL_PERFORMANCE, start, end)
            .await?;

        let mut skipped = 0usize;
        let records: Vec<PerformanceRecord> = events
            .into_iter()
            .filter_map(|event| match serde_json::from_value(event.event_data) {
                Ok(record) => Some(record),
                Err(_) => {
                    skipped += 1;
                    None
                }
            })
            .filter(|record: &PerformanceRecord| strategy.map_or(true, |s| record.strategy() == s))
            .collect();

        if skipped > 0 {
            warn!("Skipped {} malformed performance events", skipped);
        }

        Ok(records)
    }
}
