//! Before/after impact measurement for applied optimizations.

use crate::config::MonitorConfig;
use crate::context::TunerContext;
use crate::error::{Result, TunerError};
use crate::optimization::analyzer::metric_summary;
use crate::optimization::collector::{hours_after, hours_before, PerformanceCollector};
use crate::optimization::stats::MetricStats;
use crate::types::{MetricKind, OptimizationResult, PerformanceRecord, RetrievalStrategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

pub fn impact_key(strategy: RetrievalStrategy, applied_at: DateTime<Utc>) -> String {
    format!(
        "retrieval_optimization_impact:{}:{}",
        strategy,
        applied_at.timestamp()
    )
}

/// Aggregates for one side of the comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub record_count: usize,
    pub metrics: BTreeMap<MetricKind, MetricStats>,
}

impl WindowSummary {
    fn new(start: DateTime<Utc>, end: DateTime<Utc>, records: &[PerformanceRecord]) -> Self {
        let refs: Vec<&PerformanceRecord> = records.iter().collect();
        Self {
            start,
            end,
            record_count: records.len(),
            metrics: metric_summary(&refs),
        }
    }

    pub fn overall_score(&self) -> f64 {
        self.metrics
            .get(&MetricKind::OverallScore)
            .map_or(0.0, |s| s.mean)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub strategy: RetrievalStrategy,
    pub applied_at: DateTime<Utc>,
    pub window_hours: u32,
    pub before: WindowSummary,
    pub after: WindowSummary,
    /// Estimate carried over from the optimization result
    pub expected_improvement: f64,
    /// Measured change in mean overall score
    pub actual_improvement: f64,
    pub success: bool,
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ImpactMonitor {
    ctx: TunerContext,
    collector: PerformanceCollector,
}

impl ImpactMonitor {
    pub fn new(ctx: TunerContext) -> Self {
        let collector = PerformanceCollector::new(ctx.clone());
        Self { ctx, collector }
    }

    fn config(&self) -> &MonitorConfig {
        &self.ctx.config.monitor
    }

    /// Compare `window_hours` before and after `result.applied_at`
    ///
    /// Fails with `InsufficientData` when either window is empty.
    pub async fn monitor(
        &self,
        result: &OptimizationResult,
        window_hours: u32,
    ) -> Result<ImpactReport> {
        let strategy = result.strategy();
        let applied_at = result.applied_at;
        let window_start = hours_before(applied_at, window_hours as u64)?;
        let window_end = hours_after(applied_at, window_hours as u64)?;

        let mut records = self
            .collector
            .history(Some(strategy), window_start, window_end)
            .await?;
        // Before is half-open so a record stamped exactly at applied_at counts as after
        let after: Vec<PerformanceRecord> = records
            .iter()
            .filter(|r| r.timestamp >= applied_at)
            .cloned()
            .collect();
        records.retain(|r| r.timestamp < applied_at);
        let before = records;

        if before.is_empty() || after.is_empty() {
            return Err(TunerError::InsufficientData {
                strategy,
                found: before.len().min(after.len()),
                required: 1,
            });
        }

        let before = WindowSummary::new(window_start, applied_at, &before);
        let after = WindowSummary::new(applied_at, window_end, &after);

        let expected_improvement = result.performance_improvement;
        let actual_improvement = after.overall_score() - before.overall_score();
        let success = actual_improvement >= self.config().success_ratio * expected_improvement;

        let report = ImpactReport {
            strategy,
            applied_at,
            window_hours,
            before,
            after,
            expected_improvement,
            actual_improvement,
            success,
            evaluated_at: Utc::now(),
        };

        let ttl = std::time::Duration::from_secs(self.config().report_ttl_days as u64 * 86_400);
        self.ctx
            .cache
            .set_with_ttl(&impact_key(strategy, applied_at), serde_json::to_value(&report)?, ttl)
            .await?;

        if success {
            info!(
                "{} optimization delivered {:+.3} (expected {:+.3})",
                strategy, actual_improvement, expected_improvement
            );
        } else {
            warn!(
                "{} optimization fell short: {:+.3} measured vs {:+.3} expected",
                strategy, actual_improvement, expected_improvement
            );
        }

        Ok(report)
    }

    /// Previously persisted report, if it has not expired
    pub async fn stored_report(
        &self,
        strategy: RetrievalStrategy,
        applied_at: DateTime<Utc>,
    ) -> Result<Option<ImpactReport>> {
        match self.ctx.cache.get(&impact_key(strategy, applied_at)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}
