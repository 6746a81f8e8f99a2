//! Operator-facing facade over the optimization components

use crate::context::TunerContext;
use crate::error::Result;
use crate::optimization::{
    AppliedConfiguration, ImpactMonitor, ImpactReport, OptimizationApplier, ParameterOptimizer,
    PerformanceAnalyzer, PerformanceCollector, PerformanceReport, Recommendation,
    RecommendationEngine, SearchDeadline,
};
use crate::types::{
    OptimizationResult, PerformanceMetrics, PerformanceRecord, RetrievalParameters,
    RetrievalStrategy, TargetMetrics,
};
use chrono::{DateTime, Utc};

/// One entry point for record, analyze, optimize, apply, monitor, recommend
#[derive(Debug)]
pub struct RetrievalOptimizer {
    ctx: TunerContext,
    collector: PerformanceCollector,
    analyzer: PerformanceAnalyzer,
    optimizer: ParameterOptimizer,
    applier: OptimizationApplier,
    monitor: ImpactMonitor,
    recommendations: RecommendationEngine,
}

impl RetrievalOptimizer {
    pub fn new(ctx: TunerContext) -> Self {
        Self {
            collector: PerformanceCollector::new(ctx.clone()),
            analyzer: PerformanceAnalyzer::new(ctx.clone()),
            optimizer: ParameterOptimizer::new(ctx.clone()),
            applier: OptimizationApplier::new(ctx.clone()),
            monitor: ImpactMonitor::new(ctx.clone()),
            recommendations: RecommendationEngine::new(ctx.clone()),
            ctx,
        }
    }

    pub fn context(&self) -> &TunerContext {
        &self.ctx
    }

    /// Telemetry path: never fails, `false` means the data point was lost
    pub async fn record(
        &self,
        query_id: &str,
        parameters: RetrievalParameters,
        metrics: PerformanceMetrics,
    ) -> bool {
        self.collector.record(query_id, parameters, metrics).await
    }

    pub async fn record_entry(&self, record: PerformanceRecord) -> bool {
        self.collector.record_entry(record).await
    }

    pub async fn recent(&self, limit: usize) -> Vec<PerformanceRecord> {
        self.collector.recent(limit).await
    }

    pub async fn history(
        &self,
        strategy: Option<RetrievalStrategy>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PerformanceRecord>> {
        self.collector.history(strategy, start, end).await
    }

    /// Analyze with the configured default window when `window_hours` is `None`
    pub async fn analyze(
        &self,
        strategy: Option<RetrievalStrategy>,
        window_hours: Option<u32>,
    ) -> Result<PerformanceReport> {
        let window = window_hours.unwrap_or(self.ctx.config.analyzer.default_window_hours);
        self.analyzer.analyze(strategy, window).await
    }

    pub async fn optimize(
        &self,
        current: &RetrievalParameters,
        targets: Option<&TargetMetrics>,
    ) -> Result<OptimizationResult> {
        self.optimizer.optimize(current, targets).await
    }

    pub async fn optimize_with_deadline(
        &self,
        current: &RetrievalParameters,
        targets: Option<&TargetMetrics>,
        deadline: SearchDeadline,
    ) -> Result<OptimizationResult> {
        self.optimizer
            .optimize_with_deadline(current, targets, deadline)
            .await
    }

    pub async fn apply(&self, result: &OptimizationResult) -> Result<()> {
        self.applier.apply(result).await
    }

    pub async fn current(&self, strategy: RetrievalStrategy) -> Result<Option<AppliedConfiguration>> {
        self.applier.current(strategy).await
    }

    pub async fn applied_history(
        &self,
        strategy: RetrievalStrategy,
    ) -> Result<Vec<OptimizationResult>> {
        self.applier.history(strategy).await
    }

    /// Monitor with the configured default window when `window_hours` is `None`
    pub async fn monitor(
        &self,
        result: &OptimizationResult,
        window_hours: Option<u32>,
    ) -> Result<ImpactReport> {
        let window = window_hours.unwrap_or(self.ctx.config.monitor.default_window_hours);
        self.monitor.monitor(result, window).await
    }

    pub async fn stored_impact(
        &self,
        strategy: RetrievalStrategy,
        applied_at: DateTime<Utc>,
    ) -> Result<Option<ImpactReport>> {
        self.monitor.stored_report(strategy, applied_at).await
    }

    /// Advisory path: empty on any failure
    pub async fn recommend(&self, current: &RetrievalParameters) -> Vec<Recommendation> {
        self.recommendations.recommend(current).await
    }
}
