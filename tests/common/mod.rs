//! Common test utilities and helpers

#![allow(dead_code)]

use chrono::{Duration, Utc};
use retrieval_tuner::optimization::PerformanceCollector;
use retrieval_tuner::types::ParameterField;
use retrieval_tuner::{
    PerformanceMetrics, PerformanceRecord, RetrievalParameters, RetrievalStrategy, TunerConfig,
    TunerContext,
};
use tempfile::TempDir;

/// Default config with a fixed random seed so searches are reproducible
pub fn test_config() -> TunerConfig {
    let mut config = TunerConfig::default();
    config.optimizer.random_seed = Some(42);
    config
}

pub fn in_memory_context() -> TunerContext {
    TunerContext::in_memory(test_config())
}

/// libSQL-backed context in a fresh temp dir
///
/// Uses a file rather than `:memory:` because libSQL's memory mode gives each
/// connection its own database. Keep the `TempDir` alive for the test.
pub async fn libsql_context() -> (TunerContext, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("tuner.db");
    let ctx = TunerContext::libsql(&path.to_string_lossy(), test_config())
        .await
        .expect("Failed to open libsql store");
    (ctx, dir)
}

pub fn metrics(relevance: f64, response_time: f64, satisfaction: f64) -> PerformanceMetrics {
    PerformanceMetrics::from_precision_recall(
        relevance,
        response_time,
        satisfaction,
        relevance,
        relevance,
        10,
    )
}

/// Record stamped `minutes_ago` minutes in the past
pub fn record_at(
    parameters: RetrievalParameters,
    metrics: PerformanceMetrics,
    minutes_ago: i64,
) -> PerformanceRecord {
    let metrics = metrics.at(Utc::now() - Duration::minutes(minutes_ago));
    PerformanceRecord::observed(uuid::Uuid::new_v4().to_string(), parameters, metrics)
}

/// Write `count` records with the given metrics, one minute apart
pub async fn seed_records(
    ctx: &TunerContext,
    strategy: RetrievalStrategy,
    count: usize,
    relevance: f64,
    response_time: f64,
    satisfaction: f64,
) {
    let collector = PerformanceCollector::new(ctx.clone());
    let params = RetrievalParameters::defaults_for(strategy);
    for i in 0..count {
        let record = record_at(
            params.clone(),
            metrics(relevance, response_time, satisfaction),
            i as i64 + 1,
        );
        assert!(collector.record_entry(record).await, "seeding record {} failed", i);
    }
}

/// Hybrid records whose similarity threshold varies with their relevance
pub async fn seed_threshold_sweep(ctx: &TunerContext, count: usize) {
    let collector = PerformanceCollector::new(ctx.clone());
    for i in 0..count {
        let threshold = 0.55 + 0.35 * i as f64 / (count.max(2) - 1) as f64;
        let params = RetrievalParameters::defaults_for(RetrievalStrategy::HybridSearch)
            .with_clamped(ParameterField::SimilarityThreshold, threshold);
        let relevance = threshold;
        let record = record_at(params, metrics(relevance, 2.0, 0.8), i as i64 + 1);
        assert!(collector.record_entry(record).await);
    }
}
