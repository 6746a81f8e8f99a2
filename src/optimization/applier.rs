//! Applies optimization results as the live retrieval configuration.
//!
//! The live configuration sits in the cache under
//! `retrieval_optimization:{strategy}` with a 24h expiry; the retrieval
//! engine falls back to defaults once it expires. Each application is also
//! audited in the durable store and kept in a bounded per-strategy history.

use crate::config::ApplierConfig;
use crate::context::TunerContext;
use crate::error::{Result, TunerError};
use crate::storage::{StoredEvent, EVENT_OPTIMIZATION_APPLIED};
use crate::types::{
    ImprovementBasis, OptimizationResult, OptimizationType, RetrievalParameters,
    RetrievalStrategy,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

pub fn config_key(strategy: RetrievalStrategy) -> String {
    format!("retrieval_optimization:{}", strategy)
}

pub fn history_key(strategy: RetrievalStrategy) -> String {
    format!("retrieval_optimization_history:{}", strategy)
}

/// Live configuration read by the retrieval engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedConfiguration {
    pub parameters: RetrievalParameters,
    pub performance_improvement: f64,
    #[serde(default)]
    pub improvement_basis: ImprovementBasis,
    pub confidence: f64,
    pub applied_at: DateTime<Utc>,
    pub optimization_type: OptimizationType,
}

impl From<&OptimizationResult> for AppliedConfiguration {
    fn from(result: &OptimizationResult) -> Self {
        Self {
            parameters: result.optimized_parameters.clone(),
            performance_improvement: result.performance_improvement,
            improvement_basis: result.improvement_basis,
            confidence: result.confidence,
            applied_at: result.applied_at,
            optimization_type: result.optimization_type,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizationApplier {
    ctx: TunerContext,
}

impl OptimizationApplier {
    pub fn new(ctx: TunerContext) -> Self {
        Self { ctx }
    }

    fn config(&self) -> &ApplierConfig {
        &self.ctx.config.applier
    }

    /// Make `result` the live configuration for its strategy
    ///
    /// Marginal improvements are applied with a warning, never blocked.
    pub async fn apply(&self, result: &OptimizationResult) -> Result<()> {
        let strategy = result.strategy();
        if result.original_parameters.strategy() != strategy {
            return Err(TunerError::InvalidOperation(format!(
                "cannot apply {} parameters over a {} configuration",
                strategy,
                result.original_parameters.strategy()
            )));
        }
        result.optimized_parameters.validate()?;

        if result.performance_improvement < self.config().low_improvement_threshold {
            warn!(
                "Applying low-confidence {} optimization: estimated improvement {:.3} is below {:.3}",
                strategy,
                result.performance_improvement,
                self.config().low_improvement_threshold
            );
        }

        let applied = serde_json::to_value(AppliedConfiguration::from(result))?;
        let payload = serde_json::to_value(result)?;

        // Audit and history first; the live key is only published once both exist
        let event = StoredEvent::new(EVENT_OPTIMIZATION_APPLIED, payload.clone(), Utc::now());
        self.ctx.events.append_event(&event).await?;

        self.ctx
            .cache
            .push_bounded(&history_key(strategy), payload, self.config().history_limit)
            .await?;

        let ttl = Duration::from_secs(self.config().config_ttl_hours as u64 * 3600);
        self.ctx
            .cache
            .set_with_ttl(&config_key(strategy), applied, ttl)
            .await?;

        info!(
            "Applied {} optimization for {} (estimated improvement {:+.3})",
            result.optimization_type, strategy, result.performance_improvement
        );
        Ok(())
    }

    /// Live configuration, `None` meaning "use defaults"
    pub async fn current(&self, strategy: RetrievalStrategy) -> Result<Option<AppliedConfiguration>> {
        match self.ctx.cache.get(&config_key(strategy)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Parameters the retrieval engine should use right now
    pub async fn effective_parameters(
        &self,
        strategy: RetrievalStrategy,
    ) -> Result<RetrievalParameters> {
        Ok(self
            .current(strategy)
            .await?
            .map(|applied| applied.parameters)
            .unwrap_or_else(|| RetrievalParameters::defaults_for(strategy)))
    }

    /// Applied results, newest first
    pub async fn history(&self, strategy: RetrievalStrategy) -> Result<Vec<OptimizationResult>> {
        let items = self
            .ctx
            .cache
            .list(&history_key(strategy), self.config().history_limit)
            .await?;

        items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(TunerError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TunerConfig;
    use crate::storage::{EventStore, InMemoryCache, InMemoryEventStore};
    use crate::types::ParameterField;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct ReadOnlyEventStore;

    #[async_trait]
    impl EventStore for ReadOnlyEventStore {
        async fn append_event(&self, _event: &StoredEvent) -> Result<()> {
            Err(TunerError::Database("attempt to write a readonly database".to_string()))
        }

        async fn query_events(
            &self,
            _event_type: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<StoredEvent>> {
            Ok(Vec::new())
        }
    }

    fn result_for(strategy: RetrievalStrategy, improvement: f64) -> OptimizationResult {
        let original = RetrievalParameters::defaults_for(strategy);
        OptimizationResult {
            optimized_parameters: original.with_clamped(ParameterField::MaxResults, 15.0),
            original_parameters: original,
            performance_improvement: improvement,
            improvement_basis: ImprovementBasis::Estimated,
            confidence: 0.8,
            optimization_type: OptimizationType::GridSearch,
            applied_at: Utc::now(),
            targets_met: None,
        }
    }

    #[tokio::test]
    async fn test_apply_sets_live_configuration() {
        let events = Arc::new(InMemoryEventStore::new());
        let ctx = TunerContext::new(
            Arc::new(InMemoryCache::new()),
            events.clone(),
            TunerConfig::default(),
        );
        let applier = OptimizationApplier::new(ctx);
        let result = result_for(RetrievalStrategy::HybridSearch, 0.12);

        assert!(applier.current(RetrievalStrategy::HybridSearch).await.unwrap().is_none());
        applier.apply(&result).await.unwrap();

        let live = applier
            .current(RetrievalStrategy::HybridSearch)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(live.parameters.max_results(), 15);
        assert_eq!(live.optimization_type, OptimizationType::GridSearch);

        let now = Utc::now();
        let audit = events
            .query_events(
                EVENT_OPTIMIZATION_APPLIED,
                now - chrono::Duration::minutes(1),
                now,
            )
            .await
            .unwrap();
        assert_eq!(audit.len(), 1);

        let history = applier.history(RetrievalStrategy::HybridSearch).await.unwrap();
        assert_eq!(history, vec![result]);
    }

    #[tokio::test]
    async fn test_failed_audit_leaves_configuration_unpublished() {
        let ctx = TunerContext::new(
            Arc::new(InMemoryCache::new()),
            Arc::new(ReadOnlyEventStore),
            TunerConfig::default(),
        );
        let applier = OptimizationApplier::new(ctx);

        let err = applier
            .apply(&result_for(RetrievalStrategy::HybridSearch, 0.12))
            .await
            .unwrap_err();
        assert!(matches!(err, TunerError::Database(_)));
        assert!(applier
            .current(RetrievalStrategy::HybridSearch)
            .await
            .unwrap()
            .is_none());
        assert!(applier
            .history(RetrievalStrategy::HybridSearch)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_marginal_improvement_still_applied() {
        let applier = OptimizationApplier::new(TunerContext::in_memory(TunerConfig::default()));
        applier
            .apply(&result_for(RetrievalStrategy::KeywordSearch, 0.01))
            .await
            .unwrap();
        assert!(applier
            .current(RetrievalStrategy::KeywordSearch)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_strategy_mismatch_rejected() {
        let applier = OptimizationApplier::new(TunerContext::in_memory(TunerConfig::default()));
        let mut result = result_for(RetrievalStrategy::HybridSearch, 0.1);
        result.original_parameters = RetrievalParameters::defaults_for(RetrievalStrategy::KeywordSearch);

        let err = applier.apply(&result).await.unwrap_err();
        assert!(matches!(err, TunerError::InvalidOperation(_)));
        assert!(applier
            .current(RetrievalStrategy::HybridSearch)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_history_is_bounded_newest_first() {
        let mut config = TunerConfig::default();
        config.applier.history_limit = 3;
        let applier = OptimizationApplier::new(TunerContext::in_memory(config));

        for i in 0..5 {
            applier
                .apply(&result_for(RetrievalStrategy::SemanticSearch, i as f64 / 10.0))
                .await
                .unwrap();
        }

        let history = applier.history(RetrievalStrategy::SemanticSearch).await.unwrap();
        assert_eq!(history.len(), 3);
        assert!((history[0].performance_improvement - 0.4).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_effective_parameters_fall_back_to_defaults() {
        let applier = OptimizationApplier::new(TunerContext::in_memory(TunerConfig::default()));
        let params = applier
            .effective_parameters(RetrievalStrategy::KnowledgeGraph)
            .await
            .unwrap();
        assert_eq!(params, RetrievalParameters::defaults_for(RetrievalStrategy::KnowledgeGraph));
    }
}
