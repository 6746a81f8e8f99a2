//! Optimization coordinator.
//!
//! Loads one strategy-filtered snapshot of recent records, runs every search
//! strategy against it, and keeps the proposal with the largest estimated
//! improvement over the current parameters.

use crate::config::OptimizerConfig;
use crate::context::TunerContext;
use crate::error::{Result, TunerError};
use crate::optimization::analyzer::PerformanceAnalyzer;
use crate::optimization::collector::{hours_before, PerformanceCollector};
use crate::optimization::search::{
    GradientSearch, GridSearch, RandomSearch, SearchDeadline, SearchStrategy,
};
use crate::types::{
    ImprovementBasis, OptimizationResult, RetrievalParameters, TargetMetrics,
};
use chrono::Utc;
use tracing::{debug, info, warn};

/// Runs the search strategies and picks a winner
pub struct ParameterOptimizer {
    ctx: TunerContext,
    collector: PerformanceCollector,
    analyzer: PerformanceAnalyzer,
    strategies: Vec<Box<dyn SearchStrategy>>,
}

impl ParameterOptimizer {
    pub fn new(ctx: TunerContext) -> Self {
        let strategies = default_strategies(&ctx.config.optimizer);
        Self::with_strategies(ctx, strategies)
    }

    pub fn with_strategies(ctx: TunerContext, strategies: Vec<Box<dyn SearchStrategy>>) -> Self {
        Self {
            collector: PerformanceCollector::new(ctx.clone()),
            analyzer: PerformanceAnalyzer::new(ctx.clone()),
            ctx,
            strategies,
        }
    }

    fn config(&self) -> &OptimizerConfig {
        &self.ctx.config.optimizer
    }

    /// Optimize with the configured search deadline
    pub async fn optimize(
        &self,
        current: &RetrievalParameters,
        targets: Option<&TargetMetrics>,
    ) -> Result<OptimizationResult> {
        let budget = std::time::Duration::from_millis(self.config().search_deadline_ms);
        self.optimize_with_deadline(current, targets, SearchDeadline::after(budget))
            .await
    }

    pub async fn optimize_with_deadline(
        &self,
        current: &RetrievalParameters,
        targets: Option<&TargetMetrics>,
        deadline: SearchDeadline,
    ) -> Result<OptimizationResult> {
        let strategy = current.strategy();
        let end = Utc::now();
        let start = hours_before(end, self.config().lookback_days as u64 * 24)?;

        let records = self.collector.history(Some(strategy), start, end).await?;
        let required = self.config().min_records;
        if records.len() < required {
            return Err(TunerError::InsufficientData {
                strategy,
                found: records.len(),
                required,
            });
        }

        let evaluator = self.analyzer.evaluator(&records);
        let baseline = evaluator.score(current);
        debug!(
            "Optimizing {} over {} records (current estimate {:.3})",
            strategy,
            records.len(),
            baseline
        );

        let mut winner: Option<OptimizationResult> = None;

        for search in &self.strategies {
            let Some(candidate) = search.propose(current, &evaluator, &deadline) else {
                debug!("{} produced no candidate", search.kind());
                continue;
            };

            let improvement = candidate.score - baseline;
            debug!(
                "{} proposed estimate {:.3} ({:+.3}) after {} evaluations",
                search.kind(),
                candidate.score,
                improvement,
                candidate.evaluations
            );

            if winner
                .as_ref()
                .map_or(true, |w| improvement > w.performance_improvement)
            {
                winner = Some(OptimizationResult {
                    original_parameters: current.clone(),
                    optimized_parameters: candidate.parameters,
                    performance_improvement: improvement,
                    improvement_basis: ImprovementBasis::Estimated,
                    confidence: search.confidence(),
                    optimization_type: search.kind(),
                    applied_at: Utc::now(),
                    targets_met: None,
                });
            }
        }

        let mut result = winner.ok_or_else(|| {
            TunerError::OptimizationFailed(format!(
                "no search strategy produced a candidate for {}",
                strategy
            ))
        })?;

        if let Some(targets) = targets {
            let met = evaluator
                .project(&result.optimized_parameters)
                .is_some_and(|projection| projection.meets(targets));
            if !met {
                warn!("Optimized {} parameters are not projected to meet targets", strategy);
            }
            result.targets_met = Some(met);
        }

        info!(
            "Optimized {} via {}: estimated improvement {:+.3} (confidence {:.1})",
            strategy, result.optimization_type, result.performance_improvement, result.confidence
        );

        Ok(result)
    }
}

impl std::fmt::Debug for ParameterOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterOptimizer")
            .field("strategies", &self.strategies.iter().map(|s| s.kind()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

pub fn default_strategies(config: &OptimizerConfig) -> Vec<Box<dyn SearchStrategy>> {
    vec![
        Box::new(GridSearch::new()),
        Box::new(GradientSearch::new(
            config.gradient_iterations,
            config.learning_rate,
            config.learning_rate_decay,
        )),
        Box::new(RandomSearch::new(
            config.random_samples,
            config.exploration_factor,
            config.random_seed,
        )),
    ]
}
