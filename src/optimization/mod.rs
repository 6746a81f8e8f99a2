//! Retrieval performance optimization
//!
//! The feedback loop, in order:
//! - [`collector`]: per-query telemetry into the cache and the durable store
//! - [`analyzer`]: trends, correlations, bottlenecks, opportunities
//! - [`optimizer`]: grid, gradient, and random search over an evaluator
//! - [`applier`]: live configuration, audit trail, history
//! - [`monitor`]: measured before/after impact
//! - [`recommendations`]: advisory adjustments without a search
//! - [`scheduler`]: periodic closed-loop tuning

pub mod analyzer;
pub mod applier;
pub mod collector;
pub mod evaluator;
pub mod monitor;
pub mod optimizer;
pub mod recommendations;
pub mod scheduler;
pub mod search;
pub mod stats;

pub use analyzer::{
    Bottleneck, BottleneckType, Opportunity, PerformanceAnalyzer, PerformanceReport, Severity,
    TrendAnalysis, TrendDirection,
};
pub use applier::{AppliedConfiguration, OptimizationApplier};
pub use collector::PerformanceCollector;
pub use evaluator::{MetricProjection, PerformanceEvaluator};
pub use monitor::{ImpactMonitor, ImpactReport, WindowSummary};
pub use optimizer::ParameterOptimizer;
pub use recommendations::{
    Recommendation, RecommendationEngine, RecommendationType, RecommendedValue,
};
pub use scheduler::{AutoTuner, CycleReport};
pub use search::{Candidate, SearchDeadline, SearchStrategy};
pub use stats::MetricStats;
