//! Core data types for the retrieval tuner
//!
//! This module defines the value objects that flow through the feedback loop:
//! retrieval parameters with their bound table, per-query performance metrics,
//! stored performance records, and optimization results.

use crate::error::{Result, TunerError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Response time (seconds) at which the response-time component of the
/// overall score bottoms out at zero.
pub const RESPONSE_TIME_CEILING_SECS: f64 = 10.0;

/// Retrieval strategy a query was served with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    SemanticSearch,
    KeywordSearch,
    HybridSearch,
    HierarchicalSearch,
    KnowledgeGraph,
}

impl RetrievalStrategy {
    pub const ALL: [RetrievalStrategy; 5] = [
        RetrievalStrategy::SemanticSearch,
        RetrievalStrategy::KeywordSearch,
        RetrievalStrategy::HybridSearch,
        RetrievalStrategy::HierarchicalSearch,
        RetrievalStrategy::KnowledgeGraph,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalStrategy::SemanticSearch => "semantic_search",
            RetrievalStrategy::KeywordSearch => "keyword_search",
            RetrievalStrategy::HybridSearch => "hybrid_search",
            RetrievalStrategy::HierarchicalSearch => "hierarchical_search",
            RetrievalStrategy::KnowledgeGraph => "knowledge_graph",
        }
    }
}

impl std::fmt::Display for RetrievalStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RetrievalStrategy {
    type Err = TunerError;

    fn from_str(s: &str) -> Result<Self> {
        RetrievalStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| TunerError::Other(format!("Unknown retrieval strategy: {}", s)))
    }
}

/// Tunable numeric parameter of a retrieval configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterField {
    SimilarityThreshold,
    MaxResults,
    SemanticWeight,
    KeywordWeight,
    KnowledgeGraphWeight,
    HierarchicalDepth,
    PersonalizationWeight,
    ContextWindow,
}

/// Closed range a parameter must stay inside
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterBounds {
    pub min: f64,
    pub max: f64,
    /// Integer-valued fields are rounded when clamped
    pub integer: bool,
}

impl ParameterBounds {
    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        let value = if value.is_finite() { value } else { self.min };
        let clamped = value.clamp(self.min, self.max);
        if self.integer {
            clamped.round()
        } else {
            clamped
        }
    }
}

impl ParameterField {
    pub const ALL: [ParameterField; 8] = [
        ParameterField::SimilarityThreshold,
        ParameterField::MaxResults,
        ParameterField::SemanticWeight,
        ParameterField::KeywordWeight,
        ParameterField::KnowledgeGraphWeight,
        ParameterField::HierarchicalDepth,
        ParameterField::PersonalizationWeight,
        ParameterField::ContextWindow,
    ];

    /// Hard-coded bound table
    pub fn bounds(&self) -> ParameterBounds {
        let (min, max, integer) = match self {
            ParameterField::SimilarityThreshold => (0.5, 0.95, false),
            ParameterField::MaxResults => (5.0, 50.0, true),
            ParameterField::SemanticWeight => (0.0, 1.0, false),
            ParameterField::KeywordWeight => (0.0, 1.0, false),
            ParameterField::KnowledgeGraphWeight => (0.0, 1.0, false),
            ParameterField::HierarchicalDepth => (1.0, 5.0, true),
            ParameterField::PersonalizationWeight => (0.0, 0.3, false),
            ParameterField::ContextWindow => (512.0, 8192.0, true),
        };
        ParameterBounds { min, max, integer }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterField::SimilarityThreshold => "similarity_threshold",
            ParameterField::MaxResults => "max_results",
            ParameterField::SemanticWeight => "semantic_weight",
            ParameterField::KeywordWeight => "keyword_weight",
            ParameterField::KnowledgeGraphWeight => "knowledge_graph_weight",
            ParameterField::HierarchicalDepth => "hierarchical_depth",
            ParameterField::PersonalizationWeight => "personalization_weight",
            ParameterField::ContextWindow => "context_window",
        }
    }
}

impl std::fmt::Display for ParameterField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Plain field-for-field mirror used for (de)serialization
///
/// Deserialization goes through `TryFrom` so a mapping that violates the
/// bound table never becomes a `RetrievalParameters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRetrievalParameters {
    strategy: RetrievalStrategy,
    similarity_threshold: f64,
    max_results: u32,
    semantic_weight: f64,
    keyword_weight: f64,
    knowledge_graph_weight: f64,
    hierarchical_depth: u32,
    reranking_enabled: bool,
    personalization_weight: f64,
    context_window: u32,
}

/// Retrieval configuration for one strategy
///
/// Immutable once constructed. Adjustments go through [`with_value`] (which
/// rejects out-of-bound values) or [`with_clamped`] (which forces them into
/// range), both of which return a new value.
///
/// [`with_value`]: RetrievalParameters::with_value
/// [`with_clamped`]: RetrievalParameters::with_clamped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRetrievalParameters", into = "RawRetrievalParameters")]
pub struct RetrievalParameters {
    strategy: RetrievalStrategy,
    similarity_threshold: f64,
    max_results: u32,
    semantic_weight: f64,
    keyword_weight: f64,
    knowledge_graph_weight: f64,
    hierarchical_depth: u32,
    reranking_enabled: bool,
    personalization_weight: f64,
    context_window: u32,
}

impl RetrievalParameters {
    /// Baseline configuration for a strategy
    pub fn defaults_for(strategy: RetrievalStrategy) -> Self {
        let (semantic_weight, keyword_weight, knowledge_graph_weight, hierarchical_depth) =
            match strategy {
                RetrievalStrategy::SemanticSearch => (1.0, 0.0, 0.0, 1),
                RetrievalStrategy::KeywordSearch => (0.0, 1.0, 0.0, 1),
                RetrievalStrategy::HybridSearch => (0.7, 0.3, 0.0, 1),
                RetrievalStrategy::HierarchicalSearch => (0.7, 0.3, 0.0, 3),
                RetrievalStrategy::KnowledgeGraph => (0.5, 0.2, 0.5, 2),
            };

        Self {
            strategy,
            similarity_threshold: 0.7,
            max_results: 10,
            semantic_weight,
            keyword_weight,
            knowledge_graph_weight,
            hierarchical_depth,
            reranking_enabled: true,
            personalization_weight: 0.1,
            context_window: 2048,
        }
    }

    pub fn strategy(&self) -> RetrievalStrategy {
        self.strategy
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    pub fn max_results(&self) -> u32 {
        self.max_results
    }

    pub fn semantic_weight(&self) -> f64 {
        self.semantic_weight
    }

    pub fn keyword_weight(&self) -> f64 {
        self.keyword_weight
    }

    pub fn knowledge_graph_weight(&self) -> f64 {
        self.knowledge_graph_weight
    }

    pub fn hierarchical_depth(&self) -> u32 {
        self.hierarchical_depth
    }

    pub fn reranking_enabled(&self) -> bool {
        self.reranking_enabled
    }

    pub fn personalization_weight(&self) -> f64 {
        self.personalization_weight
    }

    pub fn context_window(&self) -> u32 {
        self.context_window
    }

    /// Numeric value of a field, integers widened to f64
    pub fn get(&self, field: ParameterField) -> f64 {
        match field {
            ParameterField::SimilarityThreshold => self.similarity_threshold,
            ParameterField::MaxResults => self.max_results as f64,
            ParameterField::SemanticWeight => self.semantic_weight,
            ParameterField::KeywordWeight => self.keyword_weight,
            ParameterField::KnowledgeGraphWeight => self.knowledge_graph_weight,
            ParameterField::HierarchicalDepth => self.hierarchical_depth as f64,
            ParameterField::PersonalizationWeight => self.personalization_weight,
            ParameterField::ContextWindow => self.context_window as f64,
        }
    }

    /// Copy with one field replaced, rejecting values outside the bound table
    pub fn with_value(&self, field: ParameterField, value: f64) -> Result<Self> {
        let bounds = field.bounds();
        if !bounds.contains(value) {
            return Err(TunerError::InvalidParameter {
                field,
                value,
                min: bounds.min,
                max: bounds.max,
            });
        }
        Ok(self.with_clamped(field, value))
    }

    /// Copy with one field replaced, forcing the value into its bounds
    pub fn with_clamped(&self, field: ParameterField, value: f64) -> Self {
        let value = field.bounds().clamp(value);
        let mut next = self.clone();
        match field {
            ParameterField::SimilarityThreshold => next.similarity_threshold = value,
            ParameterField::MaxResults => next.max_results = value as u32,
            ParameterField::SemanticWeight => next.semantic_weight = value,
            ParameterField::KeywordWeight => next.keyword_weight = value,
            ParameterField::KnowledgeGraphWeight => next.knowledge_graph_weight = value,
            ParameterField::HierarchicalDepth => next.hierarchical_depth = value as u32,
            ParameterField::PersonalizationWeight => next.personalization_weight = value,
            ParameterField::ContextWindow => next.context_window = value as u32,
        }
        next
    }

    pub fn with_reranking(&self, enabled: bool) -> Self {
        let mut next = self.clone();
        next.reranking_enabled = enabled;
        next
    }

    /// Check every numeric field against the bound table
    pub fn validate(&self) -> Result<()> {
        for field in ParameterField::ALL {
            let value = self.get(field);
            let bounds = field.bounds();
            if !bounds.contains(value) {
                return Err(TunerError::InvalidParameter {
                    field,
                    value,
                    min: bounds.min,
                    max: bounds.max,
                });
            }
        }
        Ok(())
    }

    /// Serialize to a plain string-keyed mapping
    pub fn to_map(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            // A struct of scalars always serializes to an object
            _ => serde_json::Map::new(),
        }
    }

    /// Rebuild from a plain mapping, validating every field
    pub fn from_map(map: serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        Ok(serde_json::from_value(serde_json::Value::Object(map))?)
    }
}

impl TryFrom<RawRetrievalParameters> for RetrievalParameters {
    type Error = TunerError;

    fn try_from(raw: RawRetrievalParameters) -> Result<Self> {
        let params = Self {
            strategy: raw.strategy,
            similarity_threshold: raw.similarity_threshold,
            max_results: raw.max_results,
            semantic_weight: raw.semantic_weight,
            keyword_weight: raw.keyword_weight,
            knowledge_graph_weight: raw.knowledge_graph_weight,
            hierarchical_depth: raw.hierarchical_depth,
            reranking_enabled: raw.reranking_enabled,
            personalization_weight: raw.personalization_weight,
            context_window: raw.context_window,
        };
        params.validate()?;
        Ok(params)
    }
}

impl From<RetrievalParameters> for RawRetrievalParameters {
    fn from(params: RetrievalParameters) -> Self {
        Self {
            strategy: params.strategy,
            similarity_threshold: params.similarity_threshold,
            max_results: params.max_results,
            semantic_weight: params.semantic_weight,
            keyword_weight: params.keyword_weight,
            knowledge_graph_weight: params.knowledge_graph_weight,
            hierarchical_depth: params.hierarchical_depth,
            reranking_enabled: params.reranking_enabled,
            personalization_weight: params.personalization_weight,
            context_window: params.context_window,
        }
    }
}

/// Metric dimension of a performance measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    RelevanceScore,
    ResponseTime,
    UserSatisfaction,
    Precision,
    Recall,
    F1Score,
    OverallScore,
}

impl MetricKind {
    pub const ALL: [MetricKind; 7] = [
        MetricKind::RelevanceScore,
        MetricKind::ResponseTime,
        MetricKind::UserSatisfaction,
        MetricKind::Precision,
        MetricKind::Recall,
        MetricKind::F1Score,
        MetricKind::OverallScore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::RelevanceScore => "relevance_score",
            MetricKind::ResponseTime => "response_time",
            MetricKind::UserSatisfaction => "user_satisfaction",
            MetricKind::Precision => "precision",
            MetricKind::Recall => "recall",
            MetricKind::F1Score => "f1_score",
            MetricKind::OverallScore => "overall_score",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a single query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub relevance_score: f64,
    /// Seconds
    pub response_time: f64,
    pub user_satisfaction: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub sample_size: u32,
    pub timestamp: DateTime<Utc>,
}

impl PerformanceMetrics {
    pub fn new(
        relevance_score: f64,
        response_time: f64,
        user_satisfaction: f64,
        precision: f64,
        recall: f64,
        f1_score: f64,
        sample_size: u32,
    ) -> Self {
        Self {
            relevance_score,
            response_time,
            user_satisfaction,
            precision,
            recall,
            f1_score,
            sample_size,
            timestamp: Utc::now(),
        }
    }

    /// Build metrics with F1 derived as the harmonic mean of precision and recall
    pub fn from_precision_recall(
        relevance_score: f64,
        response_time: f64,
        user_satisfaction: f64,
        precision: f64,
        recall: f64,
        sample_size: u32,
    ) -> Self {
        let f1_score = if precision + recall > 0.0 {
            2.0 * (precision * recall) / (precision + recall)
        } else {
            0.0
        };
        Self::new(
            relevance_score,
            response_time,
            user_satisfaction,
            precision,
            recall,
            f1_score,
            sample_size,
        )
    }

    /// Same metrics stamped with an explicit time (back-fills, imports)
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Weighted summary in [0, 1]
    ///
    /// relevance 0.3, inverted response time 0.2, satisfaction 0.3, F1 0.2
    pub fn overall_score(&self) -> f64 {
        let response_component =
            1.0 - (self.response_time.max(0.0) / RESPONSE_TIME_CEILING_SECS).min(1.0);

        let score = self.relevance_score * 0.3
            + response_component * 0.2
            + self.user_satisfaction * 0.3
            + self.f1_score * 0.2;

        score.clamp(0.0, 1.0)
    }

    pub fn value(&self, metric: MetricKind) -> f64 {
        match metric {
            MetricKind::RelevanceScore => self.relevance_score,
            MetricKind::ResponseTime => self.response_time,
            MetricKind::UserSatisfaction => self.user_satisfaction,
            MetricKind::Precision => self.precision,
            MetricKind::Recall => self.recall,
            MetricKind::F1Score => self.f1_score,
            MetricKind::OverallScore => self.overall_score(),
        }
    }
}

/// Stored unit of telemetry: one query, its configuration, and its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub query_id: String,
    pub parameters: RetrievalParameters,
    pub metrics: PerformanceMetrics,
    pub timestamp: DateTime<Utc>,
}

impl PerformanceRecord {
    pub fn new(
        query_id: impl Into<String>,
        parameters: RetrievalParameters,
        metrics: PerformanceMetrics,
    ) -> Self {
        Self {
            query_id: query_id.into(),
            parameters,
            metrics,
            timestamp: Utc::now(),
        }
    }

    /// Record stamped with its metrics' timestamp rather than "now"
    pub fn observed(
        query_id: impl Into<String>,
        parameters: RetrievalParameters,
        metrics: PerformanceMetrics,
    ) -> Self {
        let timestamp = metrics.timestamp;
        Self {
            query_id: query_id.into(),
            parameters,
            metrics,
            timestamp,
        }
    }

    pub fn strategy(&self) -> RetrievalStrategy {
        self.parameters.strategy()
    }

    pub fn overall_score(&self) -> f64 {
        self.metrics.overall_score()
    }
}

/// Search algorithm that produced an optimization result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationType {
    GridSearch,
    GradientDescent,
    RandomSearch,
}

impl std::fmt::Display for OptimizationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptimizationType::GridSearch => write!(f, "grid_search"),
            OptimizationType::GradientDescent => write!(f, "gradient_descent"),
            OptimizationType::RandomSearch => write!(f, "random_search"),
        }
    }
}

/// Where an improvement figure comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementBasis {
    /// Predicted by the similarity-weighted evaluator over history
    #[default]
    Estimated,
    /// Observed from before/after windows of live records
    Measured,
}

/// Optional goals an optimization run is checked against
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetMetrics {
    pub min_relevance: Option<f64>,
    /// Seconds
    pub max_response_time: Option<f64>,
    pub min_satisfaction: Option<f64>,
}

/// Output of one optimization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub original_parameters: RetrievalParameters,
    pub optimized_parameters: RetrievalParameters,
    /// Estimated gain: evaluator score of the optimized parameters minus the
    /// evaluator score of the original ones. Not a live measurement.
    pub performance_improvement: f64,
    #[serde(default)]
    pub improvement_basis: ImprovementBasis,
    pub confidence: f64,
    pub optimization_type: OptimizationType,
    pub applied_at: DateTime<Utc>,
    /// Whether projected metrics meet the requested targets, if any were given
    #[serde(default)]
    pub targets_met: Option<bool>,
}

impl OptimizationResult {
    pub fn strategy(&self) -> RetrievalStrategy {
        self.optimized_parameters.strategy()
    }
}
