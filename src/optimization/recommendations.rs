//! Advisory recommendations derived from analyzer findings.
//!
//! Cheap path: no search is run. Each bottleneck or opportunity maps to one
//! fixed heuristic adjustment of the current parameters. Failures yield an
//! empty list.

use crate::config::RecommendationConfig;
use crate::context::TunerContext;
use crate::optimization::analyzer::{
    Bottleneck, BottleneckType, Opportunity, PerformanceAnalyzer, PerformanceReport, Severity,
};
use crate::types::{ParameterField, RetrievalParameters, RetrievalStrategy};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    ParameterAdjustment,
    FeatureToggle,
    StrategySwitch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecommendedValue {
    Flag(bool),
    Number(f64),
    Strategy(RetrievalStrategy),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationType,
    /// Parameter name, `reranking_enabled`, or `strategy`
    pub parameter_or_strategy: String,
    pub current_value: RecommendedValue,
    pub recommended_value: RecommendedValue,
    pub reason: String,
    pub expected_impact: f64,
    pub confidence: f64,
}

impl Recommendation {
    fn parameter(
        current: &RetrievalParameters,
        field: ParameterField,
        target: f64,
        reason: String,
        expected_impact: f64,
        confidence: f64,
    ) -> Option<Self> {
        let from = current.get(field);
        let to = current.with_clamped(field, target).get(field);
        if (to - from).abs() < 1e-9 {
            return None;
        }
        Some(Self {
            kind: RecommendationType::ParameterAdjustment,
            parameter_or_strategy: field.to_string(),
            current_value: RecommendedValue::Number(from),
            recommended_value: RecommendedValue::Number(to),
            reason,
            expected_impact,
            confidence,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RecommendationEngine {
    ctx: TunerContext,
    analyzer: PerformanceAnalyzer,
}

impl RecommendationEngine {
    pub fn new(ctx: TunerContext) -> Self {
        let analyzer = PerformanceAnalyzer::new(ctx.clone());
        Self { ctx, analyzer }
    }

    fn config(&self) -> &RecommendationConfig {
        &self.ctx.config.recommendations
    }

    /// Ranked suggestions for `current`, highest expected impact first
    pub async fn recommend(&self, current: &RetrievalParameters) -> Vec<Recommendation> {
        let window = self.config().window_hours;

        let report = match self.analyzer.analyze(Some(current.strategy()), window).await {
            Ok(report) => report,
            Err(e) => {
                warn!("No recommendations for {}: {}", current.strategy(), e);
                return Vec::new();
            }
        };

        let mut recommendations = self.from_report(current, &report);

        // Switch candidates need every strategy in view
        match self.analyzer.analyze(None, window).await {
            Ok(overall) => recommendations.extend(self.strategy_switches(current, &overall)),
            Err(e) => debug!("Skipping strategy comparison: {}", e),
        }

        recommendations.sort_by(|a, b| b.expected_impact.total_cmp(&a.expected_impact));
        recommendations
    }

    /// Recommendations for bottlenecks and parameter-tuning opportunities
    pub fn from_report(
        &self,
        current: &RetrievalParameters,
        report: &PerformanceReport,
    ) -> Vec<Recommendation> {
        let mut recommendations: Vec<Recommendation> = report
            .bottlenecks
            .iter()
            .filter_map(|bottleneck| self.for_bottleneck(current, bottleneck))
            .collect();

        for opportunity in &report.opportunities {
            if let Opportunity::ParameterTuning {
                parameter,
                best_observed_value,
                expected_impact,
                coefficient_of_variation,
                ..
            } = opportunity
            {
                recommendations.extend(Recommendation::parameter(
                    current,
                    *parameter,
                    *best_observed_value,
                    format!(
                        "{} varies widely (CV {:.2}); the best-scoring query used {}",
                        parameter, coefficient_of_variation, best_observed_value
                    ),
                    *expected_impact,
                    0.5,
                ));
            }
        }

        recommendations
    }

    fn strategy_switches(
        &self,
        current: &RetrievalParameters,
        report: &PerformanceReport,
    ) -> Vec<Recommendation> {
        report
            .opportunities
            .iter()
            .filter_map(|opportunity| match opportunity {
                Opportunity::StrategySwitch {
                    from,
                    to,
                    performance_gap,
                    expected_impact,
                    ..
                } if *to != current.strategy() => Some(Recommendation {
                    kind: RecommendationType::StrategySwitch,
                    parameter_or_strategy: "strategy".to_string(),
                    current_value: RecommendedValue::Strategy(current.strategy()),
                    recommended_value: RecommendedValue::Strategy(*to),
                    reason: format!(
                        "{} outscores {} by {:.3} in mean overall score",
                        to, from, performance_gap
                    ),
                    expected_impact: *expected_impact,
                    confidence: 0.6,
                }),
                _ => None,
            })
            .collect()
    }

    fn for_bottleneck(
        &self,
        current: &RetrievalParameters,
        bottleneck: &Bottleneck,
    ) -> Option<Recommendation> {
        let config = self.config();

        match (bottleneck.kind, bottleneck.severity) {
            (BottleneckType::ResponseTime, Severity::High) => Recommendation::parameter(
                current,
                ParameterField::MaxResults,
                current.get(ParameterField::MaxResults) - config.max_results_step_high,
                format!("Fewer results to cut latency: {}", bottleneck.description),
                0.20,
                0.8,
            ),
            (BottleneckType::ResponseTime, _) => Recommendation::parameter(
                current,
                ParameterField::MaxResults,
                current.get(ParameterField::MaxResults) - config.max_results_step_medium,
                format!("Fewer results to cut latency: {}", bottleneck.description),
                0.10,
                0.6,
            ),
            (BottleneckType::ResponseTimeP95, _) => {
                if !current.reranking_enabled() {
                    return None;
                }
                Some(Recommendation {
                    kind: RecommendationType::FeatureToggle,
                    parameter_or_strategy: "reranking_enabled".to_string(),
                    current_value: RecommendedValue::Flag(true),
                    recommended_value: RecommendedValue::Flag(false),
                    reason: format!("Skip reranking to trim tail latency: {}", bottleneck.description),
                    expected_impact: 0.15,
                    confidence: 0.6,
                })
            }
            (BottleneckType::Relevance, severity) => Recommendation::parameter(
                current,
                ParameterField::SimilarityThreshold,
                current.similarity_threshold() - config.similarity_threshold_step,
                format!("Admit more candidates: {}", bottleneck.description),
                if severity == Severity::High { 0.20 } else { 0.10 },
                0.7,
            ),
            (BottleneckType::UserSatisfaction, _) => Recommendation::parameter(
                current,
                ParameterField::PersonalizationWeight,
                current.personalization_weight() + config.personalization_step,
                format!("Lean on personalization: {}", bottleneck.description),
                0.10,
                0.6,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TunerConfig;
    use crate::optimization::collector::PerformanceCollector;
    use crate::types::{PerformanceMetrics, PerformanceRecord};
    use chrono::{Duration, Utc};

    fn engine() -> RecommendationEngine {
        RecommendationEngine::new(TunerContext::in_memory(TunerConfig::default()))
    }

    fn bottleneck(kind: BottleneckType, severity: Severity) -> Bottleneck {
        Bottleneck {
            kind,
            severity,
            description: "test".to_string(),
            metric_value: 0.0,
            threshold: 0.0,
        }
    }

    #[test]
    fn test_bottleneck_heuristics() {
        let engine = engine();
        let current = RetrievalParameters::defaults_for(RetrievalStrategy::HybridSearch);

        let high = engine
            .for_bottleneck(&current, &bottleneck(BottleneckType::ResponseTime, Severity::High))
            .unwrap();
        assert_eq!(high.recommended_value, RecommendedValue::Number(5.0));
        assert_eq!(high.expected_impact, 0.20);
        assert_eq!(high.confidence, 0.8);

        let medium = engine
            .for_bottleneck(&current, &bottleneck(BottleneckType::ResponseTime, Severity::Medium))
            .unwrap();
        assert_eq!(medium.recommended_value, RecommendedValue::Number(8.0));

        let relevance = engine
            .for_bottleneck(&current, &bottleneck(BottleneckType::Relevance, Severity::High))
            .unwrap();
        match relevance.recommended_value {
            RecommendedValue::Number(v) => assert!((v - 0.6).abs() < 1e-9),
            other => panic!("unexpected value {:?}", other),
        }

        let tail = engine
            .for_bottleneck(&current, &bottleneck(BottleneckType::ResponseTimeP95, Severity::High))
            .unwrap();
        assert_eq!(tail.kind, RecommendationType::FeatureToggle);
        assert_eq!(tail.recommended_value, RecommendedValue::Flag(false));
    }

    #[test]
    fn test_unchanged_values_are_dropped() {
        let engine = engine();
        let floor = RetrievalParameters::defaults_for(RetrievalStrategy::HybridSearch)
            .with_clamped(ParameterField::MaxResults, 5.0)
            .with_clamped(ParameterField::PersonalizationWeight, 0.3)
            .with_reranking(false);

        for kind in [
            BottleneckType::ResponseTime,
            BottleneckType::UserSatisfaction,
            BottleneckType::ResponseTimeP95,
        ] {
            assert!(engine
                .for_bottleneck(&floor, &bottleneck(kind, Severity::High))
                .is_none());
        }
    }

    #[test]
    fn test_personalization_capped() {
        let engine = engine();
        let current = RetrievalParameters::defaults_for(RetrievalStrategy::HybridSearch)
            .with_clamped(ParameterField::PersonalizationWeight, 0.28);
        let rec = engine
            .for_bottleneck(
                &current,
                &bottleneck(BottleneckType::UserSatisfaction, Severity::Medium),
            )
            .unwrap();
        match rec.recommended_value {
            RecommendedValue::Number(v) => assert!((v - 0.3).abs() < 1e-12),
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_recommend_sorted_by_impact() {
        let ctx = TunerContext::in_memory(TunerConfig::default());
        let collector = PerformanceCollector::new(ctx.clone());
        let params = RetrievalParameters::defaults_for(RetrievalStrategy::HybridSearch);

        for i in 0..10 {
            let metrics = PerformanceMetrics::new(0.4, 6.0, 0.6, 0.4, 0.4, 0.4, 1)
                .at(Utc::now() - Duration::minutes(i + 1));
            assert!(
                collector
                    .record_entry(PerformanceRecord::observed(format!("q-{}", i), params.clone(), metrics))
                    .await
            );
        }

        let recommendations = RecommendationEngine::new(ctx).recommend(&params).await;
        assert!(!recommendations.is_empty());
        assert!(recommendations
            .windows(2)
            .all(|w| w[0].expected_impact >= w[1].expected_impact));
        assert!(recommendations
            .iter()
            .any(|r| r.parameter_or_strategy == "max_results"));
    }

    #[tokio::test]
    async fn test_recommend_without_data_is_empty() {
        let params = RetrievalParameters::defaults_for(RetrievalStrategy::HybridSearch);
        assert!(engine().recommend(&params).await.is_empty());
    }

    #[tokio::test]
    async fn test_recommend_with_unrepresentable_window_is_empty() {
        // Constructed directly, so validate() never sees the window
        let mut config = TunerConfig::default();
        config.recommendations.window_hours = u32::MAX;
        let ctx = TunerContext::in_memory(config);
        let params = RetrievalParameters::defaults_for(RetrievalStrategy::HybridSearch);

        assert!(RecommendationEngine::new(ctx).recommend(&params).await.is_empty());
    }

    #[test]
    fn test_recommended_value_serializes_plain() {
        assert_eq!(serde_json::to_value(RecommendedValue::Number(0.6)).unwrap(), 0.6);
        assert_eq!(serde_json::to_value(RecommendedValue::Flag(false)).unwrap(), false);
        assert_eq!(
            serde_json::to_value(RecommendedValue::Strategy(RetrievalStrategy::KeywordSearch))
                .unwrap(),
            "keyword_search"
        );
    }
}
