//! Similarity-weighted performance estimation.
//!
//! Estimates how a candidate parameter set would perform by averaging the
//! overall scores of historical records whose parameters sit close to it.
//! Shared by the analyzer and by every search strategy.

use crate::types::{ParameterField, PerformanceRecord, RetrievalParameters, TargetMetrics};
use serde::{Deserialize, Serialize};

/// Fields compared when measuring parameter similarity
pub const SIMILARITY_FIELDS: [ParameterField; 3] = [
    ParameterField::SimilarityThreshold,
    ParameterField::SemanticWeight,
    ParameterField::KeywordWeight,
];

/// Similarity in [0, 1]: mean over the compared fields of `1 - |delta| / range`
pub fn parameter_similarity(a: &RetrievalParameters, b: &RetrievalParameters) -> f64 {
    let total: f64 = SIMILARITY_FIELDS
        .iter()
        .map(|field| {
            let range = field.bounds().range();
            let delta = (a.get(*field) - b.get(*field)).abs();
            (1.0 - delta / range).clamp(0.0, 1.0)
        })
        .sum();
    total / SIMILARITY_FIELDS.len() as f64
}

/// Similarity-weighted means of the raw metrics near a parameter set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricProjection {
    pub relevance_score: f64,
    pub response_time: f64,
    pub user_satisfaction: f64,
    /// Number of historical records that informed the projection
    pub support: usize,
}

impl MetricProjection {
    pub fn meets(&self, targets: &TargetMetrics) -> bool {
        targets
            .min_relevance
            .map_or(true, |min| self.relevance_score >= min)
            && targets
                .max_response_time
                .map_or(true, |max| self.response_time <= max)
            && targets
                .min_satisfaction
                .map_or(true, |min| self.user_satisfaction >= min)
    }
}

/// Evaluation function over an immutable snapshot of historical records
#[derive(Debug, Clone, Copy)]
pub struct PerformanceEvaluator<'a> {
    records: &'a [PerformanceRecord],
    similarity_cutoff: f64,
    baseline: f64,
}

impl<'a> PerformanceEvaluator<'a> {
    pub fn new(records: &'a [PerformanceRecord], similarity_cutoff: f64, baseline: f64) -> Self {
        Self {
            records,
            similarity_cutoff,
            baseline,
        }
    }

    pub fn records(&self) -> &'a [PerformanceRecord] {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Estimated overall score for `parameters`
    ///
    /// Falls back to the baseline when no record is similar enough.
    pub fn score(&self, parameters: &RetrievalParameters) -> f64 {
        let mut weighted = 0.0;
        let mut total_weight = 0.0;

        for (similarity, record) in self.similar(parameters) {
            weighted += similarity * record.overall_score();
            total_weight += similarity;
        }

        if total_weight > 0.0 {
            weighted / total_weight
        } else {
            self.baseline
        }
    }

    /// Projected raw metrics for `parameters`, `None` without similar history
    pub fn project(&self, parameters: &RetrievalParameters) -> Option<MetricProjection> {
        let mut relevance = 0.0;
        let mut response_time = 0.0;
        let mut satisfaction = 0.0;
        let mut total_weight = 0.0;
        let mut support = 0;

        for (similarity, record) in self.similar(parameters) {
            relevance += similarity * record.metrics.relevance_score;
            response_time += similarity * record.metrics.response_time;
            satisfaction += similarity * record.metrics.user_satisfaction;
            total_weight += similarity;
            support += 1;
        }

        if total_weight <= 0.0 {
            return None;
        }

        Some(MetricProjection {
            relevance_score: relevance / total_weight,
            response_time: response_time / total_weight,
            user_satisfaction: satisfaction / total_weight,
            support,
        })
    }

    fn similar<'p>(
        &self,
        parameters: &'p RetrievalParameters,
    ) -> impl Iterator<Item = (f64, &'a PerformanceRecord)> + 'p
    where
        'a: 'p,
    {
        let cutoff = self.similarity_cutoff;
        let records: &'a [PerformanceRecord] = self.records;
        records.iter().filter_map(move |record| {
            let similarity = parameter_similarity(parameters, &record.parameters);
            (similarity > cutoff).then_some((similarity, record))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PerformanceMetrics, RetrievalStrategy};

    fn record_with(threshold: f64, relevance: f64) -> PerformanceRecord {
        let params = RetrievalParameters::defaults_for(RetrievalStrategy::HybridSearch)
            .with_clamped(ParameterField::SimilarityThreshold, threshold);
        let metrics = PerformanceMetrics::new(relevance, 1.0, relevance, relevance, relevance, relevance, 1);
        PerformanceRecord::new("q", params, metrics)
    }

    #[test]
    fn test_identical_parameters_are_fully_similar() {
        let params = RetrievalParameters::defaults_for(RetrievalStrategy::HybridSearch);
        assert!((parameter_similarity(&params, &params) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_similarity_uses_bound_ranges() {
        let a = RetrievalParameters::defaults_for(RetrievalStrategy::HybridSearch);
        let b = a.with_clamped(ParameterField::SimilarityThreshold, 0.925);
        // threshold delta 0.225 over range 0.45 -> 0.5; other two fields 1.0
        let expected = (0.5 + 1.0 + 1.0) / 3.0;
        assert!((parameter_similarity(&a, &b) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_score_baseline_without_history() {
        let evaluator = PerformanceEvaluator::new(&[], 0.7, 0.5);
        let params = RetrievalParameters::defaults_for(RetrievalStrategy::HybridSearch);
        assert_eq!(evaluator.score(&params), 0.5);
        assert!(evaluator.project(&params).is_none());
    }

    #[test]
    fn test_score_weights_nearby_records() {
        let records = vec![record_with(0.7, 0.9), record_with(0.7, 0.7)];
        let evaluator = PerformanceEvaluator::new(&records, 0.7, 0.5);
        let params = RetrievalParameters::defaults_for(RetrievalStrategy::HybridSearch);

        let expected = (records[0].overall_score() + records[1].overall_score()) / 2.0;
        assert!((evaluator.score(&params) - expected).abs() < 1e-9);

        let projection = evaluator.project(&params).unwrap();
        assert_eq!(projection.support, 2);
        assert!((projection.relevance_score - 0.8).abs() < 1e-9);
        assert!((projection.response_time - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_distant_records_are_ignored() {
        // Semantic/keyword swapped relative to hybrid defaults: similarity well below 0.7
        let far = RetrievalParameters::defaults_for(RetrievalStrategy::KeywordSearch)
            .with_clamped(ParameterField::SimilarityThreshold, 0.95);
        let metrics = PerformanceMetrics::new(1.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1);
        let records = vec![PerformanceRecord::new("q", far, metrics)];

        let evaluator = PerformanceEvaluator::new(&records, 0.7, 0.5);
        let params = RetrievalParameters::defaults_for(RetrievalStrategy::HybridSearch);
        assert_eq!(evaluator.score(&params), 0.5);
    }

    #[test]
    fn test_similarity_cutoff_is_strict() {
        let records = vec![record_with(0.925, 0.9)];
        let params = RetrievalParameters::defaults_for(RetrievalStrategy::HybridSearch);
        let similarity = parameter_similarity(&params, &records[0].parameters);

        // Exactly at the cutoff the record is ignored
        let at_cutoff = PerformanceEvaluator::new(&records, similarity, 0.5);
        assert_eq!(at_cutoff.score(&params), 0.5);
        assert!(at_cutoff.project(&params).is_none());

        let below_cutoff = PerformanceEvaluator::new(&records, similarity - 1e-9, 0.5);
        assert!((below_cutoff.score(&params) - records[0].overall_score()).abs() < 1e-12);
        assert_eq!(below_cutoff.project(&params).unwrap().support, 1);
    }

    #[test]
    fn test_projection_meets_targets() {
        let projection = MetricProjection {
            relevance_score: 0.8,
            response_time: 2.0,
            user_satisfaction: 0.7,
            support: 3,
        };

        assert!(projection.meets(&TargetMetrics::default()));
        assert!(projection.meets(&TargetMetrics {
            min_relevance: Some(0.75),
            max_response_time: Some(2.5),
            min_satisfaction: None,
        }));
        assert!(!projection.meets(&TargetMetrics {
            min_relevance: None,
            max_response_time: None,
            min_satisfaction: Some(0.9),
        }));
    }
}
