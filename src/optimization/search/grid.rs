use super::{Candidate, SearchDeadline, SearchStrategy};
use crate::optimization::evaluator::PerformanceEvaluator;
use crate::types::{OptimizationType, ParameterField, RetrievalParameters};
use tracing::debug;

const THRESHOLDS: [f64; 4] = [0.6, 0.7, 0.8, 0.9];
const SEMANTIC_WEIGHTS: [f64; 3] = [0.5, 0.7, 0.9];
const KEYWORD_WEIGHTS: [f64; 3] = [0.1, 0.3, 0.5];
const MAX_RESULTS: [f64; 4] = [5.0, 10.0, 15.0, 20.0];

/// Exhaustive search over a fixed discretized grid
#[derive(Debug, Clone, Default)]
pub struct GridSearch;

impl GridSearch {
    pub fn new() -> Self {
        Self
    }

    /// Every grid point, other fields inherited from `current`
    pub fn grid(current: &RetrievalParameters) -> Vec<RetrievalParameters> {
        let mut points = Vec::with_capacity(
            THRESHOLDS.len() * SEMANTIC_WEIGHTS.len() * KEYWORD_WEIGHTS.len() * MAX_RESULTS.len(),
        );

        for threshold in THRESHOLDS {
            for semantic in SEMANTIC_WEIGHTS {
                for keyword in KEYWORD_WEIGHTS {
                    for max_results in MAX_RESULTS {
                        points.push(
                            current
                                .with_clamped(ParameterField::SimilarityThreshold, threshold)
                                .with_clamped(ParameterField::SemanticWeight, semantic)
                                .with_clamped(ParameterField::KeywordWeight, keyword)
                                .with_clamped(ParameterField::MaxResults, max_results),
                        );
                    }
                }
            }
        }

        points
    }
}

impl SearchStrategy for GridSearch {
    fn kind(&self) -> OptimizationType {
        OptimizationType::GridSearch
    }

    fn confidence(&self) -> f64 {
        0.8
    }

    fn propose(
        &self,
        current: &RetrievalParameters,
        evaluator: &PerformanceEvaluator<'_>,
        deadline: &SearchDeadline,
    ) -> Option<Candidate> {
        if evaluator.is_empty() {
            return None;
        }

        let mut best: Option<Candidate> = None;
        let mut evaluations = 0;

        for parameters in Self::grid(current) {
            if deadline.expired() {
                debug!("Grid search stopped at deadline after {} points", evaluations);
                break;
            }

            let score = evaluator.score(&parameters);
            evaluations += 1;

            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(Candidate {
                    parameters,
                    score,
                    evaluations,
                });
            }
        }

        best.map(|candidate| Candidate {
            evaluations,
            ..candidate
        })
    }
}
