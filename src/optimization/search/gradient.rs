use super::{Candidate, SearchDeadline, SearchStrategy};
use crate::optimization::evaluator::PerformanceEvaluator;
use crate::types::{OptimizationType, ParameterField, RetrievalParameters};
use tracing::debug;

const THRESHOLD_STEP: f64 = 0.05;
const SEMANTIC_STEP: f64 = 0.1;

/// Finite-difference hill climbing on similarity threshold and semantic weight
///
/// Keyword weight follows as `1 - semantic_weight`. Rejected steps shrink the
/// learning rate instead of moving.
#[derive(Debug, Clone)]
pub struct GradientSearch {
    iterations: usize,
    learning_rate: f64,
    decay: f64,
}

impl GradientSearch {
    pub fn new(iterations: usize, learning_rate: f64, decay: f64) -> Self {
        Self {
            iterations,
            learning_rate,
            decay,
        }
    }

    fn with_semantic(parameters: &RetrievalParameters, semantic: f64) -> RetrievalParameters {
        let next = parameters.with_clamped(ParameterField::SemanticWeight, semantic);
        let keyword = 1.0 - next.semantic_weight();
        next.with_clamped(ParameterField::KeywordWeight, keyword)
    }
}

impl Default for GradientSearch {
    fn default() -> Self {
        Self::new(10, 0.1, 0.9)
    }
}

impl SearchStrategy for GradientSearch {
    fn kind(&self) -> OptimizationType {
        OptimizationType::GradientDescent
    }

    fn confidence(&self) -> f64 {
        0.6
    }

    fn propose(
        &self,
        current: &RetrievalParameters,
        evaluator: &PerformanceEvaluator<'_>,
        deadline: &SearchDeadline,
    ) -> Option<Candidate> {
        if evaluator.is_empty() || deadline.expired() {
            return None;
        }

        let mut best = current.clone();
        let mut best_score = evaluator.score(&best);
        let mut evaluations = 1;
        let mut learning_rate = self.learning_rate;

        for iteration in 0..self.iterations {
            if deadline.expired() {
                debug!("Gradient search stopped at deadline after {} iterations", iteration);
                break;
            }

            let threshold = best.similarity_threshold();
            let semantic = best.semantic_weight();

            let threshold_nudged =
                best.with_clamped(ParameterField::SimilarityThreshold, threshold + THRESHOLD_STEP);
            let semantic_nudged = Self::with_semantic(&best, semantic + SEMANTIC_STEP);

            let threshold_gradient = (evaluator.score(&threshold_nudged) - best_score) / THRESHOLD_STEP;
            let semantic_gradient = (evaluator.score(&semantic_nudged) - best_score) / SEMANTIC_STEP;
            evaluations += 2;

            let moved = Self::with_semantic(
                &best.with_clamped(
                    ParameterField::SimilarityThreshold,
                    threshold + learning_rate * threshold_gradient,
                ),
                semantic + learning_rate * semantic_gradient,
            );
            let score = evaluator.score(&moved);
            evaluations += 1;

            if score > best_score {
                best = moved;
                best_score = score;
            } else {
                learning_rate *= self.decay;
            }
        }

        Some(Candidate {
            parameters: best,
            score: best_score,
            evaluations,
        })
    }
}
