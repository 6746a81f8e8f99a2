use super::{Candidate, SearchDeadline, SearchStrategy};
use crate::optimization::evaluator::PerformanceEvaluator;
use crate::types::{OptimizationType, ParameterField, RetrievalParameters};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::debug;

/// Gaussian perturbation around the best point seen so far
///
/// Noise scale shrinks linearly from the exploration factor towards zero
/// across samples.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    samples: usize,
    exploration: f64,
    seed: Option<u64>,
}

impl RandomSearch {
    pub fn new(samples: usize, exploration: f64, seed: Option<u64>) -> Self {
        Self {
            samples,
            exploration,
            seed,
        }
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Noise standard deviation for sample `index`
    fn scale(&self, index: usize) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        self.exploration * (1.0 - index as f64 / self.samples as f64)
    }

    fn perturb<R: Rng>(
        &self,
        center: &RetrievalParameters,
        noise: &Normal<f64>,
        rng: &mut R,
    ) -> RetrievalParameters {
        let mut semantic = ParameterField::SemanticWeight
            .bounds()
            .clamp(center.semantic_weight() + noise.sample(rng));
        let mut keyword = ParameterField::KeywordWeight
            .bounds()
            .clamp(center.keyword_weight() + noise.sample(rng));

        let total = semantic + keyword;
        if total > 1.0 {
            semantic /= total;
            keyword /= total;
        }

        center
            .with_clamped(
                ParameterField::SimilarityThreshold,
                center.similarity_threshold() + noise.sample(rng),
            )
            .with_clamped(ParameterField::SemanticWeight, semantic)
            .with_clamped(ParameterField::KeywordWeight, keyword)
    }
}

impl Default for RandomSearch {
    fn default() -> Self {
        Self::new(20, 0.1, None)
    }
}

impl SearchStrategy for RandomSearch {
    fn kind(&self) -> OptimizationType {
        OptimizationType::RandomSearch
    }

    fn confidence(&self) -> f64 {
        0.7
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

        let mut rng = self.rng();
        let mut center = current.clone();
        let mut center_score = evaluator.score(current);
        let mut best: Option<Candidate> = None;
        let mut evaluations = 1;

        for index in 0..self.samples {
            if deadline.expired() {
                debug!("Random search stopped at deadline after {} samples", index);
                break;
            }

            let Ok(noise) = Normal::new(0.0, self.scale(index)) else {
                continue;
            };

            let parameters = self.perturb(&center, &noise, &mut rng);
            let score = evaluator.score(&parameters);
            evaluations += 1;

            if score > center_score {
                center = parameters.clone();
                center_score = score;
            }

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
