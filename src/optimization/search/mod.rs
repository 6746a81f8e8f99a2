//! Parameter search strategies.
//!
//! Each strategy proposes one candidate parameter set from the current
//! configuration and a similarity-weighted evaluator over a fixed record
//! snapshot. The optimizer fans out to all of them and keeps the best.

mod gradient;
mod grid;
mod random;

pub use gradient::GradientSearch;
pub use grid::GridSearch;
pub use random::RandomSearch;

use crate::optimization::evaluator::PerformanceEvaluator;
use crate::types::{OptimizationType, RetrievalParameters};
use std::time::{Duration, Instant};

/// Wall-clock budget shared by the strategies of one optimization run
#[derive(Debug, Clone, Copy)]
pub struct SearchDeadline {
    expires_at: Option<Instant>,
}

impl SearchDeadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now().checked_add(budget),
        }
    }

    /// No budget; searches run to completion
    pub fn unbounded() -> Self {
        Self { expires_at: None }
    }

    pub fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Best parameter set a strategy found, with its evaluator score
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub parameters: RetrievalParameters,
    pub score: f64,
    /// Evaluator calls spent finding it
    pub evaluations: usize,
}

pub trait SearchStrategy: Send + Sync {
    fn kind(&self) -> OptimizationType;

    /// Fixed confidence attached to results from this strategy
    fn confidence(&self) -> f64;

    /// Propose a candidate, or `None` when there is nothing to search over
    /// or the deadline expired before any evaluation
    fn propose(
        &self,
        current: &RetrievalParameters,
        evaluator: &PerformanceEvaluator<'_>,
        deadline: &SearchDeadline,
    ) -> Option<Candidate>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_expiry() {
        assert!(!SearchDeadline::unbounded().expired());
        assert!(SearchDeadline::after(Duration::ZERO).expired());
        assert!(!SearchDeadline::after(Duration::from_secs(60)).expired());
    }
}
