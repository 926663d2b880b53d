//! Evaluation of candidate batches, optionally on a thread pool.

use std::sync::mpsc::channel;
use std::sync::Arc;

use threadpool::ThreadPool;

use crate::core::assignment::Assignment;
use crate::core::fitness::FitnessEvaluator;
use crate::core::metaheuristic::Candidate;

/// Computes fitness of many assignments at once.
///
/// Worker threads share only the immutable evaluator. Results are returned in the order of input assignments
/// regardless of the order in which workers finish.
pub struct PopulationEvaluator {
    evaluator: Arc<FitnessEvaluator>,
    pool: Option<ThreadPool>,
}

impl PopulationEvaluator {
    /// Creates evaluator which computes fitness in the calling thread.
    pub fn sequential(evaluator: FitnessEvaluator) -> Self {
        Self {
            evaluator: Arc::new(evaluator),
            pool: None,
        }
    }

    /// Creates evaluator which distributes work over the pool threads.
    pub fn parallel(evaluator: FitnessEvaluator, pool: ThreadPool) -> Self {
        Self {
            evaluator: Arc::new(evaluator),
            pool: Some(pool),
        }
    }

    pub fn evaluator(&self) -> &FitnessEvaluator {
        &self.evaluator
    }

    pub fn evaluate_one(&self, assignment: Assignment) -> Candidate {
        let fitness = self.evaluator.evaluate(&assignment);
        Candidate::new(assignment, fitness)
    }

    pub fn evaluate(&self, assignments: Vec<Assignment>) -> Vec<Candidate> {
        let pool = match &self.pool {
            Some(pool) if assignments.len() > 1 && pool.max_count() > 1 => pool,
            _ => return assignments.into_iter().map(|a| self.evaluate_one(a)).collect(),
        };

        let (tx, rx) = channel();
        for (idx, assignment) in assignments.into_iter().enumerate() {
            let tx = tx.clone();
            let evaluator = self.evaluator.clone();
            pool.execute(move || {
                let fitness = evaluator.evaluate(&assignment);
                // receiver outlives all jobs, the send can't fail
                let _ = tx.send((idx, Candidate::new(assignment, fitness)));
            });
        }
        drop(tx);

        let mut results: Vec<(usize, Candidate)> = rx.iter().collect();
        results.sort_by_key(|(idx, _)| *idx);
        results.into_iter().map(|(_, candidate)| candidate).collect()
    }
}
