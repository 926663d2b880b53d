//! Grey Wolf Optimizer.

use rand::Rng;

use crate::core::assignment::Assignment;
use crate::core::config::GwoConfig;
use crate::core::metaheuristic::{seeded_population, Candidate, Metaheuristic, Population, RunParams, SearchState};
use crate::log_trace;

/// Pack of wolves hunting around the three best ones (alpha, beta and delta).
///
/// Wolf `i` corresponds to candidate `i` of the population. Leaders keep their positions during an iteration, while
/// other wolves move to the mean of positions suggested by each leader.
pub struct GreyWolf {
    config: GwoConfig,
    positions: Vec<Vec<f64>>,
}

impl GreyWolf {
    pub fn new(config: GwoConfig) -> Self {
        Self {
            config,
            positions: Vec::new(),
        }
    }

    pub fn config(&self) -> &GwoConfig {
        &self.config
    }

    /// Value of the exploration coefficient at the given iteration, decreases linearly from `a_max` to zero.
    pub fn exploration(&self, iteration: u32, max_iterations: u32) -> f64 {
        if max_iterations == 0 {
            return 0.;
        }
        let progress = (iteration as f64 / max_iterations as f64).min(1.);
        self.config.a_max * (1. - progress)
    }
}

impl Metaheuristic for GreyWolf {
    fn name(&self) -> &str {
        "GWO"
    }

    fn params(&self) -> RunParams {
        RunParams {
            population_size: self.config.num_wolves,
            iterations: self.config.iterations,
            convergence_threshold: self.config.convergence_threshold,
        }
    }

    fn initialize(&mut self, seed: &Assignment, population_size: usize, search: &mut SearchState) -> Population {
        let population = seeded_population(seed, population_size, search);
        self.positions = population
            .candidates()
            .iter()
            .map(|c| search.space.encode_continuous(&c.assignment))
            .collect();
        population
    }

    fn step(&mut self, population: Population, search: &mut SearchState) -> Population {
        let ranking = population.ranking();
        if ranking.is_empty() {
            return population;
        }
        // small packs reuse the last available leader
        let leaders: Vec<usize> = (0..3).map(|i| ranking[i.min(ranking.len() - 1)]).collect();
        let leader_positions: Vec<Vec<f64>> = leaders.iter().map(|l| self.positions[*l].clone()).collect();

        let a = self.exploration(search.iteration, search.max_iterations);
        let upper_bound = search.space.upper_bound();
        let dimensions = search.space.task_count();

        let alpha_discrete = search.space.encode(&population.candidates()[leaders[0]].assignment);
        let mut movers = Vec::new();
        let mut assignments = Vec::new();
        for wolf in 0..self.positions.len() {
            if leaders.contains(&wolf) {
                continue;
            }
            let mut position = vec![0.; dimensions];
            for (d, x) in position.iter_mut().enumerate() {
                let current = self.positions[wolf][d];
                let mut sum = 0.;
                for leader in leader_positions.iter() {
                    let r1: f64 = search.rng.gen();
                    let r2: f64 = search.rng.gen();
                    let big_a = 2. * a * r1 - a;
                    let big_c = 2. * r2;
                    let distance = (big_c * leader[d] - current).abs();
                    sum += leader[d] - big_a * distance;
                }
                *x = (sum / leader_positions.len() as f64).clamp(0., upper_bound);
            }

            if self.config.diversity_preservation {
                let discrete: Vec<usize> = position.iter().map(|x| search.space.vm_index(*x)).collect();
                if search.space.distance(&discrete, &alpha_discrete) < self.config.diversity_distance {
                    log_trace!(search.ctx(), "GWO wolf {} is too close to alpha, scattering", wolf);
                    position = search
                        .space
                        .random_position(&mut search.rng)
                        .into_iter()
                        .map(|idx| idx as f64)
                        .collect();
                }
            }

            assignments.push(search.space.decode_continuous(&position));
            self.positions[wolf] = position;
            movers.push(wolf);
        }

        let mut next: Vec<Candidate> = population.into_candidates();
        for (wolf, candidate) in movers.into_iter().zip(search.evaluate(assignments)) {
            next[wolf] = candidate;
        }
        Population::new(next)
    }
}
