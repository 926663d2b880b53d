//! Plant Competition Optimization.

use rand::seq::index::sample;
use rand::Rng;

use crate::core::assignment::Assignment;
use crate::core::config::PcoConfig;
use crate::core::metaheuristic::{Candidate, Metaheuristic, Population, RunParams, SearchState};

/// Plants compete for survival, survivors spread seedlings around themselves.
///
/// Each iteration keeps `num_plants` fittest plants, then survivors in rank order produce `batch_size` seedlings
/// per round until the population again contains `max_plant_number` plants. A seedling moves a few tasks of its
/// parent to other VMs, the number of moved tasks grows with `k` and the parent vigor and never exceeds `vmax`.
pub struct PlantCompetition {
    config: PcoConfig,
}

impl PlantCompetition {
    pub fn new(config: PcoConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PcoConfig {
        &self.config
    }

    /// Number of tasks perturbed in a seedling of the plant with the given vigor in (0, 1].
    pub fn perturbation_size(&self, vigor: f64, task_count: usize) -> usize {
        if task_count == 0 {
            return 0;
        }
        let growth = (self.config.k * vigor * task_count as f64).ceil() as usize;
        growth.clamp(1, self.config.vmax.max(1)).min(task_count)
    }

    fn seedling<R: Rng>(&self, parent: &[usize], moves: usize, vm_count: usize, rng: &mut R) -> Vec<usize> {
        let mut position = parent.to_vec();
        if vm_count < 2 {
            return position;
        }
        for task_idx in sample(rng, position.len(), moves).into_iter() {
            // shift by a non-zero offset to land on a different VM
            let offset = rng.gen_range(1..vm_count);
            position[task_idx] = (position[task_idx] + offset) % vm_count;
        }
        position
    }
}

impl Metaheuristic for PlantCompetition {
    fn name(&self) -> &str {
        "PCO"
    }

    fn params(&self) -> RunParams {
        RunParams {
            population_size: self.config.max_plant_number.max(self.config.num_plants),
            iterations: self.config.iterations,
            convergence_threshold: self.config.convergence_threshold,
        }
    }

    fn step(&mut self, population: Population, search: &mut SearchState) -> Population {
        let population_size = population.len();
        let mut survivors: Vec<Candidate> = population.into_ranked();
        survivors.truncate(self.config.num_plants.max(1));
        if survivors.is_empty() {
            return Population::default();
        }

        let task_count = search.space.task_count();
        let vm_count = search.space.vm_count();
        let positions: Vec<Vec<usize>> = survivors
            .iter()
            .map(|plant| search.space.encode(&plant.assignment))
            .collect();

        let seedlings_count = population_size.saturating_sub(survivors.len());
        let mut seedlings: Vec<Assignment> = Vec::with_capacity(seedlings_count);
        let batch_size = self.config.batch_size.max(1);
        'rounds: loop {
            for (rank, parent) in positions.iter().enumerate() {
                let vigor = 1. - rank as f64 / survivors.len() as f64;
                let moves = self.perturbation_size(vigor, task_count);
                for _ in 0..batch_size {
                    if seedlings.len() >= seedlings_count {
                        break 'rounds;
                    }
                    let position = self.seedling(parent, moves, vm_count, &mut search.rng);
                    seedlings.push(search.space.decode(&position));
                }
            }
        }

        let mut next = survivors;
        next.extend(search.evaluate(seedlings));
        Population::new(next)
    }
}
