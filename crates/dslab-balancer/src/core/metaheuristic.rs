//! Population-based metaheuristics searching for task assignments.

use rand_pcg::Pcg64;
use serde::Serialize;

use crate::context::SimulationContext;
use crate::core::assignment::{Assignment, SearchSpace};
use crate::core::config::{Algorithm, MetaheuristicsConfig};
use crate::core::metaheuristics::gwo::GreyWolf;
use crate::core::metaheuristics::pco::PlantCompetition;
use crate::core::metaheuristics::pso::ParticleSwarm;
use crate::core::population_evaluator::PopulationEvaluator;
use crate::log_trace;

/// Task assignment together with its fitness.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Candidate {
    pub assignment: Assignment,
    pub fitness: f64,
}

impl Candidate {
    pub fn new(assignment: Assignment, fitness: f64) -> Self {
        Self { assignment, fitness }
    }
}

/// Ordered sequence of candidates processed by an optimizer during one run.
#[derive(Clone, Debug, Default)]
pub struct Population {
    candidates: Vec<Candidate>,
}

impl Population {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn into_candidates(self) -> Vec<Candidate> {
        self.candidates
    }

    /// Returns the candidate with the lowest fitness, the first one in case of a tie.
    pub fn best(&self) -> Option<&Candidate> {
        self.candidates
            .iter()
            .reduce(|best, c| if c.fitness < best.fitness { c } else { best })
    }

    /// Returns candidate indices sorted by fitness. Ties keep the population order.
    pub fn ranking(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.candidates.len()).collect();
        order.sort_by(|a, b| self.candidates[*a].fitness.total_cmp(&self.candidates[*b].fitness));
        order
    }

    /// Consumes the population and returns candidates sorted by fitness. Ties keep the population order.
    pub fn into_ranked(mut self) -> Vec<Candidate> {
        self.candidates.sort_by(|a, b| a.fitness.total_cmp(&b.fitness));
        self.candidates
    }
}

impl From<Vec<Candidate>> for Population {
    fn from(candidates: Vec<Candidate>) -> Self {
        Self::new(candidates)
    }
}

/// Size and stopping parameters of an optimizer run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunParams {
    pub population_size: usize,
    pub iterations: u32,
    pub convergence_threshold: f64,
}

/// Outcome of an optimizer run.
#[derive(Clone, Debug, Serialize)]
pub struct OptimizationResult {
    /// The best candidate observed during the run.
    pub best: Candidate,
    /// Whether the run stopped because of convergence rather than exhausted iteration budget.
    pub converged: bool,
    pub iterations: u32,
    /// Best fitness observed after initialization and after each iteration.
    pub history: Vec<f64>,
}

/// Everything an optimizer needs during one run besides its own parameters.
///
/// The random number generator is owned by the run, so the same seed reproduces the same search.
pub struct SearchState {
    pub space: SearchSpace,
    pub rng: Pcg64,
    /// Zero-based index of the current iteration.
    pub iteration: u32,
    pub max_iterations: u32,
    evaluator: PopulationEvaluator,
    ctx: SimulationContext,
}

impl SearchState {
    pub fn new(space: SearchSpace, evaluator: PopulationEvaluator, rng: Pcg64, ctx: SimulationContext) -> Self {
        Self {
            space,
            rng,
            iteration: 0,
            max_iterations: 0,
            evaluator,
            ctx,
        }
    }

    pub fn evaluate(&self, assignments: Vec<Assignment>) -> Vec<Candidate> {
        self.evaluator.evaluate(assignments)
    }

    pub fn evaluate_one(&self, assignment: Assignment) -> Candidate {
        self.evaluator.evaluate_one(assignment)
    }

    pub fn evaluator(&self) -> &PopulationEvaluator {
        &self.evaluator
    }

    pub fn ctx(&self) -> &SimulationContext {
        &self.ctx
    }

    /// Restricts the assignment to the tasks and VMs of the search space.
    pub fn normalize(&self, assignment: &Assignment) -> Assignment {
        self.space.decode(&self.space.encode(assignment))
    }
}

/// Builds the initial population: the seed followed by uniformly random placements.
pub fn seeded_population(seed: &Assignment, population_size: usize, search: &mut SearchState) -> Population {
    let mut assignments = Vec::with_capacity(population_size.max(1));
    assignments.push(search.normalize(seed));
    while assignments.len() < population_size {
        let random = search.space.random_assignment(&mut search.rng);
        assignments.push(random);
    }
    Population::new(search.evaluate(assignments))
}

/// Population-based optimizer of task assignments.
///
/// Implementations provide the algorithm-specific [`step`](Self::step), while [`run`](Self::run) drives iterations,
/// convergence detection and keeps the best candidate ever observed.
pub trait Metaheuristic {
    fn name(&self) -> &str;

    fn params(&self) -> RunParams;

    /// Creates the initial population which contains the seed and random candidates.
    fn initialize(&mut self, seed: &Assignment, population_size: usize, search: &mut SearchState) -> Population {
        seeded_population(seed, population_size, search)
    }

    /// Performs one iteration and returns the evaluated population of the same size.
    fn step(&mut self, population: Population, search: &mut SearchState) -> Population;

    fn has_converged(&self, prev_best: &Candidate, new_best: &Candidate, threshold: f64) -> bool {
        (prev_best.fitness - new_best.fitness).abs() < threshold
    }

    /// Searches for the best assignment starting from the seed.
    ///
    /// Stops after the iteration budget is exhausted or when the best fitness of two consecutive generations differs
    /// by less than the convergence threshold.
    fn run(&mut self, seed: &Assignment, search: &mut SearchState) -> OptimizationResult {
        let params = self.params();
        search.iteration = 0;
        search.max_iterations = params.iterations;

        let mut population = self.initialize(seed, params.population_size.max(1), search);
        let mut best = match population.best() {
            Some(best) => best.clone(),
            None => search.evaluate_one(search.normalize(seed)),
        };
        let mut generation_best = best.clone();
        let mut history = vec![best.fitness];
        let mut converged = false;
        let mut iterations = 0;

        while iterations < params.iterations {
            search.iteration = iterations;
            population = self.step(population, search);
            iterations += 1;

            let new_generation_best = match population.best() {
                Some(candidate) => candidate.clone(),
                None => break,
            };
            if new_generation_best.fitness < best.fitness {
                best = new_generation_best.clone();
            }
            history.push(best.fitness);
            log_trace!(
                search.ctx(),
                "{} iteration {}: generation best {:.6}, best {:.6}",
                self.name(),
                iterations,
                new_generation_best.fitness,
                best.fitness
            );

            if self.has_converged(&generation_best, &new_generation_best, params.convergence_threshold) {
                converged = true;
                break;
            }
            generation_best = new_generation_best;
        }

        OptimizationResult {
            best,
            converged,
            iterations,
            history,
        }
    }
}

/// Creates optimizer of the specified algorithm.
pub fn optimizer_resolver(algorithm: Algorithm, config: &MetaheuristicsConfig) -> Box<dyn Metaheuristic> {
    match algorithm {
        Algorithm::Pco => Box::new(PlantCompetition::new(config.pco.clone())),
        Algorithm::Pso => Box::new(ParticleSwarm::new(config.pso.clone())),
        Algorithm::Gwo => Box::new(GreyWolf::new(config.gwo.clone())),
    }
}
