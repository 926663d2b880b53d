//! Particle Swarm Optimization.

use rand::Rng;

use crate::core::assignment::Assignment;
use crate::core::config::PsoConfig;
use crate::core::metaheuristic::{seeded_population, Metaheuristic, Population, RunParams, SearchState};

#[derive(Clone, Debug)]
struct Particle {
    position: Vec<f64>,
    velocity: Vec<f64>,
    best_position: Vec<f64>,
    best_fitness: f64,
}

/// Swarm of particles moving in a continuous space with one coordinate per task.
///
/// Coordinates are decoded by rounding to the nearest VM index. Particle `i` of the swarm corresponds to candidate `i`
/// of the population.
pub struct ParticleSwarm {
    config: PsoConfig,
    particles: Vec<Particle>,
    global_best_position: Vec<f64>,
    global_best_fitness: f64,
}

impl ParticleSwarm {
    pub fn new(config: PsoConfig) -> Self {
        Self {
            config,
            particles: Vec::new(),
            global_best_position: Vec::new(),
            global_best_fitness: f64::INFINITY,
        }
    }

    pub fn config(&self) -> &PsoConfig {
        &self.config
    }

    /// Best fitness found by the swarm in the current run.
    pub fn global_best_fitness(&self) -> f64 {
        self.global_best_fitness
    }

    /// Computes the next velocity component clamped to the configured bounds.
    pub fn next_velocity(
        &self,
        velocity: f64,
        position: f64,
        personal_best: f64,
        global_best: f64,
        r1: f64,
        r2: f64,
    ) -> f64 {
        let (v_min, v_max) = self.config.velocity_clamp;
        let v = self.config.inertia_weight * velocity
            + self.config.cognitive_weight * r1 * (personal_best - position)
            + self.config.social_weight * r2 * (global_best - position);
        v.clamp(v_min, v_max)
    }

    fn update_global_best(&mut self) {
        for particle in self.particles.iter() {
            if particle.best_fitness < self.global_best_fitness {
                self.global_best_fitness = particle.best_fitness;
                self.global_best_position = particle.best_position.clone();
            }
        }
    }
}

impl Metaheuristic for ParticleSwarm {
    fn name(&self) -> &str {
        "PSO"
    }

    fn params(&self) -> RunParams {
        RunParams {
            population_size: self.config.num_particles,
            iterations: self.config.iterations,
            convergence_threshold: self.config.convergence_threshold,
        }
    }

    fn initialize(&mut self, seed: &Assignment, population_size: usize, search: &mut SearchState) -> Population {
        let population = seeded_population(seed, population_size, search);
        let (v_min, v_max) = self.config.velocity_clamp;
        let dimensions = search.space.task_count();

        self.particles = population
            .candidates()
            .iter()
            .map(|candidate| {
                let position = search.space.encode_continuous(&candidate.assignment);
                let velocity = (0..dimensions).map(|_| search.rng.gen_range(v_min..=v_max)).collect();
                Particle {
                    best_position: position.clone(),
                    position,
                    velocity,
                    best_fitness: candidate.fitness,
                }
            })
            .collect();
        self.global_best_fitness = f64::INFINITY;
        self.global_best_position = Vec::new();
        self.update_global_best();
        population
    }

    fn step(&mut self, _population: Population, search: &mut SearchState) -> Population {
        let upper_bound = search.space.upper_bound();
        let mut particles = std::mem::take(&mut self.particles);
        for particle in particles.iter_mut() {
            for d in 0..particle.position.len() {
                let r1: f64 = search.rng.gen();
                let r2: f64 = search.rng.gen();
                let global_best = self.global_best_position.get(d).copied().unwrap_or(particle.position[d]);
                particle.velocity[d] = self.next_velocity(
                    particle.velocity[d],
                    particle.position[d],
                    particle.best_position[d],
                    global_best,
                    r1,
                    r2,
                );
                particle.position[d] = (particle.position[d] + particle.velocity[d]).clamp(0., upper_bound);
            }
        }

        let assignments = particles
            .iter()
            .map(|p| search.space.decode_continuous(&p.position))
            .collect();
        let candidates = search.evaluate(assignments);
        for (particle, candidate) in particles.iter_mut().zip(candidates.iter()) {
            if candidate.fitness < particle.best_fitness {
                particle.best_fitness = candidate.fitness;
                particle.best_position = particle.position.clone();
            }
        }
        self.particles = particles;
        self.update_global_best();
        Population::new(candidates)
    }
}
