mod common;
use common::{assert_float_eq, config_for, place_unit_tasks, search_state, task, two_vm_model};

use rstest::rstest;
use threadpool::ThreadPool;

use dslab_balancer::core::assignment::Assignment;
use dslab_balancer::core::config::{Algorithm, GwoConfig, PcoConfig, PsoConfig};
use dslab_balancer::core::datacenter::DatacenterModel;
use dslab_balancer::core::fitness::{FitnessEvaluator, FitnessWeights};
use dslab_balancer::core::metaheuristic::{optimizer_resolver, Candidate, Metaheuristic, Population};
use dslab_balancer::core::metaheuristics::gwo::GreyWolf;
use dslab_balancer::core::metaheuristics::pco::PlantCompetition;
use dslab_balancer::core::metaheuristics::pso::ParticleSwarm;
use dslab_balancer::core::population_evaluator::PopulationEvaluator;

/// Eight tasks with different demands, all placed on the first of four VMs.
fn skewed_model() -> DatacenterModel {
    let mut model = DatacenterModel::new();
    for _ in 0..4 {
        let pm = model.add_pm(8, 1000., 16);
        model.add_vm(pm, 8, 16).unwrap();
    }
    for id in 0..8 {
        model.admit(task(id, 0.5 + 0.25 * (id % 3) as f64));
        model.place(id, 0).unwrap();
    }
    model
}

fn candidate(fitness: f64) -> Candidate {
    Candidate::new(Assignment::new(), fitness)
}

#[test]
fn test_has_converged_is_strict() {
    let pco = PlantCompetition::new(PcoConfig::default());
    assert!(!pco.has_converged(&candidate(1.), &candidate(0.5), 0.5));
    assert!(pco.has_converged(&candidate(1.), &candidate(0.5), 0.5000001));
    assert!(pco.has_converged(&candidate(0.5), &candidate(0.5), 1e-6));
    assert!(!pco.has_converged(&candidate(0.5), &candidate(0.5), 0.));
}

#[test]
fn test_population_best_and_ranking() {
    let population = Population::new(vec![candidate(3.), candidate(1.), candidate(2.), candidate(1.)]);
    assert_eq!(population.ranking(), vec![1, 3, 2, 0]);
    assert!(std::ptr::eq(population.best().unwrap(), &population.candidates()[1]));
    assert!(Population::default().best().is_none());
}

#[rstest]
#[case(Algorithm::Pco)]
#[case(Algorithm::Pso)]
#[case(Algorithm::Gwo)]
fn test_best_fitness_never_increases(#[case] algorithm: Algorithm) {
    let model = skewed_model();
    let config = config_for(algorithm);
    let mut optimizer = optimizer_resolver(algorithm, &config.metaheuristics);
    let mut search = search_state(&model, 1);
    let seed = model.current_assignment();
    let seed_fitness = search.evaluate_one(seed.clone()).fitness;

    let result = optimizer.run(&seed, &mut search);

    // zero convergence threshold exhausts the iteration budget
    assert!(!result.converged);
    assert_eq!(result.iterations, 20);
    assert_eq!(result.history.len(), 21);
    for pair in result.history.windows(2) {
        assert!(pair[1] <= pair[0]);
    }
    assert_eq!(*result.history.last().unwrap(), result.best.fitness);
    assert!(result.best.fitness <= seed_fitness);
    assert_eq!(result.best.assignment.len(), 8);
    assert_float_eq(search.evaluate_one(result.best.assignment.clone()).fitness, result.best.fitness, 1e-12);
}

#[rstest]
#[case(Algorithm::Pco)]
#[case(Algorithm::Pso)]
#[case(Algorithm::Gwo)]
fn test_same_seed_same_result(#[case] algorithm: Algorithm) {
    let model = skewed_model();
    let config = config_for(algorithm);
    let seed = model.current_assignment();

    let mut results = Vec::new();
    for _ in 0..2 {
        let mut optimizer = optimizer_resolver(algorithm, &config.metaheuristics);
        let mut search = search_state(&model, 17);
        results.push(optimizer.run(&seed, &mut search));
    }
    assert_eq!(results[0].best, results[1].best);
    assert_eq!(results[0].history, results[1].history);
}

#[rstest]
#[case(Algorithm::Pco)]
#[case(Algorithm::Pso)]
#[case(Algorithm::Gwo)]
fn test_optimizer_spreads_load(#[case] algorithm: Algorithm) {
    let model = skewed_model();
    let config = config_for(algorithm);
    let mut optimizer = optimizer_resolver(algorithm, &config.metaheuristics);
    let mut search = search_state(&model, 3);
    let result = optimizer.run(&model.current_assignment(), &mut search);

    assert!(result.best.assignment.tasks_on(0).len() < 8);
    let breakdown = search.evaluator().evaluator().breakdown(&result.best.assignment);
    assert_float_eq(breakdown.overload, 0., 1e-12);
}

#[test]
fn test_convergence_stops_early() {
    let mut model = two_vm_model();
    place_unit_tasks(&mut model, 0..2, 0);
    let mut pco = PlantCompetition::new(PcoConfig {
        num_plants: 2,
        max_plant_number: 4,
        iterations: 50,
        convergence_threshold: 1.,
        ..PcoConfig::default()
    });
    let mut search = search_state(&model, 5);
    let result = pco.run(&model.current_assignment(), &mut search);

    // survivors are kept, so the generation best can't change by more than the threshold
    assert!(result.converged);
    assert_eq!(result.iterations, 1);
}

#[test]
fn test_pco_small_problem_within_budget() {
    let mut model = two_vm_model();
    place_unit_tasks(&mut model, 0..2, 0);
    let mut pco = PlantCompetition::new(PcoConfig {
        num_plants: 5,
        max_plant_number: 10,
        iterations: 2,
        ..PcoConfig::default()
    });
    let mut search = search_state(&model, 11);
    let result = pco.run(&model.current_assignment(), &mut search);

    assert!(result.iterations <= 2);
    let breakdown = search.evaluator().evaluator().breakdown(&result.best.assignment);
    assert_eq!(breakdown.overload, 0.);
}

#[test]
fn test_pco_keeps_population_size() {
    let model = skewed_model();
    let mut pco = PlantCompetition::new(PcoConfig {
        batch_size: 3,
        num_plants: 4,
        max_plant_number: 15,
        ..PcoConfig::default()
    });
    let mut search = search_state(&model, 2);
    let population = pco.initialize(&model.current_assignment(), 15, &mut search);
    assert_eq!(population.len(), 15);
    let best_before = population.best().unwrap().fitness;

    let next = pco.step(population, &mut search);
    assert_eq!(next.len(), 15);
    // survivors come first in rank order
    assert_eq!(next.candidates()[0].fitness, best_before);
    assert!(next.best().unwrap().fitness <= best_before);
}

#[test]
fn test_pco_perturbation_size() {
    let pco = PlantCompetition::new(PcoConfig {
        k: 0.1,
        vmax: 1,
        ..PcoConfig::default()
    });
    assert_eq!(pco.perturbation_size(1., 100), 1);
    assert_eq!(pco.perturbation_size(0.01, 100), 1);
    assert_eq!(pco.perturbation_size(1., 0), 0);

    let pco = PlantCompetition::new(PcoConfig {
        k: 0.1,
        vmax: 20,
        ..PcoConfig::default()
    });
    assert_eq!(pco.perturbation_size(1., 100), 10);
    assert_eq!(pco.perturbation_size(0.5, 100), 5);
    assert_eq!(pco.perturbation_size(1., 3), 1);
}

#[test]
fn test_pso_velocity_is_clamped() {
    let pso = ParticleSwarm::new(PsoConfig::default());
    // 0.5 * 0.2 + 1.5 * 0.5 * (3 - 1) + 1.5 * 0.5 * (2 - 1)
    assert_float_eq(pso.next_velocity(0.2, 1., 3., 2., 0.5, 0.5), 1., 1e-12);
    assert_float_eq(pso.next_velocity(0.2, 1., 1., 1., 0.5, 0.5), 0.1, 1e-12);
    assert_float_eq(pso.next_velocity(-1., 3., 0., 0., 1., 1.), -1., 1e-12);

    let pso = ParticleSwarm::new(PsoConfig {
        velocity_clamp: (-4., 4.),
        ..PsoConfig::default()
    });
    assert_float_eq(pso.next_velocity(0.2, 1., 3., 2., 0.5, 0.5), 2.35, 1e-12);
}

#[test]
fn test_pso_global_best_matches_run() {
    let model = skewed_model();
    let mut pso = ParticleSwarm::new(PsoConfig {
        num_particles: 10,
        iterations: 5,
        ..PsoConfig::default()
    });
    let mut search = search_state(&model, 8);
    let result = pso.run(&model.current_assignment(), &mut search);
    assert_eq!(pso.global_best_fitness(), result.best.fitness);
}

#[test]
fn test_gwo_exploration_decreases_linearly() {
    let gwo = GreyWolf::new(GwoConfig::default());
    assert_float_eq(gwo.exploration(0, 50), 2., 1e-12);
    assert_float_eq(gwo.exploration(25, 50), 1., 1e-12);
    assert_float_eq(gwo.exploration(50, 50), 0., 1e-12);
    assert_float_eq(gwo.exploration(3, 0), 0., 1e-12);
}

#[test]
fn test_gwo_diversity_preservation() {
    let model = skewed_model();
    let mut gwo = GreyWolf::new(GwoConfig {
        num_wolves: 10,
        iterations: 10,
        diversity_preservation: true,
        diversity_distance: 0.5,
        convergence_threshold: 0.,
        ..GwoConfig::default()
    });
    let mut search = search_state(&model, 4);
    let result = gwo.run(&model.current_assignment(), &mut search);
    assert_eq!(result.iterations, 10);
    for pair in result.history.windows(2) {
        assert!(pair[1] <= pair[0]);
    }
}

#[test]
fn test_gwo_tiny_pack() {
    let model = skewed_model();
    let mut gwo = GreyWolf::new(GwoConfig {
        num_wolves: 2,
        iterations: 3,
        ..GwoConfig::default()
    });
    let mut search = search_state(&model, 4);
    let result = gwo.run(&model.current_assignment(), &mut search);
    assert_eq!(result.history.len() as u32, result.iterations + 1);
}

#[test]
fn test_parallel_evaluation_keeps_order() {
    let model = skewed_model();
    let evaluator = FitnessEvaluator::new(model.snapshot(), FitnessWeights::default());
    let sequential = PopulationEvaluator::sequential(evaluator.clone());
    let parallel = PopulationEvaluator::parallel(evaluator, ThreadPool::new(4));

    let search = search_state(&model, 9);
    let mut rng = search.rng.clone();
    let assignments: Vec<Assignment> = (0..32).map(|_| search.space.random_assignment(&mut rng)).collect();

    let expected = sequential.evaluate(assignments.clone());
    let actual = parallel.evaluate(assignments);
    assert_eq!(expected, actual);
}
