#![allow(dead_code)]

use rand::SeedableRng;
use rand_pcg::Pcg64;

use dslab_balancer::context::SimulationContext;
use dslab_balancer::core::assignment::SearchSpace;
use dslab_balancer::core::common::Task;
use dslab_balancer::core::config::{Algorithm, SimulationConfig};
use dslab_balancer::core::datacenter::DatacenterModel;
use dslab_balancer::core::fitness::{FitnessEvaluator, FitnessWeights};
use dslab_balancer::core::load_balancer::LoadBalancer;
use dslab_balancer::core::metaheuristic::SearchState;
use dslab_balancer::core::population_evaluator::PopulationEvaluator;

/// Enables log output in tests, e.g. with `RUST_LOG=debug`.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn assert_float_eq(x: f64, y: f64, eps: f64) {
    assert!(x > y - eps && x < y + eps, "{} != {}", x, y);
}

pub fn config_path(file_name: &str) -> String {
    format!("test-configs/{}", file_name)
}

pub fn load_config(file_name: &str) -> SimulationConfig {
    SimulationConfig::from_file(config_path(file_name)).unwrap()
}

pub fn config_for(algorithm: Algorithm) -> SimulationConfig {
    let mut config = load_config("balancer.yaml");
    config.load_balancer.algorithm = algorithm;
    config
}

/// Two hosts with 4 cores and 8 GB, each running a single VM of the same size (VM IDs are 0 and 1).
pub fn two_vm_model() -> DatacenterModel {
    let mut model = DatacenterModel::new();
    for _ in 0..2 {
        let pm = model.add_pm(4, 1000., 8);
        model.add_vm(pm, 4, 8).unwrap();
    }
    model
}

pub fn task(id: u32, cpu: f64) -> Task {
    Task::new(id, cpu, 1., 10., 0.)
}

/// Places tasks with 1 core and 1 GB each on the VM.
pub fn place_unit_tasks(model: &mut DatacenterModel, ids: std::ops::Range<u32>, vm_id: u32) {
    for id in ids {
        model.admit(task(id, 1.));
        model.place(id, vm_id).unwrap();
    }
}

pub fn balancer_with_tasks(algorithm: Algorithm, task_count: u32) -> LoadBalancer {
    let mut model = two_vm_model();
    place_unit_tasks(&mut model, 0..task_count, 0);
    LoadBalancer::from_config(model, &config_for(algorithm), SimulationContext::standalone("balancer")).unwrap()
}

pub fn search_state(model: &DatacenterModel, seed: u64) -> SearchState {
    let space = SearchSpace::new(model.tasks().map(|t| t.id).collect(), model.vm_ids());
    let evaluator = PopulationEvaluator::sequential(FitnessEvaluator::new(model.snapshot(), FitnessWeights::default()));
    SearchState::new(space, evaluator, Pcg64::seed_from_u64(seed), SimulationContext::standalone("optimizer"))
}
