mod common;
use common::{assert_float_eq, place_unit_tasks, task, two_vm_model};

use dslab_balancer::core::assignment::Assignment;
use dslab_balancer::core::fitness::{FitnessEvaluator, FitnessWeights};

fn evaluator_for_tasks(count: u32) -> FitnessEvaluator {
    let mut model = two_vm_model();
    for id in 0..count {
        model.admit(task(id, 1.));
    }
    FitnessEvaluator::new(model.snapshot(), FitnessWeights::default())
}

fn assignment(pairs: &[(u32, u32)]) -> Assignment {
    pairs.iter().copied().collect()
}

#[test]
fn test_evaluate_is_deterministic() {
    let evaluator = evaluator_for_tasks(4);
    let a = assignment(&[(0, 0), (1, 1), (2, 0), (3, 0)]);
    let first = evaluator.evaluate(&a);
    for _ in 0..10 {
        assert_eq!(evaluator.evaluate(&a), first);
    }
}

#[test]
fn test_breakdown_terms() {
    let evaluator = evaluator_for_tasks(4);
    let all_on_first = assignment(&[(0, 0), (1, 0), (2, 0), (3, 0)]);
    let breakdown = evaluator.breakdown(&all_on_first);

    // utilizations 1.0 and 0.0
    assert_float_eq(breakdown.imbalance, 0.25, 1e-12);
    assert_float_eq(breakdown.overload, 0., 1e-12);
    // 4 tasks with duration 10 on a host with speed 1000
    assert_float_eq(breakdown.makespan, 0.04, 1e-12);
    assert_float_eq(evaluator.evaluate(&all_on_first), 0.29, 1e-12);
}

#[test]
fn test_balanced_is_better() {
    let evaluator = evaluator_for_tasks(4);
    let balanced = assignment(&[(0, 0), (1, 1), (2, 0), (3, 1)]);
    let skewed = assignment(&[(0, 0), (1, 0), (2, 0), (3, 1)]);
    let breakdown = evaluator.breakdown(&balanced);

    assert_float_eq(breakdown.imbalance, 0., 1e-12);
    assert_float_eq(breakdown.makespan, 0.02, 1e-12);
    assert!(evaluator.evaluate(&balanced) < evaluator.evaluate(&skewed));
}

#[test]
fn test_overload_penalty() {
    let evaluator = evaluator_for_tasks(6);
    let overloaded = assignment(&[(0, 0), (1, 0), (2, 0), (3, 0), (4, 0), (5, 0)]);
    let breakdown = evaluator.breakdown(&overloaded);

    // 6 cores on a 4-core VM, memory fits
    assert_float_eq(breakdown.overload, 2., 1e-12);
    let fitness = evaluator.evaluate(&overloaded);
    assert!(fitness > 2000.);

    let feasible = assignment(&[(0, 0), (1, 0), (2, 0), (3, 1), (4, 1), (5, 1)]);
    assert_float_eq(evaluator.breakdown(&feasible).overload, 0., 1e-12);
    assert!(evaluator.evaluate(&feasible) < fitness);
}

#[test]
fn test_exact_capacity_is_not_overload() {
    let mut model = two_vm_model();
    place_unit_tasks(&mut model, 0..4, 0);
    let evaluator = FitnessEvaluator::new(model.snapshot(), FitnessWeights::default());
    assert_float_eq(evaluator.breakdown(&model.current_assignment()).overload, 0., 1e-12);
}

#[test]
fn test_custom_weights() {
    let mut model = two_vm_model();
    for id in 0..4 {
        model.admit(task(id, 1.));
    }
    let weights = FitnessWeights {
        imbalance: 2.,
        overload_penalty: 1.,
        makespan: 0.,
    };
    let evaluator = FitnessEvaluator::new(model.snapshot(), weights);
    let a = assignment(&[(0, 0), (1, 0), (2, 0), (3, 0)]);
    assert_float_eq(evaluator.evaluate(&a), 0.5, 1e-12);
}

#[test]
fn test_unknown_entries_are_ignored() {
    let evaluator = evaluator_for_tasks(2);
    let a = assignment(&[(0, 0), (1, 1)]);
    let with_garbage = assignment(&[(0, 0), (1, 1), (7, 0), (0, 0)]);
    assert_eq!(evaluator.evaluate(&a), evaluator.evaluate(&with_garbage));
}
