mod common;
use common::{place_unit_tasks, task};

use dslab_balancer::core::common::Task;
use dslab_balancer::core::config::ConfigError;
use dslab_balancer::core::datacenter::DatacenterModel;
use dslab_balancer::core::placement_policy::placement_policy_resolver;

/// Three VMs with 4 cores on a single host, loaded with 2, 1 and 3 unit tasks.
fn loaded_model() -> DatacenterModel {
    let mut model = DatacenterModel::new();
    let pm = model.add_pm(12, 1000., 24);
    for _ in 0..3 {
        model.add_vm(pm, 4, 8).unwrap();
    }
    place_unit_tasks(&mut model, 0..2, 0);
    place_unit_tasks(&mut model, 2..3, 1);
    place_unit_tasks(&mut model, 3..6, 2);
    model
}

#[test]
fn test_lowest_utilization() {
    let model = loaded_model();
    let mut policy = placement_policy_resolver("LowestUtilization").unwrap();
    assert_eq!(policy.select_vm(&task(10, 1.), &model), Some(1));
    // only VM 0 and VM 1 have 2 free cores, VM 1 is less loaded
    assert_eq!(policy.select_vm(&task(10, 2.), &model), Some(1));
    assert_eq!(policy.select_vm(&task(10, 4.), &model), None);
}

#[test]
fn test_lowest_utilization_prefers_smaller_id() {
    let mut model = DatacenterModel::new();
    let pm = model.add_pm(8, 1000., 16);
    model.add_vm(pm, 4, 8).unwrap();
    model.add_vm(pm, 4, 8).unwrap();
    let mut policy = placement_policy_resolver("LowestUtilization").unwrap();
    assert_eq!(policy.select_vm(&task(0, 1.), &model), Some(0));
}

#[test]
fn test_first_fit() {
    let model = loaded_model();
    let mut policy = placement_policy_resolver("FirstFit").unwrap();
    assert_eq!(policy.select_vm(&task(10, 1.), &model), Some(0));
    assert_eq!(policy.select_vm(&task(10, 3.), &model), Some(1));
    assert_eq!(policy.select_vm(&Task::new(10, 1., 20., 1., 0.), &model), None);
}

#[test]
fn test_round_robin() {
    let model = loaded_model();
    let mut policy = placement_policy_resolver("RoundRobin").unwrap();
    assert_eq!(policy.select_vm(&task(10, 1.), &model), Some(0));
    assert_eq!(policy.select_vm(&task(11, 1.), &model), Some(1));
    assert_eq!(policy.select_vm(&task(12, 1.), &model), Some(2));
    assert_eq!(policy.select_vm(&task(13, 1.), &model), Some(0));
    // VM 2 is skipped since it has a single free core
    assert_eq!(policy.select_vm(&task(14, 2.), &model), Some(1));
    assert_eq!(policy.select_vm(&task(15, 2.), &model), Some(0));
}

#[test]
fn test_best_fit_threshold() {
    let model = loaded_model();
    let mut policy = placement_policy_resolver("BestFitThreshold").unwrap();
    assert_eq!(policy.select_vm(&task(10, 1.), &model), Some(2));

    let mut policy = placement_policy_resolver("BestFitThreshold[threshold=0.75]").unwrap();
    // VM 2 would be full, VM 0 would reach exactly 0.75
    assert_eq!(policy.select_vm(&task(10, 1.), &model), Some(0));

    let mut policy = placement_policy_resolver("BestFitThreshold[threshold=0.3]").unwrap();
    assert_eq!(policy.select_vm(&task(10, 1.), &model), None);
}

#[test]
fn test_resolver_errors() {
    assert!(matches!(
        placement_policy_resolver("WorstFit"),
        Err(ConfigError::UnknownPlacementPolicy(name)) if name == "WorstFit"
    ));
    assert!(matches!(
        placement_policy_resolver("BestFitThreshold[threshold=high]"),
        Err(ConfigError::InvalidValue { field, .. }) if field == "load_balancer.placement_policy.threshold"
    ));
}
