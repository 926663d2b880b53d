mod common;
use common::{assert_float_eq, place_unit_tasks, task, two_vm_model};

use dslab_balancer::core::assignment::Assignment;
use dslab_balancer::core::common::{PlacementVerdict, Task};
use dslab_balancer::core::datacenter::{CapacityError, DatacenterModel};

#[test]
fn test_utilization() {
    let mut model = two_vm_model();
    place_unit_tasks(&mut model, 0..3, 0);

    assert_float_eq(model.utilization_of(0), 0.75, 1e-12);
    assert_float_eq(model.memory_utilization_of(0), 3. / 8., 1e-12);
    assert_float_eq(model.utilization_of(1), 0., 1e-12);
    assert_eq!(model.vm_of(2), Some(0));
    assert_eq!(model.vm(0).unwrap().tasks.len(), 3);
}

#[test]
fn test_vm_cannot_overcommit_host() {
    let mut model = DatacenterModel::new();
    let pm = model.add_pm(4, 1000., 8);
    model.add_vm(pm, 3, 4).unwrap();
    assert_eq!(
        model.add_vm(pm, 2, 2),
        Err(CapacityError::HostFull {
            pm_id: pm,
            cpu_core: 2,
            memory: 2
        })
    );
    assert_eq!(model.add_vm(7, 1, 1), Err(CapacityError::UnknownPm(7)));
    assert_eq!(model.vm_count(), 1);
}

#[test]
fn test_place_over_capacity() {
    let mut model = two_vm_model();
    place_unit_tasks(&mut model, 0..4, 0);
    model.admit(task(4, 0.5));

    assert_eq!(model.can_place(model.task(4).unwrap(), 0), PlacementVerdict::NotEnoughCpu);
    assert!(matches!(model.place(4, 0), Err(CapacityError::OverCapacity { vm_id: 0, .. })));
    assert_eq!(model.vm_of(4), None);
    assert_eq!(model.unplaced_tasks(), vec![4]);
    assert_float_eq(model.utilization_of(0), 1., 1e-12);

    model.admit(Task::new(5, 0.1, 9., 1., 0.));
    assert_eq!(model.can_place(model.task(5).unwrap(), 1), PlacementVerdict::NotEnoughMemory);
    assert_eq!(model.place(6, 1), Err(CapacityError::UnknownTask(6)));
    assert_eq!(model.place(4, 9), Err(CapacityError::UnknownVm(9)));
}

#[test]
fn test_place_moves_task() {
    let mut model = two_vm_model();
    place_unit_tasks(&mut model, 0..2, 0);
    model.place(1, 1).unwrap();

    assert_float_eq(model.utilization_of(0), 0.25, 1e-12);
    assert_float_eq(model.utilization_of(1), 0.25, 1e-12);
    assert!(!model.vm(0).unwrap().tasks.contains(&1));
}

#[test]
fn test_apply_assignment() {
    let mut model = two_vm_model();
    place_unit_tasks(&mut model, 0..4, 0);

    let assignment: Assignment = [(0, 0), (1, 1), (2, 0), (3, 1)].into_iter().collect();
    assert!(model.is_feasible(&assignment));
    model.apply_assignment(assignment.clone()).unwrap();

    assert_eq!(model.current_assignment(), assignment);
    assert_float_eq(model.utilization_of(0), 0.5, 1e-12);
    assert_float_eq(model.utilization_of(1), 0.5, 1e-12);
    assert_eq!(model.vm(1).unwrap().tasks.len(), 2);
}

#[test]
fn test_apply_assignment_is_atomic() {
    let mut model = two_vm_model();
    place_unit_tasks(&mut model, 0..3, 0);
    model.admit(task(3, 3.));
    let before = model.current_assignment();

    // 5 cores on VM 1
    let infeasible: Assignment = [(0, 0), (1, 1), (2, 1), (3, 1)].into_iter().collect();
    assert!(!model.is_feasible(&infeasible));
    assert!(matches!(
        model.apply_assignment(infeasible),
        Err(CapacityError::OverCapacity { vm_id: 1, .. })
    ));

    assert_eq!(model.current_assignment(), before);
    assert_float_eq(model.utilization_of(0), 0.75, 1e-12);
    assert_float_eq(model.utilization_of(1), 0., 1e-12);
    assert_eq!(model.unplaced_tasks(), vec![3]);

    let unknown: Assignment = [(0, 0), (42, 1)].into_iter().collect();
    assert_eq!(model.apply_assignment(unknown), Err(CapacityError::UnknownTask(42)));
    assert_eq!(model.current_assignment(), before);
}

#[test]
fn test_apply_assignment_unplaces_missing_tasks() {
    let mut model = two_vm_model();
    place_unit_tasks(&mut model, 0..2, 0);
    model.apply_assignment([(1, 1)].into_iter().collect()).unwrap();

    assert_eq!(model.unplaced_tasks(), vec![0]);
    assert_float_eq(model.utilization_of(0), 0., 1e-12);
    assert_float_eq(model.utilization_of(1), 0.25, 1e-12);
}

#[test]
fn test_release() {
    let mut model = two_vm_model();
    place_unit_tasks(&mut model, 0..2, 1);
    let released = model.release(0).unwrap();

    assert_eq!(released.id, 0);
    assert_eq!(model.task_count(), 1);
    assert_float_eq(model.utilization_of(1), 0.25, 1e-12);
    assert!(model.release(0).is_none());
}

#[test]
fn test_pm_utilization_is_capacity_weighted() {
    let mut model = DatacenterModel::new();
    let pm = model.add_pm(8, 1000., 16);
    let small = model.add_vm(pm, 2, 4).unwrap();
    model.add_vm(pm, 6, 12).unwrap();
    model.admit(Task::new(0, 2., 2., 1., 0.));
    model.place(0, small).unwrap();

    let (cpu, memory) = model.pm_utilization(pm);
    assert_float_eq(cpu, 0.25, 1e-12);
    assert_float_eq(memory, 0.125, 1e-12);
    assert_float_eq(model.utilization_of(small), 1., 1e-12);
}

#[test]
fn test_snapshot_and_vm_fit() {
    let mut model = DatacenterModel::new();
    let pm1 = model.add_pm(8, 1000., 16);
    let pm2 = model.add_pm(8, 2000., 16);
    model.add_vm(pm1, 2, 12).unwrap();
    model.add_vm(pm2, 6, 4).unwrap();
    model.admit(Task::new(0, 1.5, 2., 3., 0.));

    // neither VM holds both demands, although the per-resource maximums do
    assert!(!model.fits_any_vm(&Task::new(1, 5., 10., 1., 0.)));
    assert!(model.fits_any_vm(&Task::new(2, 6., 4., 1., 0.)));
    assert!(model.fits_any_vm(&Task::new(3, 2., 12., 1., 0.)));

    let snapshot = model.snapshot();
    assert_eq!(snapshot.vms().len(), 2);
    assert_float_eq(snapshot.vms()[1].cpu_speed, 2000., 1e-12);
    assert_eq!(snapshot.task_count(), 1);
    let demand = snapshot.task(0).unwrap();
    assert_float_eq(demand.cpu, 1.5, 1e-12);
    assert_float_eq(demand.memory, 2., 1e-12);
    assert_float_eq(demand.duration, 3., 1e-12);
}
