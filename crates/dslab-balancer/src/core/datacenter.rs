//! Datacenter state: hosts, VMs, admitted tasks and their current placement.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::core::assignment::Assignment;
use crate::core::common::{PlacementVerdict, Task, EPSILON};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CapacityError {
    #[error("vm #{vm_id} exceeds its capacity: cpu {cpu_used:.3}/{cpu_core}, memory {memory_used:.3}/{memory}")]
    OverCapacity {
        vm_id: u32,
        cpu_used: f64,
        cpu_core: u32,
        memory_used: f64,
        memory: u64,
    },
    #[error("host #{pm_id} has not enough free resources for a vm with {cpu_core} cores and {memory} GB")]
    HostFull { pm_id: u32, cpu_core: u32, memory: u64 },
    #[error("unknown vm #{0}")]
    UnknownVm(u32),
    #[error("unknown host #{0}")]
    UnknownPm(u32),
    #[error("task #{0} is not admitted")]
    UnknownTask(u32),
}

/// Physical host, which owns its VMs.
#[derive(Clone, Debug)]
pub struct PhysicalMachine {
    pub id: u32,
    pub cpu_core: u32,
    /// CPU speed in MHz.
    pub cpu_speed: f64,
    pub memory: u64,
    pub vms: BTreeSet<u32>,
}

impl PhysicalMachine {
    fn new(id: u32, cpu_core: u32, cpu_speed: f64, memory: u64) -> Self {
        Self {
            id,
            cpu_core,
            cpu_speed,
            memory,
            vms: BTreeSet::new(),
        }
    }
}

/// Virtual machine with fixed capacity and a set of hosted tasks.
#[derive(Clone, Debug)]
pub struct VirtualMachine {
    pub id: u32,
    pub pm_id: u32,
    pub cpu_core: u32,
    pub memory: u64,
    pub tasks: BTreeSet<u32>,
    cpu_used: f64,
    memory_used: f64,
}

impl VirtualMachine {
    fn new(id: u32, pm_id: u32, cpu_core: u32, memory: u64) -> Self {
        Self {
            id,
            pm_id,
            cpu_core,
            memory,
            tasks: BTreeSet::new(),
            cpu_used: 0.,
            memory_used: 0.,
        }
    }

    pub fn cpu_used(&self) -> f64 {
        self.cpu_used
    }

    pub fn memory_used(&self) -> f64 {
        self.memory_used
    }

    pub fn cpu_available(&self) -> f64 {
        (self.cpu_core as f64 - self.cpu_used).max(0.)
    }

    pub fn memory_available(&self) -> f64 {
        (self.memory as f64 - self.memory_used).max(0.)
    }

    pub fn cpu_utilization(&self) -> f64 {
        if self.cpu_core == 0 {
            return 0.;
        }
        (self.cpu_used / self.cpu_core as f64).clamp(0., 1.)
    }

    pub fn memory_utilization(&self) -> f64 {
        if self.memory == 0 {
            return 0.;
        }
        (self.memory_used / self.memory as f64).clamp(0., 1.)
    }

    /// Checks if the task fits into the remaining capacity of this VM.
    pub fn can_host(&self, task: &Task) -> PlacementVerdict {
        if self.cpu_used + task.cpu_demand > self.cpu_core as f64 + EPSILON {
            return PlacementVerdict::NotEnoughCpu;
        }
        if self.memory_used + task.memory_demand > self.memory as f64 + EPSILON {
            return PlacementVerdict::NotEnoughMemory;
        }
        PlacementVerdict::Success
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Capacity of a single VM as seen by the fitness function.
#[derive(Clone, Debug, PartialEq)]
pub struct VmCapacity {
    pub id: u32,
    pub cpu_core: u32,
    pub memory: u64,
    /// CPU speed of the host.
    pub cpu_speed: f64,
}

/// Resource demand of a single task as seen by the fitness function.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskDemand {
    pub cpu: f64,
    pub memory: f64,
    pub duration: f64,
}

/// Immutable copy of datacenter capacities and task demands.
///
/// Optimizers evaluate candidates against a snapshot, possibly from several worker threads, while the live
/// [`DatacenterModel`] is only modified by the load balancer.
#[derive(Clone, Debug, Default)]
pub struct DatacenterSnapshot {
    vms: Vec<VmCapacity>,
    vm_index: BTreeMap<u32, usize>,
    tasks: BTreeMap<u32, TaskDemand>,
}

impl DatacenterSnapshot {
    /// VMs in the order of their IDs.
    pub fn vms(&self) -> &[VmCapacity] {
        &self.vms
    }

    pub fn vm_position(&self, vm_id: u32) -> Option<usize> {
        self.vm_index.get(&vm_id).copied()
    }

    pub fn task(&self, task_id: u32) -> Option<&TaskDemand> {
        self.tasks.get(&task_id)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Single-writer model of the datacenter.
///
/// Keeps hosts, VMs and admitted tasks. An admitted task is either placed on a VM or waits for placement.
/// The model never holds a placement that exceeds VM capacity.
#[derive(Clone, Debug, Default)]
pub struct DatacenterModel {
    pms: BTreeMap<u32, PhysicalMachine>,
    vms: BTreeMap<u32, VirtualMachine>,
    tasks: BTreeMap<u32, Task>,
    placement: Assignment,
}

impl DatacenterModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a host and returns its ID.
    pub fn add_pm(&mut self, cpu_core: u32, cpu_speed: f64, memory: u64) -> u32 {
        let id = self.pms.len() as u32;
        self.pms.insert(id, PhysicalMachine::new(id, cpu_core, cpu_speed, memory));
        id
    }

    /// Adds a VM to the specified host and returns VM ID. VMs can't overcommit host resources.
    pub fn add_vm(&mut self, pm_id: u32, cpu_core: u32, memory: u64) -> Result<u32, CapacityError> {
        let pm = self.pms.get(&pm_id).ok_or(CapacityError::UnknownPm(pm_id))?;
        let cpu_allocated: u32 = pm.vms.iter().map(|vm| self.vms[vm].cpu_core).sum();
        let memory_allocated: u64 = pm.vms.iter().map(|vm| self.vms[vm].memory).sum();
        if cpu_allocated + cpu_core > pm.cpu_core || memory_allocated + memory > pm.memory {
            return Err(CapacityError::HostFull {
                pm_id,
                cpu_core,
                memory,
            });
        }
        let id = self.vms.len() as u32;
        self.vms.insert(id, VirtualMachine::new(id, pm_id, cpu_core, memory));
        if let Some(pm) = self.pms.get_mut(&pm_id) {
            pm.vms.insert(id);
        }
        Ok(id)
    }

    pub fn pm(&self, pm_id: u32) -> Option<&PhysicalMachine> {
        self.pms.get(&pm_id)
    }

    pub fn pms(&self) -> impl Iterator<Item = &PhysicalMachine> {
        self.pms.values()
    }

    pub fn vm(&self, vm_id: u32) -> Option<&VirtualMachine> {
        self.vms.get(&vm_id)
    }

    pub fn vms(&self) -> impl Iterator<Item = &VirtualMachine> {
        self.vms.values()
    }

    pub fn vm_ids(&self) -> Vec<u32> {
        self.vms.keys().copied().collect()
    }

    pub fn vm_count(&self) -> usize {
        self.vms.len()
    }

    pub fn task(&self, task_id: u32) -> Option<&Task> {
        self.tasks.get(&task_id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Returns the VM hosting the specified task.
    pub fn vm_of(&self, task_id: u32) -> Option<u32> {
        self.placement.get(task_id)
    }

    /// Returns IDs of admitted tasks which are not placed on any VM.
    pub fn unplaced_tasks(&self) -> Vec<u32> {
        self.tasks
            .keys()
            .filter(|task| !self.placement.contains(**task))
            .copied()
            .collect()
    }

    /// Registers a task without placing it.
    pub fn admit(&mut self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    /// Checks if the admitted task fits into the remaining capacity of the VM.
    pub fn can_place(&self, task: &Task, vm_id: u32) -> PlacementVerdict {
        match self.vms.get(&vm_id) {
            Some(vm) => vm.can_host(task),
            None => PlacementVerdict::VmNotFound,
        }
    }

    /// Places an admitted task on the VM, moving it if it is already placed elsewhere.
    pub fn place(&mut self, task_id: u32, vm_id: u32) -> Result<(), CapacityError> {
        let task = self.tasks.get(&task_id).ok_or(CapacityError::UnknownTask(task_id))?.clone();
        if self.placement.get(task_id) == Some(vm_id) {
            return Ok(());
        }
        let vm = self.vms.get(&vm_id).ok_or(CapacityError::UnknownVm(vm_id))?;
        if vm.can_host(&task) != PlacementVerdict::Success {
            return Err(CapacityError::OverCapacity {
                vm_id,
                cpu_used: vm.cpu_used + task.cpu_demand,
                cpu_core: vm.cpu_core,
                memory_used: vm.memory_used + task.memory_demand,
                memory: vm.memory,
            });
        }
        self.unplace(&task);
        if let Some(vm) = self.vms.get_mut(&vm_id) {
            vm.cpu_used += task.cpu_demand;
            vm.memory_used += task.memory_demand;
            vm.tasks.insert(task_id);
        }
        self.placement.insert(task_id, vm_id);
        Ok(())
    }

    /// Removes the task from the model, e.g. upon its completion.
    pub fn release(&mut self, task_id: u32) -> Option<Task> {
        let task = self.tasks.remove(&task_id)?;
        self.unplace(&task);
        Some(task)
    }

    fn unplace(&mut self, task: &Task) {
        if let Some(vm_id) = self.placement.remove(task.id) {
            if let Some(vm) = self.vms.get_mut(&vm_id) {
                vm.cpu_used = (vm.cpu_used - task.cpu_demand).max(0.);
                vm.memory_used = (vm.memory_used - task.memory_demand).max(0.);
                vm.tasks.remove(&task.id);
            }
        }
    }

    /// Returns the current placement of all placed tasks.
    pub fn current_assignment(&self) -> Assignment {
        self.placement.clone()
    }

    /// Computes per-VM `(cpu, memory)` load implied by the assignment.
    fn loads(&self, assignment: &Assignment) -> Result<BTreeMap<u32, (f64, f64)>, CapacityError> {
        let mut loads: BTreeMap<u32, (f64, f64)> = self.vms.keys().map(|vm| (*vm, (0., 0.))).collect();
        for (task_id, vm_id) in assignment.iter() {
            let task = self.tasks.get(task_id).ok_or(CapacityError::UnknownTask(*task_id))?;
            let load = loads.get_mut(vm_id).ok_or(CapacityError::UnknownVm(*vm_id))?;
            load.0 += task.cpu_demand;
            load.1 += task.memory_demand;
        }
        Ok(loads)
    }

    fn check_capacity(&self, loads: &BTreeMap<u32, (f64, f64)>) -> Result<(), CapacityError> {
        for (vm_id, (cpu, memory)) in loads.iter() {
            let vm = &self.vms[vm_id];
            if *cpu > vm.cpu_core as f64 + EPSILON || *memory > vm.memory as f64 + EPSILON {
                return Err(CapacityError::OverCapacity {
                    vm_id: *vm_id,
                    cpu_used: *cpu,
                    cpu_core: vm.cpu_core,
                    memory_used: *memory,
                    memory: vm.memory,
                });
            }
        }
        Ok(())
    }

    /// Checks that the assignment refers to admitted tasks and existing VMs and respects VM capacities.
    pub fn is_feasible(&self, assignment: &Assignment) -> bool {
        self.loads(assignment)
            .and_then(|loads| self.check_capacity(&loads))
            .is_ok()
    }

    /// Replaces the current placement with the specified assignment.
    ///
    /// The assignment is applied atomically: if some VM would exceed its capacity, an error is returned and the model
    /// is left unchanged. Admitted tasks missing from the assignment become unplaced.
    pub fn apply_assignment(&mut self, assignment: Assignment) -> Result<(), CapacityError> {
        let loads = self.loads(&assignment)?;
        self.check_capacity(&loads)?;
        for vm in self.vms.values_mut() {
            let (cpu, memory) = loads[&vm.id];
            vm.cpu_used = cpu;
            vm.memory_used = memory;
            vm.tasks.clear();
        }
        for (task_id, vm_id) in assignment.iter() {
            if let Some(vm) = self.vms.get_mut(vm_id) {
                vm.tasks.insert(*task_id);
            }
        }
        self.placement = assignment;
        Ok(())
    }

    /// Returns CPU utilization of the VM in `[0, 1]`.
    pub fn utilization_of(&self, vm_id: u32) -> f64 {
        self.vms.get(&vm_id).map_or(0., |vm| vm.cpu_utilization())
    }

    pub fn memory_utilization_of(&self, vm_id: u32) -> f64 {
        self.vms.get(&vm_id).map_or(0., |vm| vm.memory_utilization())
    }

    /// Returns `(cpu, memory)` utilization of the host aggregated over its VMs and weighted by VM capacity.
    pub fn pm_utilization(&self, pm_id: u32) -> (f64, f64) {
        let pm = match self.pms.get(&pm_id) {
            Some(pm) => pm,
            None => return (0., 0.),
        };
        let (mut cpu_used, mut cpu_total, mut memory_used, mut memory_total) = (0., 0., 0., 0.);
        for vm in pm.vms.iter().filter_map(|vm| self.vms.get(vm)) {
            cpu_used += vm.cpu_used;
            cpu_total += vm.cpu_core as f64;
            memory_used += vm.memory_used;
            memory_total += vm.memory as f64;
        }
        let ratio = |used: f64, total: f64| if total > 0. { (used / total).clamp(0., 1.) } else { 0. };
        (ratio(cpu_used, cpu_total), ratio(memory_used, memory_total))
    }

    /// Checks whether some VM could host the task if it were empty.
    pub fn fits_any_vm(&self, task: &Task) -> bool {
        self.vms.values().any(|vm| {
            task.cpu_demand <= vm.cpu_core as f64 + EPSILON && task.memory_demand <= vm.memory as f64 + EPSILON
        })
    }

    /// Creates an immutable snapshot of VM capacities and demands of all admitted tasks.
    pub fn snapshot(&self) -> DatacenterSnapshot {
        let vms: Vec<VmCapacity> = self
            .vms
            .values()
            .map(|vm| VmCapacity {
                id: vm.id,
                cpu_core: vm.cpu_core,
                memory: vm.memory,
                cpu_speed: self.pms.get(&vm.pm_id).map_or(1., |pm| pm.cpu_speed),
            })
            .collect();
        let vm_index = vms.iter().enumerate().map(|(idx, vm)| (vm.id, idx)).collect();
        let tasks = self
            .tasks
            .values()
            .map(|task| {
                (
                    task.id,
                    TaskDemand {
                        cpu: task.cpu_demand,
                        memory: task.memory_demand,
                        duration: task.duration,
                    },
                )
            })
            .collect();
        DatacenterSnapshot { vms, vm_index, tasks }
    }
}
