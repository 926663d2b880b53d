//! Best Fit with threshold policy.

use crate::core::common::{PlacementVerdict, Task};
use crate::core::datacenter::DatacenterModel;
use crate::core::placement_policy::TaskPlacementPolicy;

/// Uses the most loaded (by CPU) suitable VM.
/// VM utilization after placement should not exceed the specified `threshold` for both CPU and memory.
pub struct BestFitThreshold {
    threshold: f64,
}

impl BestFitThreshold {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl TaskPlacementPolicy for BestFitThreshold {
    fn select_vm(&mut self, task: &Task, model: &DatacenterModel) -> Option<u32> {
        let mut result: Option<u32> = None;
        let mut best_cpu_load: f64 = -1.;
        for vm in model.vms() {
            if vm.can_host(task) != PlacementVerdict::Success {
                continue;
            }
            let cpu_load_new = (vm.cpu_used() + task.cpu_demand) / vm.cpu_core as f64;
            let memory_load_new = (vm.memory_used() + task.memory_demand) / vm.memory as f64;
            if cpu_load_new > best_cpu_load && cpu_load_new <= self.threshold && memory_load_new <= self.threshold {
                best_cpu_load = cpu_load_new;
                result = Some(vm.id);
            }
        }
        result
    }
}
