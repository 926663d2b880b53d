//! Lowest utilization policy.

use crate::core::common::{PlacementVerdict, Task};
use crate::core::datacenter::DatacenterModel;
use crate::core::placement_policy::TaskPlacementPolicy;

/// Uses the least loaded (by CPU utilization) VM with enough free resources.
/// Ties are resolved in favor of the VM with smaller ID.
#[derive(Default)]
pub struct LowestUtilization;

impl LowestUtilization {
    pub fn new() -> Self {
        Self {}
    }
}

impl TaskPlacementPolicy for LowestUtilization {
    fn select_vm(&mut self, task: &Task, model: &DatacenterModel) -> Option<u32> {
        let mut result: Option<u32> = None;
        let mut min_utilization = f64::INFINITY;
        for vm in model.vms() {
            if vm.can_host(task) == PlacementVerdict::Success && vm.cpu_utilization() < min_utilization {
                min_utilization = vm.cpu_utilization();
                result = Some(vm.id);
            }
        }
        result
    }
}
