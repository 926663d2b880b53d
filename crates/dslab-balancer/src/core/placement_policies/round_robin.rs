//! Round Robin policy.

use crate::core::common::{PlacementVerdict, Task};
use crate::core::datacenter::DatacenterModel;
use crate::core::placement_policy::TaskPlacementPolicy;

/// Cycles over VMs in the order of their IDs, skipping VMs without enough free resources.
#[derive(Default)]
pub struct RoundRobin {
    next: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self { next: 0 }
    }
}

impl TaskPlacementPolicy for RoundRobin {
    fn select_vm(&mut self, task: &Task, model: &DatacenterModel) -> Option<u32> {
        let vm_ids = model.vm_ids();
        if vm_ids.is_empty() {
            return None;
        }
        for shift in 0..vm_ids.len() {
            let idx = (self.next + shift) % vm_ids.len();
            if model.can_place(task, vm_ids[idx]) == PlacementVerdict::Success {
                self.next = (idx + 1) % vm_ids.len();
                return Some(vm_ids[idx]);
            }
        }
        None
    }
}
