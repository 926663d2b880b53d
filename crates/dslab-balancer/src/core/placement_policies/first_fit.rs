//! First Fit policy.

use crate::core::common::{PlacementVerdict, Task};
use crate::core::datacenter::DatacenterModel;
use crate::core::placement_policy::TaskPlacementPolicy;

/// Returns the first VM (by ID) with enough free resources.
#[derive(Default)]
pub struct FirstFit;

impl FirstFit {
    pub fn new() -> Self {
        Self {}
    }
}

impl TaskPlacementPolicy for FirstFit {
    fn select_vm(&mut self, task: &Task, model: &DatacenterModel) -> Option<u32> {
        model
            .vms()
            .find(|vm| vm.can_host(task) == PlacementVerdict::Success)
            .map(|vm| vm.id)
    }
}
