//! Direct task placement policies.

use crate::core::common::Task;
use crate::core::config::options::{option_or, parse_config_value, parse_options};
use crate::core::config::ConfigError;
use crate::core::datacenter::DatacenterModel;
use crate::core::placement_policies::best_fit_threshold::BestFitThreshold;
use crate::core::placement_policies::first_fit::FirstFit;
use crate::core::placement_policies::lowest_utilization::LowestUtilization;
use crate::core::placement_policies::round_robin::RoundRobin;

/// Trait for implementation of direct task placement policies.
///
/// The policy is used by the load balancer to place newly arrived tasks without running the optimizer. It returns
/// an ID of VM selected for the task or `None` if there is no VM with enough free resources, in which case the task
/// is deferred to the next rebalancing.
pub trait TaskPlacementPolicy {
    fn select_vm(&mut self, task: &Task, model: &DatacenterModel) -> Option<u32>;
}

pub fn placement_policy_resolver(config_str: &str) -> Result<Box<dyn TaskPlacementPolicy>, ConfigError> {
    let (policy_name, options) = parse_config_value(config_str);
    let options = parse_options(&options.unwrap_or_default());
    match policy_name.as_str() {
        "LowestUtilization" => Ok(Box::new(LowestUtilization::new())),
        "FirstFit" => Ok(Box::new(FirstFit::new())),
        "RoundRobin" => Ok(Box::new(RoundRobin::new())),
        "BestFitThreshold" => {
            let threshold = option_or(&options, "threshold", 1., "load_balancer.placement_policy")?;
            Ok(Box::new(BestFitThreshold::new(threshold)))
        }
        _ => Err(ConfigError::UnknownPlacementPolicy(config_str.to_string())),
    }
}
