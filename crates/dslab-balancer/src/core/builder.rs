//! Construction of the datacenter model from topology config.

use crate::core::config::{ConfigError, DatacenterConfig, PmConfig, VmConfig};
use crate::core::datacenter::DatacenterModel;

/// Builds datacenter models from [`DatacenterConfig`].
///
/// Hosts and VMs get sequential IDs in the order of their appearance in config.
pub struct DatacenterBuilder;

impl DatacenterBuilder {
    pub fn build(config: &DatacenterConfig) -> Result<DatacenterModel, ConfigError> {
        let pms: Vec<PmConfig> = match (&config.pms, &config.default_pm_config) {
            (Some(pms), _) => pms.clone(),
            (None, Some(template)) => (0..template.pm_count)
                .map(|_| PmConfig {
                    cpu_core: template.cpu_core,
                    cpu_speed: template.cpu_speed,
                    memory: template.memory,
                    vms: template.vms.clone(),
                })
                .collect(),
            (None, None) => return Err(ConfigError::MissingField("datacenter.pms")),
        };

        let mut model = DatacenterModel::new();
        for pm in pms.iter() {
            Self::add_pm(&mut model, pm)?;
        }
        if model.vm_count() == 0 {
            return Err(ConfigError::InvalidTopology("datacenter has no VMs".to_string()));
        }
        Ok(model)
    }

    fn add_pm(model: &mut DatacenterModel, pm: &PmConfig) -> Result<u32, ConfigError> {
        if pm.cpu_core == 0 || pm.memory == 0 {
            return Err(ConfigError::InvalidTopology("host with zero capacity".to_string()));
        }
        if !(pm.cpu_speed > 0.) {
            return Err(ConfigError::InvalidTopology(format!(
                "host cpu speed must be positive, got {}",
                pm.cpu_speed
            )));
        }
        let pm_id = model.add_pm(pm.cpu_core, pm.cpu_speed, pm.memory);
        for vm in pm.vms.iter() {
            Self::add_vms(model, pm_id, vm)?;
        }
        Ok(pm_id)
    }

    fn add_vms(model: &mut DatacenterModel, pm_id: u32, vm: &VmConfig) -> Result<(), ConfigError> {
        if vm.cpu_core == 0 || vm.memory == 0 {
            return Err(ConfigError::InvalidTopology(format!(
                "vm with zero capacity on host #{}",
                pm_id
            )));
        }
        for _ in 0..vm.count {
            model
                .add_vm(pm_id, vm.cpu_core, vm.memory)
                .map_err(|e| ConfigError::InvalidTopology(e.to_string()))?;
        }
        Ok(())
    }
}
