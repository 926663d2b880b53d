//! Simulation configuration.

pub mod options;
pub mod sim_config;

pub use sim_config::{
    Algorithm, ConfigError, DatacenterConfig, DefaultPmConfig, GwoConfig, LoadBalancerConfig, MetaheuristicsConfig,
    PcoConfig, PmConfig, PsoConfig, SimulationConfig, TaskQueueConfig, VmConfig,
};
