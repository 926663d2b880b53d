//! Simulation configuration.

use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::fitness::FitnessWeights;

/// Error raised while reading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("can't parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("can't parse JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing required field {0}")]
    MissingField(&'static str),
    #[error("underload threshold {underload} must be less than overload threshold {overload}, both within [0, 1]")]
    InvalidThresholds { underload: f64, overload: f64 },
    #[error("unknown algorithm {0}, expected one of PCO, PSO, GWO")]
    UnknownAlgorithm(String),
    #[error("invalid value of {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("unknown placement policy {0}")]
    UnknownPlacementPolicy(String),
    #[error("invalid datacenter topology: {0}")]
    InvalidTopology(String),
}

/// Metaheuristic used for rebalancing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "PCO")]
    Pco,
    #[serde(rename = "PSO")]
    Pso,
    #[serde(rename = "GWO")]
    Gwo,
}

impl FromStr for Algorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PCO" => Ok(Algorithm::Pco),
            "PSO" => Ok(Algorithm::Pso),
            "GWO" => Ok(Algorithm::Gwo),
            _ => Err(ConfigError::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Algorithm::Pco => write!(f, "PCO"),
            Algorithm::Pso => write!(f, "PSO"),
            Algorithm::Gwo => write!(f, "GWO"),
        }
    }
}

/// Parameters of Plant Competition Optimization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcoConfig {
    /// Number of tasks in a batch delivered by the task feed.
    /// Also used as the number of seedlings produced by each survivor per round.
    pub batch_size: usize,
    /// Number of plants surviving each iteration.
    pub num_plants: usize,
    /// Population size restored after each iteration.
    pub max_plant_number: usize,
    /// Growth rate, share of tasks perturbed by the most vigorous plant.
    pub k: f64,
    /// Maximum number of tasks perturbed in a single seedling.
    pub vmax: usize,
    pub iterations: u32,
    pub convergence_threshold: f64,
}

impl Default for PcoConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            num_plants: 10,
            max_plant_number: 1000,
            k: 0.1,
            vmax: 1,
            iterations: 50,
            convergence_threshold: 1e-6,
        }
    }
}

/// Parameters of Particle Swarm Optimization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PsoConfig {
    pub batch_size: usize,
    pub num_particles: usize,
    /// Inertia weight `w`.
    pub inertia_weight: f64,
    /// Cognitive coefficient `c1`.
    pub cognitive_weight: f64,
    /// Social coefficient `c2`.
    pub social_weight: f64,
    /// Lower and upper bounds of a velocity component.
    pub velocity_clamp: (f64, f64),
    pub iterations: u32,
    pub convergence_threshold: f64,
}

impl Default for PsoConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            num_particles: 30,
            inertia_weight: 0.5,
            cognitive_weight: 1.5,
            social_weight: 1.5,
            velocity_clamp: (-1., 1.),
            iterations: 50,
            convergence_threshold: 1e-6,
        }
    }
}

/// Parameters of Grey Wolf Optimizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GwoConfig {
    pub batch_size: usize,
    pub num_wolves: usize,
    /// Initial value of the exploration coefficient `a`.
    pub a_max: f64,
    /// Whether to re-randomize wolves crowding around alpha.
    pub diversity_preservation: bool,
    /// Share of tasks which must be placed differently than by alpha for a wolf to be kept.
    pub diversity_distance: f64,
    pub iterations: u32,
    pub convergence_threshold: f64,
}

impl Default for GwoConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            num_wolves: 100,
            a_max: 2.,
            diversity_preservation: false,
            diversity_distance: 0.1,
            iterations: 50,
            convergence_threshold: 1e-6,
        }
    }
}

/// Tunables of all metaheuristics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaheuristicsConfig {
    #[serde(rename = "PCO")]
    pub pco: PcoConfig,
    #[serde(rename = "PSO")]
    pub pso: PsoConfig,
    #[serde(rename = "GWO")]
    pub gwo: GwoConfig,
}

impl MetaheuristicsConfig {
    /// Returns batch size configured for the algorithm.
    pub fn batch_size(&self, algorithm: Algorithm) -> usize {
        match algorithm {
            Algorithm::Pco => self.pco.batch_size,
            Algorithm::Pso => self.pso.batch_size,
            Algorithm::Gwo => self.gwo.batch_size,
        }
    }
}

/// Configuration of a single VM or a set of identical VMs hosted by one PM.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VmConfig {
    pub cpu_core: u32,
    /// Memory capacity in GB.
    pub memory: u64,
    /// Number of such VMs.
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

/// Configuration of a single physical machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PmConfig {
    pub cpu_core: u32,
    pub cpu_speed: f64,
    /// Memory capacity in GB.
    pub memory: u64,
    #[serde(default)]
    pub vms: Vec<VmConfig>,
}

/// Template of identical physical machines.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DefaultPmConfig {
    pub pm_count: u32,
    pub cpu_core: u32,
    pub cpu_speed: f64,
    pub memory: u64,
    #[serde(default)]
    pub vms: Vec<VmConfig>,
}

/// Datacenter topology. Explicit PM list takes precedence over the template.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DatacenterConfig {
    pub pms: Option<Vec<PmConfig>>,
    pub default_pm_config: Option<DefaultPmConfig>,
}

/// Holds raw task queue config parsed from file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct RawTaskQueueConfig {
    pub directory: Option<String>,
    pub task_count: Option<usize>,
    pub task_batch_delay: Option<f64>,
    pub cpu_utilization_period: Option<f64>,
    pub task_memory: Option<f64>,
}

/// Holds raw load balancer config parsed from file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct RawLoadBalancerConfig {
    pub default_algorithm: Option<String>,
    pub overload_threshold: Option<f64>,
    pub underload_threshold: Option<f64>,
    pub placement_policy: Option<String>,
    pub seed: Option<u64>,
    pub evaluation_threads: Option<usize>,
}

/// Holds raw simulation config parsed from file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct RawConfig {
    pub task_queue: Option<RawTaskQueueConfig>,
    pub load_balancer: Option<RawLoadBalancerConfig>,
    pub metaheuristics: Option<MetaheuristicsConfig>,
    pub datacenter: Option<DatacenterConfig>,
    pub fitness: Option<FitnessWeights>,
}

/// Workload trace and batching parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskQueueConfig {
    /// Directory with CPU utilization traces.
    pub directory: Option<String>,
    /// Maximum number of tasks read from traces, 0 means no limit.
    pub task_count: usize,
    /// Simulated time between consecutive batches.
    pub task_batch_delay: f64,
    /// Period of utilization sampling.
    pub cpu_utilization_period: f64,
    /// Memory demand in GB assigned to trace tasks.
    pub task_memory: f64,
}

/// Load balancer parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerConfig {
    pub algorithm: Algorithm,
    pub overload_threshold: f64,
    pub underload_threshold: f64,
    /// Direct placement policy in `Name[option=value]` format.
    pub placement_policy: String,
    pub seed: u64,
    /// Number of threads evaluating candidates, 1 means sequential evaluation.
    pub evaluation_threads: usize,
}

/// Represents simulation configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub task_queue: TaskQueueConfig,
    pub load_balancer: LoadBalancerConfig,
    pub metaheuristics: MetaheuristicsConfig,
    pub datacenter: DatacenterConfig,
    pub fitness: FitnessWeights,
}

impl SimulationConfig {
    /// Reads config from YAML file, or from JSON file if the file name ends with `.json`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("json")) {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(content)?;
        Self::from_raw(raw)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(content)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let lb = raw.load_balancer.ok_or(ConfigError::MissingField("load_balancer"))?;
        let algorithm: Algorithm = lb
            .default_algorithm
            .ok_or(ConfigError::MissingField("load_balancer.default_algorithm"))?
            .parse()?;
        let overload_threshold = lb
            .overload_threshold
            .ok_or(ConfigError::MissingField("load_balancer.overload_threshold"))?;
        let underload_threshold = lb
            .underload_threshold
            .ok_or(ConfigError::MissingField("load_balancer.underload_threshold"))?;
        let datacenter = raw.datacenter.ok_or(ConfigError::MissingField("datacenter"))?;
        let task_queue = raw.task_queue.unwrap_or_default();

        let config = Self {
            task_queue: TaskQueueConfig {
                directory: task_queue.directory,
                task_count: task_queue.task_count.unwrap_or(0),
                task_batch_delay: task_queue.task_batch_delay.unwrap_or(1.),
                cpu_utilization_period: task_queue.cpu_utilization_period.unwrap_or(1.),
                task_memory: task_queue.task_memory.unwrap_or(1.),
            },
            load_balancer: LoadBalancerConfig {
                algorithm,
                overload_threshold,
                underload_threshold,
                placement_policy: lb.placement_policy.unwrap_or_else(|| "LowestUtilization".to_string()),
                seed: lb.seed.unwrap_or(123),
                evaluation_threads: lb.evaluation_threads.unwrap_or(1),
            },
            metaheuristics: raw.metaheuristics.unwrap_or_default(),
            datacenter,
            fitness: raw.fitness.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges. Called on every parsed config and after overriding fields programmatically.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let lb = &self.load_balancer;
        let in_range = |x: f64| (0. ..=1.).contains(&x);
        if !in_range(lb.overload_threshold)
            || !in_range(lb.underload_threshold)
            || lb.underload_threshold >= lb.overload_threshold
        {
            return Err(ConfigError::InvalidThresholds {
                underload: lb.underload_threshold,
                overload: lb.overload_threshold,
            });
        }
        if lb.evaluation_threads == 0 {
            return Err(invalid("load_balancer.evaluation_threads", "must be positive"));
        }

        let tq = &self.task_queue;
        if !(tq.task_batch_delay >= 0.) {
            return Err(invalid("task_queue.task_batch_delay", "must be non-negative"));
        }
        if !(tq.cpu_utilization_period > 0.) {
            return Err(invalid("task_queue.cpu_utilization_period", "must be positive"));
        }
        if !(tq.task_memory >= 0.) {
            return Err(invalid("task_queue.task_memory", "must be non-negative"));
        }

        let pco = &self.metaheuristics.pco;
        if pco.num_plants == 0 {
            return Err(invalid("metaheuristics.PCO.num_plants", "must be positive"));
        }
        if pco.vmax == 0 {
            return Err(invalid("metaheuristics.PCO.vmax", "must be positive"));
        }
        if !(pco.k > 0.) {
            return Err(invalid("metaheuristics.PCO.k", "must be positive"));
        }

        let pso = &self.metaheuristics.pso;
        if pso.num_particles == 0 {
            return Err(invalid("metaheuristics.PSO.num_particles", "must be positive"));
        }
        if !(pso.velocity_clamp.0 < pso.velocity_clamp.1) {
            return Err(invalid("metaheuristics.PSO.velocity_clamp", "lower bound must be below upper bound"));
        }

        let gwo = &self.metaheuristics.gwo;
        if gwo.num_wolves == 0 {
            return Err(invalid("metaheuristics.GWO.num_wolves", "must be positive"));
        }
        if !(gwo.a_max >= 0.) {
            return Err(invalid("metaheuristics.GWO.a_max", "must be non-negative"));
        }
        if !in_range(gwo.diversity_distance) {
            return Err(invalid("metaheuristics.GWO.diversity_distance", "must be within [0, 1]"));
        }

        for (name, batch_size) in [("PCO", pco.batch_size), ("PSO", pso.batch_size), ("GWO", gwo.batch_size)] {
            if batch_size == 0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("metaheuristics.{}.batch_size", name),
                    reason: "must be positive".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Batch size of the selected algorithm.
    pub fn batch_size(&self) -> usize {
        self.metaheuristics.batch_size(self.load_balancer.algorithm)
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
