use serde::{Deserialize, Serialize};

/// Tolerance used when comparing resource amounts against capacities.
pub const EPSILON: f64 = 1e-9;

/// A unit of work submitted to the datacenter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: u32,
    /// Requested CPU, in cores (may be fractional).
    pub cpu_demand: f64,
    /// Requested memory, in GB.
    pub memory_demand: f64,
    /// Execution time once the task is placed.
    pub duration: f64,
    pub arrival_time: f64,
}

impl Task {
    pub fn new(id: u32, cpu_demand: f64, memory_demand: f64, duration: f64, arrival_time: f64) -> Self {
        Self {
            id,
            cpu_demand,
            memory_demand,
            duration,
            arrival_time,
        }
    }
}

/// Group of tasks delivered to the load balancer at once.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskBatch {
    pub arrival_time: f64,
    pub tasks: Vec<Task>,
}

impl TaskBatch {
    pub fn new(arrival_time: f64, tasks: Vec<Task>) -> Self {
        Self { arrival_time, tasks }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlacementVerdict {
    NotEnoughCpu,
    NotEnoughMemory,
    Success,
    VmNotFound,
}

/// Task which can never be placed because it does not fit into any VM of the datacenter.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlacementFailure {
    pub task_id: u32,
    pub cpu_demand: f64,
    pub memory_demand: f64,
    pub time: f64,
}
