//! Fitness function shared by all metaheuristics.

use serde::{Deserialize, Serialize};

use crate::core::assignment::Assignment;
use crate::core::common::EPSILON;
use crate::core::datacenter::DatacenterSnapshot;

/// Weights of fitness terms.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessWeights {
    pub imbalance: f64,
    /// Cost of a single unit (core or GB) of capacity excess.
    pub overload_penalty: f64,
    pub makespan: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            imbalance: 1.,
            overload_penalty: 1000.,
            makespan: 1.,
        }
    }
}

/// Unweighted fitness terms of a single assignment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct FitnessBreakdown {
    /// Variance of CPU utilization across all VMs.
    pub imbalance: f64,
    /// Total amount of CPU cores and GB of memory exceeding VM capacities.
    pub overload: f64,
    /// Maximum over VMs of total assigned duration divided by the host CPU speed.
    pub makespan: f64,
}

impl FitnessBreakdown {
    pub fn total(&self, weights: &FitnessWeights) -> f64 {
        weights.imbalance * self.imbalance + weights.overload_penalty * self.overload + weights.makespan * self.makespan
    }
}

/// Scores task assignments, lower is better.
///
/// Infeasible assignments are not rejected: each unit of capacity excess adds a large penalty, so the search can
/// gradually repair them. Evaluation depends only on the assignment and the snapshot, so it is deterministic and can
/// be performed concurrently.
#[derive(Clone, Debug)]
pub struct FitnessEvaluator {
    snapshot: DatacenterSnapshot,
    weights: FitnessWeights,
}

impl FitnessEvaluator {
    pub fn new(snapshot: DatacenterSnapshot, weights: FitnessWeights) -> Self {
        Self { snapshot, weights }
    }

    pub fn snapshot(&self) -> &DatacenterSnapshot {
        &self.snapshot
    }

    pub fn weights(&self) -> &FitnessWeights {
        &self.weights
    }

    pub fn evaluate(&self, assignment: &Assignment) -> f64 {
        self.breakdown(assignment).total(&self.weights)
    }

    pub fn breakdown(&self, assignment: &Assignment) -> FitnessBreakdown {
        let vms = self.snapshot.vms();
        if vms.is_empty() {
            return FitnessBreakdown::default();
        }

        let mut cpu = vec![0.; vms.len()];
        let mut memory = vec![0.; vms.len()];
        let mut duration = vec![0.; vms.len()];
        for (task_id, vm_id) in assignment.iter() {
            let (task, idx) = match (self.snapshot.task(*task_id), self.snapshot.vm_position(*vm_id)) {
                (Some(task), Some(idx)) => (task, idx),
                _ => continue,
            };
            cpu[idx] += task.cpu;
            memory[idx] += task.memory;
            duration[idx] += task.duration;
        }

        let utilization: Vec<f64> = vms
            .iter()
            .zip(&cpu)
            .map(|(vm, used)| if vm.cpu_core > 0 { used / vm.cpu_core as f64 } else { 0. })
            .collect();
        let mean = utilization.iter().sum::<f64>() / utilization.len() as f64;
        let imbalance = utilization.iter().map(|u| (u - mean).powi(2)).sum::<f64>() / utilization.len() as f64;

        let mut overload = 0.;
        let mut makespan: f64 = 0.;
        for (idx, vm) in vms.iter().enumerate() {
            overload += excess(cpu[idx], vm.cpu_core as f64);
            overload += excess(memory[idx], vm.memory as f64);
            if vm.cpu_speed > 0. {
                makespan = makespan.max(duration[idx] / vm.cpu_speed);
            }
        }

        FitnessBreakdown {
            imbalance,
            overload,
            makespan,
        }
    }
}

fn excess(used: f64, capacity: f64) -> f64 {
    if used > capacity + EPSILON {
        used - capacity
    } else {
        0.
    }
}
