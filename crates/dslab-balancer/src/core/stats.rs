//! Load balancer metrics.

use std::ops::AddAssign;

use num::{ToPrimitive, Zero};
use serde::Serialize;

#[derive(Clone, Debug, Default)]
pub struct SampleMetric<T> {
    data: Vec<T>,
}

impl<T> SampleMetric<T> {
    pub fn add(&mut self, x: T) {
        self.data.push(x);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn values(&self) -> &[T] {
        &self.data
    }
}

impl<T> SampleMetric<T>
where
    T: AddAssign + Copy + Zero,
{
    pub fn sum(&self) -> T {
        let mut s = T::zero();
        for x in self.data.iter().copied() {
            s += x;
        }
        s
    }
}

impl<T> SampleMetric<T>
where
    T: AddAssign + Copy + Zero + ToPrimitive,
{
    /// Returns the sample mean, or zero for empty sample.
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.;
        }
        self.sum().to_f64().unwrap_or(0.) / (self.data.len() as f64)
    }

    pub fn min(&self) -> Option<f64> {
        self.data.iter().filter_map(|x| x.to_f64()).reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.data.iter().filter_map(|x| x.to_f64()).reduce(f64::max)
    }

    pub fn summary(&self) -> SampleSummary {
        SampleSummary {
            count: self.data.len(),
            mean: self.mean(),
            min: self.min(),
            max: self.max(),
        }
    }
}

/// Aggregated view of a [`SampleMetric`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SampleSummary {
    pub count: usize,
    pub mean: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Utilization of the datacenter at some moment of simulated time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UtilizationSample {
    pub time: f64,
    /// Mean CPU utilization over all VMs.
    pub mean_vm_cpu: f64,
    /// CPU utilization of each PM in the order of IDs.
    pub pm_cpu: Vec<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct BalancerStats {
    pub tasks_received: u64,
    pub tasks_placed_directly: u64,
    pub tasks_deferred: u64,
    pub tasks_failed: u64,
    pub tasks_completed: u64,
    pub rebalances: u64,
    pub rejected_rebalances: u64,
    /// Number of placed tasks moved to another VM by rebalancing.
    pub migrations: u64,
    /// Time between task arrival and its placement.
    pub response_time: SampleMetric<f64>,
    pub optimizer_fitness: SampleMetric<f64>,
    pub optimizer_iterations: SampleMetric<u32>,
    pub first_arrival: Option<f64>,
    pub last_completion: Option<f64>,
}

impl BalancerStats {
    pub fn on_task_arrival(&mut self, time: f64) {
        self.tasks_received += 1;
        if self.first_arrival.map_or(true, |t| time < t) {
            self.first_arrival = Some(time);
        }
    }

    pub fn on_task_start(&mut self, arrival_time: f64, time: f64) {
        self.response_time.add((time - arrival_time).max(0.));
    }

    pub fn on_task_completion(&mut self, time: f64) {
        self.tasks_completed += 1;
        if self.last_completion.map_or(true, |t| time > t) {
            self.last_completion = Some(time);
        }
    }

    /// Time from the first task arrival to the last task completion.
    pub fn makespan(&self) -> f64 {
        match (self.first_arrival, self.last_completion) {
            (Some(first), Some(last)) if last > first => last - first,
            _ => 0.,
        }
    }

    /// Completed tasks per unit of simulated time.
    pub fn throughput(&self) -> f64 {
        let makespan = self.makespan();
        if makespan > 0. {
            self.tasks_completed as f64 / makespan
        } else {
            0.
        }
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            tasks_received: self.tasks_received,
            tasks_placed_directly: self.tasks_placed_directly,
            tasks_deferred: self.tasks_deferred,
            tasks_failed: self.tasks_failed,
            tasks_completed: self.tasks_completed,
            rebalances: self.rebalances,
            rejected_rebalances: self.rejected_rebalances,
            migrations: self.migrations,
            response_time: self.response_time.summary(),
            optimizer_fitness: self.optimizer_fitness.summary(),
            optimizer_iterations: self.optimizer_iterations.summary(),
            makespan: self.makespan(),
            throughput: self.throughput(),
        }
    }
}

/// Serializable summary of [`BalancerStats`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatsSummary {
    pub tasks_received: u64,
    pub tasks_placed_directly: u64,
    pub tasks_deferred: u64,
    pub tasks_failed: u64,
    pub tasks_completed: u64,
    pub rebalances: u64,
    pub rejected_rebalances: u64,
    pub migrations: u64,
    pub response_time: SampleSummary,
    pub optimizer_fitness: SampleSummary,
    pub optimizer_iterations: SampleSummary,
    pub makespan: f64,
    pub throughput: f64,
}
