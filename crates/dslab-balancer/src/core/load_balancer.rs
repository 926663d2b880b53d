//! Load balancer monitoring VM utilization and triggering rebalancing.

use std::collections::{BTreeMap, VecDeque};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::Serialize;
use threadpool::ThreadPool;

use crate::context::SimulationContext;
use crate::core::assignment::{Assignment, SearchSpace};
use crate::core::common::{PlacementFailure, Task, TaskBatch, EPSILON};
use crate::core::config::{ConfigError, LoadBalancerConfig, SimulationConfig};
use crate::core::datacenter::DatacenterModel;
use crate::core::fitness::{FitnessEvaluator, FitnessWeights};
use crate::core::metaheuristic::{optimizer_resolver, Metaheuristic, SearchState};
use crate::core::placement_policy::{placement_policy_resolver, TaskPlacementPolicy};
use crate::core::population_evaluator::PopulationEvaluator;
use crate::core::stats::{BalancerStats, UtilizationSample};
use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum BalancerState {
    Monitoring,
    Rebalancing,
    Idle,
}

/// Result of a single rebalancing pass.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RebalanceOutcome {
    pub time: f64,
    /// Whether the optimized assignment was accepted by the datacenter model.
    pub applied: bool,
    pub fitness: f64,
    pub converged: bool,
    pub iterations: u32,
    /// Number of already placed tasks moved to another VM.
    pub migrations: usize,
    /// Number of deferred tasks which got a VM.
    pub placed: usize,
}

/// Places arriving tasks, watches VM and host utilization and rebalances the datacenter with a metaheuristic.
///
/// New tasks are placed directly by the placement policy. When some utilization crosses the overload threshold, some
/// underloaded VM can be consolidated into another one, or some tasks could not be placed, the balancer switches to
/// `Rebalancing` and on the next step runs the optimizer seeded with the current assignment. Batches received while
/// rebalancing are kept in FIFO order and processed one per step afterwards.
pub struct LoadBalancer {
    model: DatacenterModel,
    state: BalancerState,
    optimizer: Box<dyn Metaheuristic>,
    placement_policy: Box<dyn TaskPlacementPolicy>,
    overload_threshold: f64,
    underload_threshold: f64,
    fitness_weights: FitnessWeights,
    queue: VecDeque<TaskBatch>,
    start_times: BTreeMap<u32, f64>,
    failures: Vec<PlacementFailure>,
    pool: Option<ThreadPool>,
    rng: Pcg64,
    stats: BalancerStats,
    rebalances: Vec<RebalanceOutcome>,
    ctx: SimulationContext,
}

impl LoadBalancer {
    /// Creates load balancer managing the model.
    ///
    /// Tasks already placed in the model are considered started at the current time.
    pub fn new(
        model: DatacenterModel,
        optimizer: Box<dyn Metaheuristic>,
        config: &LoadBalancerConfig,
        fitness_weights: FitnessWeights,
        ctx: SimulationContext,
    ) -> Result<Self, ConfigError> {
        let placement_policy = placement_policy_resolver(&config.placement_policy)?;
        let pool = if config.evaluation_threads > 1 {
            Some(ThreadPool::new(config.evaluation_threads))
        } else {
            None
        };
        let now = ctx.time();
        let start_times = model.current_assignment().task_ids().into_iter().map(|t| (t, now)).collect();
        Ok(Self {
            model,
            state: BalancerState::Monitoring,
            optimizer,
            placement_policy,
            overload_threshold: config.overload_threshold,
            underload_threshold: config.underload_threshold,
            fitness_weights,
            queue: VecDeque::new(),
            start_times,
            failures: Vec::new(),
            pool,
            rng: Pcg64::seed_from_u64(config.seed),
            stats: BalancerStats::default(),
            rebalances: Vec::new(),
            ctx,
        })
    }

    /// Creates load balancer using the algorithm, thresholds and weights from simulation config.
    pub fn from_config(
        model: DatacenterModel,
        config: &SimulationConfig,
        ctx: SimulationContext,
    ) -> Result<Self, ConfigError> {
        let optimizer = optimizer_resolver(config.load_balancer.algorithm, &config.metaheuristics);
        Self::new(model, optimizer, &config.load_balancer, config.fitness, ctx)
    }

    /// Replaces the direct placement policy.
    pub fn with_placement_policy(mut self, policy: Box<dyn TaskPlacementPolicy>) -> Self {
        self.placement_policy = policy;
        self
    }

    pub fn state(&self) -> BalancerState {
        self.state
    }

    pub fn model(&self) -> &DatacenterModel {
        &self.model
    }

    pub fn stats(&self) -> &BalancerStats {
        &self.stats
    }

    pub fn optimizer_name(&self) -> &str {
        self.optimizer.name()
    }

    pub fn last_rebalance(&self) -> Option<&RebalanceOutcome> {
        self.rebalances.last()
    }

    /// Outcomes of all rebalancing passes performed so far.
    pub fn rebalances(&self) -> &[RebalanceOutcome] {
        &self.rebalances
    }

    /// Tasks which can't be placed on any VM.
    pub fn failures(&self) -> &[PlacementFailure] {
        &self.failures
    }

    pub fn take_failures(&mut self) -> Vec<PlacementFailure> {
        std::mem::take(&mut self.failures)
    }

    pub fn queued_batches(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if there are queued batches or a pending rebalancing.
    pub fn has_pending_work(&self) -> bool {
        !self.queue.is_empty() || self.state == BalancerState::Rebalancing
    }

    /// Accepts a batch of tasks. The batch is processed by the subsequent steps in FIFO order.
    pub fn enqueue(&mut self, batch: TaskBatch) {
        log_debug!(
            self.ctx,
            "received batch of {} tasks, {} batches queued",
            batch.tasks.len(),
            self.queue.len()
        );
        self.queue.push_back(batch);
        if self.state == BalancerState::Idle {
            self.state = BalancerState::Monitoring;
        }
    }

    /// Requests rebalancing on the next step.
    pub fn request_rebalance(&mut self) {
        self.state = BalancerState::Rebalancing;
    }

    /// Performs a single action according to the current state and returns the new state.
    pub fn step(&mut self) -> BalancerState {
        match self.state {
            BalancerState::Monitoring | BalancerState::Idle => {
                let released = self.release_completed();
                if released > 0 {
                    self.place_deferred();
                }
                if let Some(batch) = self.queue.pop_front() {
                    self.state = BalancerState::Monitoring;
                    self.place_batch(batch);
                    self.check_thresholds();
                } else if self.model.task_count() == 0 {
                    self.state = BalancerState::Idle;
                }
            }
            BalancerState::Rebalancing => {
                self.rebalance();
                self.state = BalancerState::Monitoring;
            }
        }
        self.state
    }

    /// Switches to `Rebalancing` if the datacenter state requires it.
    pub fn check_thresholds(&mut self) -> BalancerState {
        if self.state != BalancerState::Rebalancing && self.needs_rebalancing() {
            log_info!(self.ctx, "utilization thresholds crossed, rebalancing requested");
            self.state = BalancerState::Rebalancing;
        }
        self.state
    }

    /// Records current utilization and checks the thresholds.
    pub fn sample_utilization(&mut self) -> UtilizationSample {
        let vm_count = self.model.vm_count();
        let mean_vm_cpu = if vm_count > 0 {
            self.model.vms().map(|vm| vm.cpu_utilization()).sum::<f64>() / vm_count as f64
        } else {
            0.
        };
        let pm_ids: Vec<u32> = self.model.pms().map(|pm| pm.id).collect();
        let pm_cpu = pm_ids.iter().map(|pm| self.model.pm_utilization(*pm).0).collect();
        if self.state == BalancerState::Monitoring {
            self.check_thresholds();
        }
        UtilizationSample {
            time: self.ctx.time(),
            mean_vm_cpu,
            pm_cpu,
        }
    }

    /// Checks overload, underload and deferred tasks.
    pub fn needs_rebalancing(&self) -> bool {
        if !self.model.unplaced_tasks().is_empty() {
            return true;
        }
        for vm in self.model.vms() {
            if vm.cpu_utilization() > self.overload_threshold || vm.memory_utilization() > self.overload_threshold {
                log_debug!(self.ctx, "vm #{} is overloaded", vm.id);
                return true;
            }
        }
        for pm in self.model.pms() {
            let (cpu, memory) = self.model.pm_utilization(pm.id);
            if cpu > self.overload_threshold || memory > self.overload_threshold {
                log_debug!(self.ctx, "host #{} is overloaded", pm.id);
                return true;
            }
        }
        for vm in self.model.vms() {
            if vm.tasks.is_empty() || vm.cpu_utilization() >= self.underload_threshold {
                continue;
            }
            let can_consolidate = self.model.vms().any(|other| {
                other.id != vm.id
                    && !other.tasks.is_empty()
                    && other.cpu_available() + EPSILON >= vm.cpu_used()
                    && other.memory_available() + EPSILON >= vm.memory_used()
            });
            if can_consolidate {
                log_debug!(self.ctx, "vm #{} is underloaded and can be consolidated", vm.id);
                return true;
            }
        }
        false
    }

    /// Returns the time of the earliest completion among running tasks.
    pub fn next_completion_time(&self) -> Option<f64> {
        self.start_times
            .iter()
            .filter_map(|(task_id, start)| self.model.task(*task_id).map(|t| start + t.duration))
            .reduce(f64::min)
    }

    /// Releases tasks which have completed by the current time, returns their number.
    pub fn release_completed(&mut self) -> usize {
        let now = self.ctx.time();
        let completed: Vec<(u32, f64)> = self
            .start_times
            .iter()
            .filter_map(|(task_id, start)| {
                let finish = start + self.model.task(*task_id)?.duration;
                if finish <= now + EPSILON {
                    Some((*task_id, finish))
                } else {
                    None
                }
            })
            .collect();
        for (task_id, finish) in completed.iter() {
            self.start_times.remove(task_id);
            self.model.release(*task_id);
            self.stats.on_task_completion(*finish);
            log_debug!(self.ctx, "task #{} completed", task_id);
        }
        completed.len()
    }

    fn place_batch(&mut self, batch: TaskBatch) {
        for task in batch.tasks {
            self.stats.on_task_arrival(task.arrival_time);
            if !self.model.fits_any_vm(&task) {
                log_error!(
                    self.ctx,
                    "task #{} (cpu {:.3}, memory {:.3}) does not fit into any vm",
                    task.id,
                    task.cpu_demand,
                    task.memory_demand
                );
                self.stats.tasks_failed += 1;
                self.failures.push(PlacementFailure {
                    task_id: task.id,
                    cpu_demand: task.cpu_demand,
                    memory_demand: task.memory_demand,
                    time: self.ctx.time(),
                });
                continue;
            }
            self.model.admit(task.clone());
            if self.try_place(&task) {
                self.stats.tasks_placed_directly += 1;
            } else {
                log_debug!(self.ctx, "task #{} deferred to the next rebalancing", task.id);
                self.stats.tasks_deferred += 1;
            }
        }
    }

    fn try_place(&mut self, task: &Task) -> bool {
        let vm_id = match self.placement_policy.select_vm(task, &self.model) {
            Some(vm_id) => vm_id,
            None => return false,
        };
        match self.model.place(task.id, vm_id) {
            Ok(()) => {
                log_debug!(self.ctx, "task #{} placed on vm #{}", task.id, vm_id);
                self.on_task_started(task.id, task.arrival_time);
                true
            }
            Err(e) => {
                log_debug!(self.ctx, "can't place task #{}: {}", task.id, e);
                false
            }
        }
    }

    /// Tries to place deferred tasks directly, e.g. after some tasks completed.
    fn place_deferred(&mut self) {
        for task_id in self.model.unplaced_tasks() {
            if let Some(task) = self.model.task(task_id).cloned() {
                self.try_place(&task);
            }
        }
    }

    fn on_task_started(&mut self, task_id: u32, arrival_time: f64) {
        let now = self.ctx.time();
        self.start_times.insert(task_id, now);
        self.stats.on_task_start(arrival_time, now);
    }

    /// Seed for the optimizer: the current assignment with deferred tasks put on the least loaded VMs.
    fn seed_assignment(&self) -> Assignment {
        let mut seed = self.model.current_assignment();
        let mut cpu_load: BTreeMap<u32, f64> = self.model.vms().map(|vm| (vm.id, vm.cpu_utilization())).collect();
        for task_id in self.model.unplaced_tasks() {
            let target = cpu_load
                .iter()
                .min_by(|a, b| a.1.total_cmp(b.1))
                .map(|(vm_id, _)| *vm_id);
            if let (Some(vm_id), Some(task)) = (target, self.model.task(task_id)) {
                let capacity = self.model.vm(vm_id).map_or(1., |vm| vm.cpu_core.max(1) as f64);
                if let Some(load) = cpu_load.get_mut(&vm_id) {
                    *load += task.cpu_demand / capacity;
                }
                seed.insert(task_id, vm_id);
            }
        }
        seed
    }

    /// Runs the optimizer and applies its result to the model.
    pub fn rebalance(&mut self) -> RebalanceOutcome {
        let unplaced = self.model.unplaced_tasks();
        let current = self.model.current_assignment();
        let seed = self.seed_assignment();
        let space = SearchSpace::new(seed.task_ids(), self.model.vm_ids());
        let evaluator = FitnessEvaluator::new(self.model.snapshot(), self.fitness_weights);
        let evaluator = match &self.pool {
            Some(pool) => PopulationEvaluator::parallel(evaluator, pool.clone()),
            None => PopulationEvaluator::sequential(evaluator),
        };
        let rng = Pcg64::seed_from_u64(self.rng.gen());
        let mut search = SearchState::new(space, evaluator, rng, self.ctx.derive(self.optimizer.name()));

        log_info!(
            self.ctx,
            "rebalancing {} tasks ({} deferred) with {}",
            seed.len(),
            unplaced.len(),
            self.optimizer.name()
        );
        let result = self.optimizer.run(&seed, &mut search);
        let best = result.best;
        self.stats.optimizer_fitness.add(best.fitness);
        self.stats.optimizer_iterations.add(result.iterations);

        let migrations = best.assignment.moved_tasks(&current);
        let mut outcome = RebalanceOutcome {
            time: self.ctx.time(),
            applied: false,
            fitness: best.fitness,
            converged: result.converged,
            iterations: result.iterations,
            migrations: 0,
            placed: 0,
        };

        match self.model.apply_assignment(best.assignment) {
            Ok(()) => {
                self.stats.rebalances += 1;
                self.stats.migrations += migrations as u64;
                for task_id in unplaced.iter() {
                    if let Some(arrival_time) = self.model.task(*task_id).map(|t| t.arrival_time) {
                        self.on_task_started(*task_id, arrival_time);
                    }
                }
                outcome.applied = true;
                outcome.migrations = migrations;
                outcome.placed = unplaced.len();
                log_info!(
                    self.ctx,
                    "{} finished after {} iterations (converged: {}), fitness {:.6}, {} migrations, {} tasks placed",
                    self.optimizer.name(),
                    result.iterations,
                    result.converged,
                    best.fitness,
                    migrations,
                    unplaced.len()
                );
            }
            Err(e) => {
                self.stats.rejected_rebalances += 1;
                let current_fitness = search.evaluator().evaluator().evaluate(&current);
                log_warn!(
                    self.ctx,
                    "rejected candidate with fitness {:.6} ({}), keeping previous assignment with fitness {:.6}",
                    best.fitness,
                    e,
                    current_fitness
                );
                self.place_deferred();
            }
        }
        self.rebalances.push(outcome.clone());
        outcome
    }
}

