//! Simulation driver feeding task batches to the load balancer over simulated time.

use serde::Serialize;

use crate::context::{Clock, SimulationContext};
use crate::core::builder::DatacenterBuilder;
use crate::core::common::PlacementFailure;
use crate::core::config::{ConfigError, SimulationConfig};
use crate::core::load_balancer::{BalancerState, LoadBalancer, RebalanceOutcome};
use crate::core::stats::{StatsSummary, UtilizationSample};
use crate::extensions::task_feed::TaskBatchFeed;
use crate::extensions::trace_task_feed::TraceTaskFeed;
use crate::{log_info, log_warn};

/// Results of a simulation run.
#[derive(Clone, Debug, Serialize)]
pub struct SimulationReport {
    pub algorithm: String,
    pub seed: u64,
    /// Simulated time when the last event was processed.
    pub end_time: f64,
    pub stats: StatsSummary,
    pub utilization: Vec<UtilizationSample>,
    pub rebalances: Vec<RebalanceOutcome>,
    /// Tasks which do not fit into any VM.
    pub failures: Vec<PlacementFailure>,
    /// Tasks left without a VM at the end of simulation.
    pub unplaced_tasks: Vec<u32>,
}

/// Owns the clock, the task feed and the load balancer of a single run.
///
/// Batches are delivered at their arrival times. After each delivery the balancer is stepped until it has no queued
/// work, so batches arriving at the same time are processed one by one in the feed order. Utilization is sampled
/// every `cpu_utilization_period` of simulated time.
pub struct BalancerSimulation {
    clock: Clock,
    feed: Box<dyn TaskBatchFeed>,
    balancer: LoadBalancer,
    utilization_period: f64,
    next_sample_time: f64,
    samples: Vec<UtilizationSample>,
    seed: u64,
    ctx: SimulationContext,
}

impl BalancerSimulation {
    /// Creates simulation of the datacenter described by config with tasks supplied by the feed.
    pub fn new(config: &SimulationConfig, feed: Box<dyn TaskBatchFeed>) -> Result<Self, ConfigError> {
        Self::with_clock(config, feed, Clock::new())
    }

    /// Creates simulation reading tasks from the trace directory specified in config.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, ConfigError> {
        let clock = Clock::new();
        let feed = TraceTaskFeed::from_config(
            &config.task_queue,
            config.batch_size(),
            &SimulationContext::new("trace", &clock),
        )?;
        Self::with_clock(config, Box::new(feed), clock)
    }

    fn with_clock(
        config: &SimulationConfig,
        feed: Box<dyn TaskBatchFeed>,
        clock: Clock,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let model = DatacenterBuilder::build(&config.datacenter)?;
        let balancer = LoadBalancer::from_config(model, config, SimulationContext::new("balancer", &clock))?;
        let utilization_period = config.task_queue.cpu_utilization_period;
        Ok(Self {
            ctx: SimulationContext::new("simulation", &clock),
            clock,
            feed,
            balancer,
            utilization_period,
            next_sample_time: utilization_period,
            samples: Vec::new(),
            seed: config.load_balancer.seed,
        })
    }

    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    pub fn balancer(&self) -> &LoadBalancer {
        &self.balancer
    }

    pub fn samples(&self) -> &[UtilizationSample] {
        &self.samples
    }

    /// Steps the balancer until it has no queued batches or pending rebalancing.
    pub fn settle(&mut self) {
        while self.balancer.has_pending_work() {
            self.balancer.step();
        }
    }

    /// Advances the clock, taking utilization samples on the period boundaries passed on the way.
    pub fn advance_to(&mut self, time: f64) {
        while self.next_sample_time <= time {
            self.clock.advance_to(self.next_sample_time);
            self.balancer.step();
            let sample = self.balancer.sample_utilization();
            self.samples.push(sample);
            self.settle();
            self.next_sample_time += self.utilization_period;
        }
        self.clock.advance_to(time);
    }

    /// Runs the simulation until all tasks are either completed, failed or can't be placed.
    pub fn run(&mut self) -> SimulationReport {
        log_info!(self.ctx, "simulation started with {}", self.balancer.optimizer_name());
        while let Some(batch) = self.feed.next_batch() {
            self.advance_to(batch.arrival_time);
            self.balancer.enqueue(batch);
            self.settle();
        }

        loop {
            self.settle();
            if let Some(time) = self.balancer.next_completion_time() {
                self.advance_to(time);
                self.balancer.step();
                continue;
            }
            let unplaced = self.balancer.model().unplaced_tasks().len();
            if unplaced == 0 {
                break;
            }
            // nothing is running, so the last chance for deferred tasks is a rebalancing over the idle datacenter
            self.balancer.request_rebalance();
            self.settle();
            if self.balancer.model().unplaced_tasks().len() == unplaced {
                break;
            }
        }

        let unplaced_tasks = self.balancer.model().unplaced_tasks();
        if !unplaced_tasks.is_empty() {
            log_warn!(self.ctx, "{} tasks were left unplaced", unplaced_tasks.len());
        }
        if self.balancer.state() != BalancerState::Idle && self.balancer.model().task_count() == 0 {
            self.balancer.step();
        }
        log_info!(self.ctx, "simulation finished");

        SimulationReport {
            algorithm: self.balancer.optimizer_name().to_string(),
            seed: self.seed,
            end_time: self.time(),
            stats: self.balancer.stats().summary(),
            utilization: self.samples.clone(),
            rebalances: self.balancer.rebalances().to_vec(),
            failures: self.balancer.failures().to_vec(),
            unplaced_tasks,
        }
    }
}
