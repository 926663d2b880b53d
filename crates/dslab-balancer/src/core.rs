//! Datacenter model, fitness evaluation, metaheuristic optimizers and the load balancer.

pub mod assignment;
pub mod builder;
pub mod common;
pub mod config;
pub mod datacenter;
pub mod fitness;
pub mod load_balancer;
pub mod metaheuristic;
pub mod metaheuristics;
pub mod placement_policies;
pub mod placement_policy;
pub mod population_evaluator;
pub mod stats;
