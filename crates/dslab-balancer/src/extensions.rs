//! Task feeds supplying batches to the load balancer.

pub mod task_feed;
pub mod trace_task_feed;
