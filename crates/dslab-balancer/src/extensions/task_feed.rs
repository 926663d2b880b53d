//! Trait for task batch feeds.

use std::collections::VecDeque;

use crate::core::common::TaskBatch;

pub trait TaskBatchFeed {
    /// Returns the next batch (if any).
    ///
    /// Batches should be returned in non-decreasing order of their arrival times. The feed is finite and can be
    /// restarted only by creating it anew.
    fn next_batch(&mut self) -> Option<TaskBatch>;
}

/// Feed of batches prepared in memory.
#[derive(Clone, Debug, Default)]
pub struct VecTaskFeed {
    batches: VecDeque<TaskBatch>,
}

impl VecTaskFeed {
    /// Creates feed returning the batches sorted by arrival time. Batches with equal arrival times keep their order.
    pub fn new(mut batches: Vec<TaskBatch>) -> Self {
        batches.sort_by(|a, b| a.arrival_time.total_cmp(&b.arrival_time));
        Self {
            batches: batches.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

impl TaskBatchFeed for VecTaskFeed {
    fn next_batch(&mut self) -> Option<TaskBatch> {
        self.batches.pop_front()
    }
}
