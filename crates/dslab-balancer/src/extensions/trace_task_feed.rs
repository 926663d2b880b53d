//! Task feed reading CPU utilization traces.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use crate::context::SimulationContext;
use crate::core::common::{Task, TaskBatch};
use crate::core::config::{ConfigError, TaskQueueConfig};
use crate::extensions::task_feed::TaskBatchFeed;
use crate::log_warn;

/// Reads tasks from a directory with CPU utilization traces.
///
/// Each line of a trace file holds CPU utilization in percent, which becomes a task demanding `value / 100` cores.
/// Files are read in the order of their names, and each file is split into batches of `batch_size` tasks, so a batch
/// never mixes tasks from different files. Batch `i` arrives at `i * task_batch_delay`.
pub struct TraceTaskFeed {
    batches: VecDeque<TaskBatch>,
}

impl TraceTaskFeed {
    pub fn from_config(
        config: &TaskQueueConfig,
        batch_size: usize,
        ctx: &SimulationContext,
    ) -> Result<Self, ConfigError> {
        let directory = config
            .directory
            .as_ref()
            .ok_or(ConfigError::MissingField("task_queue.directory"))?;
        Self::from_directory(
            directory,
            batch_size,
            config.task_batch_delay,
            config.task_count,
            config.task_memory,
            ctx,
        )
    }

    /// Reads the traces. Unparsable lines are logged and skipped, as well as non-positive values.
    ///
    /// At most `task_count` tasks are read, 0 means no limit.
    pub fn from_directory<P: AsRef<Path>>(
        directory: P,
        batch_size: usize,
        task_batch_delay: f64,
        task_count: usize,
        task_memory: f64,
        ctx: &SimulationContext,
    ) -> Result<Self, ConfigError> {
        let directory = directory.as_ref();
        let io_error = |path: &Path, source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        };
        let mut files: Vec<PathBuf> = fs::read_dir(directory)
            .map_err(|e| io_error(directory, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        let batch_size = batch_size.max(1);
        let mut batches = VecDeque::new();
        let mut next_id: u32 = 0;
        'files: for file in files.iter() {
            let content = fs::read_to_string(file).map_err(|e| io_error(file, e))?;
            let mut cpu_demands = Vec::new();
            for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
                match line.parse::<f64>() {
                    Ok(value) if value > 0. => cpu_demands.push(value / 100.),
                    Ok(_) => {}
                    Err(_) => log_warn!(ctx, "invalid CPU utilization value in {}: {}", file.display(), line),
                }
            }

            for chunk in cpu_demands.chunks(batch_size) {
                let arrival_time = batches.len() as f64 * task_batch_delay;
                let mut tasks = Vec::with_capacity(chunk.len());
                for cpu in chunk.iter() {
                    if task_count > 0 && next_id as usize >= task_count {
                        break;
                    }
                    tasks.push(Task::new(next_id, *cpu, task_memory, task_duration(*cpu), arrival_time));
                    next_id += 1;
                }
                if !tasks.is_empty() {
                    batches.push_back(TaskBatch::new(arrival_time, tasks));
                }
                if task_count > 0 && next_id as usize >= task_count {
                    break 'files;
                }
            }
        }
        Ok(Self { batches })
    }

    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

impl TaskBatchFeed for TraceTaskFeed {
    fn next_batch(&mut self) -> Option<TaskBatch> {
        self.batches.pop_front()
    }
}

/// Execution time of a trace task depending on its CPU demand.
pub fn task_duration(cpu_demand: f64) -> f64 {
    if cpu_demand < 0.3 {
        0.5
    } else if cpu_demand < 0.7 {
        0.15
    } else {
        0.3
    }
}
