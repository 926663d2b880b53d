//! Task-to-VM assignments and their encodings used by the optimizers.

use std::collections::btree_map::Iter;
use std::collections::BTreeMap;

use rand::Rng;
use serde::Serialize;

/// Mapping from task ID to the ID of VM hosting this task.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Assignment {
    placement: BTreeMap<u32, u32>,
}

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the task to the VM, returns the previous VM of the task (if any).
    pub fn insert(&mut self, task_id: u32, vm_id: u32) -> Option<u32> {
        self.placement.insert(task_id, vm_id)
    }

    pub fn remove(&mut self, task_id: u32) -> Option<u32> {
        self.placement.remove(&task_id)
    }

    pub fn get(&self, task_id: u32) -> Option<u32> {
        self.placement.get(&task_id).copied()
    }

    pub fn contains(&self, task_id: u32) -> bool {
        self.placement.contains_key(&task_id)
    }

    pub fn len(&self) -> usize {
        self.placement.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placement.is_empty()
    }

    /// Iterates over `(task, vm)` pairs in the order of task IDs.
    pub fn iter(&self) -> Iter<'_, u32, u32> {
        self.placement.iter()
    }

    pub fn task_ids(&self) -> Vec<u32> {
        self.placement.keys().copied().collect()
    }

    /// Returns IDs of tasks assigned to the specified VM.
    pub fn tasks_on(&self, vm_id: u32) -> Vec<u32> {
        self.placement
            .iter()
            .filter(|(_, vm)| **vm == vm_id)
            .map(|(task, _)| *task)
            .collect()
    }

    /// Counts tasks present in both assignments which are placed on different VMs.
    pub fn moved_tasks(&self, other: &Assignment) -> usize {
        self.placement
            .iter()
            .filter(|(task, vm)| matches!(other.get(**task), Some(other_vm) if other_vm != **vm))
            .count()
    }
}

impl FromIterator<(u32, u32)> for Assignment {
    fn from_iter<I: IntoIterator<Item = (u32, u32)>>(iter: I) -> Self {
        Self {
            placement: iter.into_iter().collect(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Fixed ordering of tasks and VMs for a single optimizer run.
///
/// Discrete positions hold one VM index per task. Continuous positions (used by PSO and GWO) hold one real
/// coordinate per task, which is decoded by rounding to the nearest VM index clamped to `[0, vm_count - 1]`.
#[derive(Clone, Debug)]
pub struct SearchSpace {
    task_ids: Vec<u32>,
    vm_ids: Vec<u32>,
}

impl SearchSpace {
    pub fn new(mut task_ids: Vec<u32>, mut vm_ids: Vec<u32>) -> Self {
        task_ids.sort_unstable();
        task_ids.dedup();
        vm_ids.sort_unstable();
        vm_ids.dedup();
        Self { task_ids, vm_ids }
    }

    pub fn task_ids(&self) -> &[u32] {
        &self.task_ids
    }

    pub fn vm_ids(&self) -> &[u32] {
        &self.vm_ids
    }

    pub fn task_count(&self) -> usize {
        self.task_ids.len()
    }

    pub fn vm_count(&self) -> usize {
        self.vm_ids.len()
    }

    /// Largest valid coordinate value of a continuous position.
    pub fn upper_bound(&self) -> f64 {
        self.vm_count().saturating_sub(1) as f64
    }

    /// Converts assignment to VM indices. Tasks missing from the assignment or assigned to unknown VMs get index 0.
    pub fn encode(&self, assignment: &Assignment) -> Vec<usize> {
        self.task_ids
            .iter()
            .map(|task| {
                assignment
                    .get(*task)
                    .and_then(|vm| self.vm_ids.binary_search(&vm).ok())
                    .unwrap_or(0)
            })
            .collect()
    }

    pub fn decode(&self, position: &[usize]) -> Assignment {
        let last = self.vm_count().saturating_sub(1);
        self.task_ids
            .iter()
            .zip(position)
            .filter_map(|(task, idx)| self.vm_ids.get((*idx).min(last)).map(|vm| (*task, *vm)))
            .collect()
    }

    pub fn encode_continuous(&self, assignment: &Assignment) -> Vec<f64> {
        self.encode(assignment).into_iter().map(|idx| idx as f64).collect()
    }

    pub fn decode_continuous(&self, position: &[f64]) -> Assignment {
        let indices: Vec<usize> = position.iter().map(|x| self.vm_index(*x)).collect();
        self.decode(&indices)
    }

    /// Maps a continuous coordinate to the nearest valid VM index.
    pub fn vm_index(&self, coordinate: f64) -> usize {
        if !coordinate.is_finite() || coordinate <= 0. {
            return 0;
        }
        (coordinate.round() as usize).min(self.vm_count().saturating_sub(1))
    }

    /// Generates a uniformly random placement of all tasks.
    pub fn random_position<R: Rng>(&self, rng: &mut R) -> Vec<usize> {
        if self.vm_ids.is_empty() {
            return vec![0; self.task_count()];
        }
        (0..self.task_count())
            .map(|_| rng.gen_range(0..self.vm_count()))
            .collect()
    }

    pub fn random_assignment<R: Rng>(&self, rng: &mut R) -> Assignment {
        self.decode(&self.random_position(rng))
    }

    /// Fraction of tasks placed on different VMs in two discrete positions.
    pub fn distance(&self, a: &[usize], b: &[usize]) -> f64 {
        if self.task_ids.is_empty() {
            return 0.;
        }
        let differing = a.iter().zip(b).filter(|(x, y)| x != y).count();
        differing as f64 / self.task_count() as f64
    }
}
