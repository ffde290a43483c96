// src/render/dependency_map.rs

//! Compiles a task list into "dependency key -> tasks to wake" lookups.

use std::collections::HashMap;

use crate::bitset::BitList;
use crate::render::task::{DependencyKey, Task};

/// Everything that must happen when one dependency key changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEntry {
    /// Bit `p` set if at least one task of phase `p` depends on the key.
    pub phase_mask: u32,
    /// Indices of the tasks depending on the key.
    pub tasks: BitList,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyMap {
    entries: HashMap<DependencyKey, DependencyEntry>,
}

impl DependencyMap {
    pub fn build<C>(tasks: &[Task<C>]) -> Self {
        let mut accumulators: HashMap<DependencyKey, (u32, Vec<usize>)> = HashMap::new();

        for (index, task) in tasks.iter().enumerate() {
            for key in task.dependencies() {
                let (phase_mask, indices) = accumulators.entry(key.clone()).or_default();
                *phase_mask |= task.phase().mask();
                indices.push(index);
            }
        }

        let entries = accumulators
            .into_iter()
            .map(|(key, (phase_mask, indices))| {
                let entry = DependencyEntry {
                    phase_mask,
                    tasks: BitList::from_indices(&indices),
                };
                (key, entry)
            })
            .collect();

        Self { entries }
    }

    pub fn get(&self, key: &DependencyKey) -> Option<&DependencyEntry> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &DependencyKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
