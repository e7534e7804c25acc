//! Configuration of [`PriorityTree`](super::PriorityTree).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`PriorityTree`](super::PriorityTree).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PriorityTreeConfig {
    /// The number of priorities the tree can store.
    pub capacity: usize,

    /// Priority reported by [`PriorityTree::max()`](super::PriorityTree::max) while the tree is empty,
    /// i.e., the priority given to the first elements.
    pub initial_priority: f32,

    /// The number of children of each node of the sum-tree and the max-tree.
    pub n_children: usize,
}

impl Default for PriorityTreeConfig {
    fn default() -> Self {
        Self {
            capacity: 10000,
            initial_priority: 1.0,
            n_children: 10,
        }
    }
}

impl PriorityTreeConfig {
    /// Sets the capacity of the tree.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the priority given to the first elements.
    pub fn initial_priority(mut self, initial_priority: f32) -> Self {
        self.initial_priority = initial_priority;
        self
    }

    /// Sets the number of children of each node.
    pub fn n_children(mut self, n_children: usize) -> Self {
        self.n_children = n_children;
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
