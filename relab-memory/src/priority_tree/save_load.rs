//! Checkpoint of [`PriorityTree`].
use super::{
    level_tree::{level_len, LevelTree},
    tree_depth, PriorityTree,
};
use crate::{
    checkpoint::{read_field, read_usize, read_vec, write_field, Checkpoint},
    error::MemoryError,
};
use log::info;
use std::io::{Read, Write};

impl PriorityTree {
    /// Reads a priority tree from a checkpoint, checking the consistency of its fields.
    pub(crate) fn read_from<R: Read>(reader: &mut R) -> Result<Self, MemoryError> {
        let initial_priority: f32 = read_field(reader)?;
        let capacity = read_usize(reader, "capacity")?;
        let n_children = read_usize(reader, "n_children")?;
        let depth = read_usize(reader, "depth")?;
        let current_id = read_usize(reader, "current_id")?;
        let need_refresh_all: bool = read_field(reader)?;

        if capacity == 0 || n_children < 2 {
            return Err(MemoryError::CorruptCheckpoint(format!(
                "invalid tree shape: capacity = {}, n_children = {}",
                capacity, n_children
            )));
        }
        let expected_depth = tree_depth(capacity, n_children);
        if depth != expected_depth {
            return Err(MemoryError::CorruptCheckpoint(format!(
                "depth = {}, expected {} for capacity = {} and n_children = {}",
                depth, expected_depth, capacity, n_children
            )));
        }

        let priorities: Vec<f32> = read_vec(reader, "priorities", capacity)?;

        let mut sum_levels: Vec<Vec<f64>> = Vec::with_capacity(depth);
        for d in 0..depth {
            let name = format!("sum_tree[{}]", d);
            sum_levels.push(read_vec(reader, &name, level_len(depth, n_children, d))?);
        }

        let max_levels: Vec<Vec<f32>> = read_vec(reader, "max_tree", depth)?;
        for (d, level) in max_levels.iter().enumerate() {
            let expected = level_len(depth, n_children, d);
            if level.len() != expected {
                return Err(MemoryError::CorruptCheckpoint(format!(
                    "max_tree[{}] has {} elements, expected {}",
                    d,
                    level.len(),
                    expected
                )));
            }
        }

        Ok(Self {
            initial_priority,
            capacity,
            n_children,
            depth,
            current_id,
            need_refresh_all,
            priorities,
            sum_tree: LevelTree::from_levels(sum_levels, n_children),
            max_tree: LevelTree::from_levels(max_levels, n_children),
        })
    }
}

impl Checkpoint for PriorityTree {
    fn save<W: Write>(&self, writer: &mut W) -> Result<(), MemoryError> {
        write_field(writer, &self.initial_priority)?;
        write_field(writer, &(self.capacity as u64))?;
        write_field(writer, &(self.n_children as u64))?;
        write_field(writer, &(self.depth as u64))?;
        write_field(writer, &(self.current_id as u64))?;
        write_field(writer, &self.need_refresh_all)?;
        write_field(writer, &self.priorities)?;
        for level in self.sum_tree.levels() {
            write_field(writer, level)?;
        }
        write_field(writer, self.max_tree.levels())?;
        Ok(())
    }

    fn load<R: Read>(&mut self, reader: &mut R) -> Result<(), MemoryError> {
        *self = Self::read_from(reader)?;
        info!(
            "Loaded priority tree with capacity = {}, current_id = {}",
            self.capacity, self.current_id
        );
        Ok(())
    }
}
