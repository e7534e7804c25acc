//! Checkpoint of [`DataBuffer`].
//!
//! The pending queues are stored from the newest to the oldest experience, followed by
//! the ring buffers, the priority tree and the number of written transitions. The state
//! of prioritized sampling is not part of the checkpoint: a loading buffer keeps its own
//! configuration, generator and exponent schedule, see [`PerConfig::n_updates_done`].
//!
//! [`PerConfig::n_updates_done`]: super::PerConfig::n_updates_done
use super::{BoundedDeque, DataBuffer};
use crate::{
    checkpoint::{read_field, read_usize, read_vec, write_field, Checkpoint},
    error::MemoryError,
    priority_tree::PriorityTree,
};
use log::info;
use std::io::{Read, Write};

/// Fields of a buffer read from a checkpoint.
struct Snapshot {
    capacity: usize,
    n_steps: usize,
    gamma: f32,
    pending_actions: BoundedDeque<i32>,
    pending_returns: BoundedDeque<f32>,
    pending_dones: BoundedDeque<bool>,
    actions: Vec<i32>,
    returns: Vec<f32>,
    dones: Vec<bool>,
    priorities: PriorityTree,
    current_id: usize,
}

fn read_pending<R, T>(reader: &mut R, name: &str, n_steps: usize) -> Result<BoundedDeque<T>, MemoryError>
where
    R: Read,
    T: serde::de::DeserializeOwned,
{
    let items: Vec<T> = read_field(reader)?;
    let len = items.len();
    BoundedDeque::from_vec(n_steps, items).ok_or_else(|| {
        MemoryError::CorruptCheckpoint(format!(
            "{} has {} elements, more than n_steps = {}",
            name, len, n_steps
        ))
    })
}

fn corrupt(msg: String) -> MemoryError {
    MemoryError::CorruptCheckpoint(msg)
}

impl Snapshot {
    fn read_from<R: Read>(reader: &mut R) -> Result<Self, MemoryError> {
        let capacity = read_usize(reader, "capacity")?;
        let n_steps = read_usize(reader, "n_steps")?;
        let gamma: f32 = read_field(reader)?;
        if capacity == 0 || n_steps == 0 {
            return Err(corrupt(format!(
                "invalid buffer shape: capacity = {}, n_steps = {}",
                capacity, n_steps
            )));
        }

        let pending_actions = read_pending(reader, "past_actions", n_steps)?;
        let pending_returns = read_pending(reader, "past_rewards", n_steps)?;
        let pending_dones = read_pending(reader, "past_dones", n_steps)?;
        if pending_actions.len() != pending_returns.len()
            || pending_actions.len() != pending_dones.len()
        {
            return Err(corrupt(format!(
                "pending queues have different lengths: {}, {}, {}",
                pending_actions.len(),
                pending_returns.len(),
                pending_dones.len()
            )));
        }

        let actions = read_vec(reader, "actions", capacity)?;
        let returns = read_vec(reader, "rewards", capacity)?;
        let dones = read_vec(reader, "dones", capacity)?;

        let priorities = PriorityTree::read_from(reader)?;
        let current_id = read_usize(reader, "current_id")?;
        if priorities.capacity() != capacity {
            return Err(corrupt(format!(
                "priority tree capacity = {}, expected {}",
                priorities.capacity(),
                capacity
            )));
        }
        if priorities.current_id() != current_id {
            return Err(corrupt(format!(
                "priority tree current_id = {}, expected {}",
                priorities.current_id(),
                current_id
            )));
        }

        Ok(Self {
            capacity,
            n_steps,
            gamma,
            pending_actions,
            pending_returns,
            pending_dones,
            actions,
            returns,
            dones,
            priorities,
            current_id,
        })
    }
}

impl Checkpoint for DataBuffer {
    fn save<W: Write>(&self, writer: &mut W) -> Result<(), MemoryError> {
        write_field(writer, &(self.capacity as u64))?;
        write_field(writer, &(self.n_steps as u64))?;
        write_field(writer, &self.gamma)?;
        write_field(writer, &self.pending_actions.to_vec())?;
        write_field(writer, &self.pending_returns.to_vec())?;
        write_field(writer, &self.pending_dones.to_vec())?;
        write_field(writer, &self.actions)?;
        write_field(writer, &self.returns)?;
        write_field(writer, &self.dones)?;
        self.priorities.save(writer)?;
        write_field(writer, &(self.current_id as u64))?;
        Ok(())
    }

    /// Overwrites the buffer with the content of the checkpoint.
    ///
    /// The configuration of prioritized sampling, the random number generator and the
    /// exponent schedule are kept. The last sampled batch is forgotten.
    fn load<R: Read>(&mut self, reader: &mut R) -> Result<(), MemoryError> {
        let s = Snapshot::read_from(reader)?;
        self.capacity = s.capacity;
        self.n_steps = s.n_steps;
        self.gamma = s.gamma;
        self.pending_actions = s.pending_actions;
        self.pending_returns = s.pending_returns;
        self.pending_dones = s.pending_dones;
        self.actions = s.actions;
        self.returns = s.returns;
        self.dones = s.dones;
        self.priorities = s.priorities;
        self.current_id = s.current_id;

        self.per_state.last_indices.clear();
        self.per_state.last_weights.clear();

        info!(
            "Loaded data buffer with capacity = {}, n_steps = {}, current_id = {}",
            self.capacity, self.n_steps, self.current_id
        );
        Ok(())
    }
}
