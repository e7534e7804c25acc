//! Batches of transitions read from a [`DataBuffer`](super::DataBuffer).
use crate::index::LogicalIndex;

/// Transitions gathered from the ring buffers.
///
/// For each transition, the action taken at time `t`, the n-step return from time `t`,
/// and whether the episode ended within those `n` steps.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Transitions {
    /// Actions at time `t`.
    pub actions: Vec<i32>,

    /// n-step returns from time `t`.
    pub returns: Vec<f32>,

    /// Episode termination flags at time `t + n`.
    pub dones: Vec<bool>,
}

impl Transitions {
    /// Creates an empty batch able to hold `capacity` transitions without reallocation.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            actions: Vec::with_capacity(capacity),
            returns: Vec::with_capacity(capacity),
            dones: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of transitions in the batch.
    pub fn len(&self) -> usize {
        self.returns.len()
    }

    /// Returns `true` if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    /// Decomposes the batch into actions, returns and dones.
    pub fn unpack(self) -> (Vec<i32>, Vec<f32>, Vec<bool>) {
        (self.actions, self.returns, self.dones)
    }
}

/// Transitions sampled proportionally to their priorities.
#[derive(Clone, Debug, PartialEq)]
pub struct SampledBatch {
    /// Logical indices of the sampled transitions, to report new priorities.
    pub indices: Vec<LogicalIndex>,

    /// The sampled transitions.
    pub transitions: Transitions,

    /// Importance sampling weights, normalized by their maximum within the batch.
    pub weights: Vec<f32>,
}
