#![warn(missing_docs)]
//! Prioritized n-step replay memory for reinforcement learning.
//!
//! The crate provides two components:
//!
//! * [`PriorityTree`] keeps one priority per stored element in a ring buffer, together
//!   with a sum tree and a max tree over the priorities. It samples elements
//!   proportionally to their priorities in logarithmic time.
//! * [`DataBuffer`] turns a stream of experiences into n-step transitions, stores them
//!   in ring buffers and samples them through an embedded [`PriorityTree`].
//!
//! Both can be saved to and restored from a binary stream via the [`Checkpoint`] trait.
//!
//! ```rust
//! use relab_memory::{DataBuffer, DataBufferConfig, Experience};
//!
//! let config = DataBufferConfig::default().capacity(100).n_steps(3).gamma(0.5);
//! let mut buffer = DataBuffer::build(&config).unwrap();
//! for t in 0..4 {
//!     buffer.append(Experience::new(t, 1.0, false));
//! }
//! assert_eq!(buffer.size(), 2);
//!
//! let batch = buffer.sample(8).unwrap();
//! let td_errors = vec![0.5; batch.indices.len()];
//! buffer.update_priorities(&batch.indices, &td_errors).unwrap();
//! ```
pub mod checkpoint;
pub mod error;
pub mod index;
mod util;

mod priority_tree;
pub use priority_tree::{PriorityTree, PriorityTreeConfig};

mod data_buffer;
pub use data_buffer::{
    BetaSchedule, BoundedDeque, DataBuffer, DataBufferConfig, Experience, PerConfig, SampledBatch,
    Transitions,
};

pub use checkpoint::Checkpoint;
pub use error::MemoryError;
pub use index::{LogicalIndex, RingIndexer, SlotIndex};
