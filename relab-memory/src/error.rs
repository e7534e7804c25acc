//! Errors in the library.
use thiserror::Error;

/// Errors raised by the priority tree, the data buffer and their checkpoints.
#[derive(Error, Debug)]
pub enum MemoryError {
    /// The capacity of a tree or a buffer must be positive.
    #[error("Invalid capacity: {0} (must be positive)")]
    InvalidCapacity(usize),

    /// Each node of the priority trees needs at least two children.
    #[error("Invalid number of children: {0} (must be at least 2)")]
    InvalidChildren(usize),

    /// The n-step window must hold at least one step.
    #[error("Invalid number of steps: {0} (must be positive)")]
    InvalidSteps(usize),

    /// A logical index does not refer to a stored element.
    #[error("Index out of range: {index} (size = {size})")]
    IndexOutOfRange {
        /// The requested logical index.
        index: usize,
        /// The number of stored elements.
        size: usize,
    },

    /// Two slices that must be zipped have different lengths.
    #[error("Length mismatch: expected {expected} values, got {actual}")]
    LengthMismatch {
        /// The expected number of values.
        expected: usize,
        /// The number of values received.
        actual: usize,
    },

    /// Sampling was requested while nothing has been stored yet.
    #[error("Cannot sample from an empty buffer")]
    EmptyBuffer,

    /// The checkpoint stream is truncated or its fields are inconsistent.
    #[error("Corrupt checkpoint: {0}")]
    CorruptCheckpoint(String),

    /// Reading or writing a checkpoint file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<bincode::Error> for MemoryError {
    fn from(err: bincode::Error) -> Self {
        match *err {
            bincode::ErrorKind::Io(io) if io.kind() != std::io::ErrorKind::UnexpectedEof => {
                MemoryError::Io(io)
            }
            other => MemoryError::CorruptCheckpoint(other.to_string()),
        }
    }
}
