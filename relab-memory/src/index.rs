//! Logical and physical indices of the ring buffers.
//!
//! Elements are addressed from the outside by a [`LogicalIndex`], where `0` is
//! the oldest element still stored. Internally, the element lives in a
//! [`SlotIndex`] of a ring buffer of fixed capacity. Once the ring has wrapped
//! around, the oldest element sits in the slot that will be overwritten next,
//! i.e., `current_id % capacity`.
use std::fmt;

/// Index of an element as seen by the users of a buffer, `0` being the oldest one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LogicalIndex(pub usize);

/// Position of an element within a ring buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SlotIndex(pub usize);

impl From<usize> for LogicalIndex {
    fn from(ix: usize) -> Self {
        Self(ix)
    }
}

impl From<LogicalIndex> for usize {
    fn from(ix: LogicalIndex) -> Self {
        ix.0
    }
}

impl fmt::Display for LogicalIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Maps logical indices to ring slots and back for a ring of `capacity` slots
/// into which `current_id` elements have been written so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingIndexer {
    capacity: usize,
    current_id: usize,
}

impl RingIndexer {
    /// Creates an indexer. `capacity` must be positive.
    pub fn new(capacity: usize, current_id: usize) -> Self {
        debug_assert!(capacity > 0);
        Self {
            capacity,
            current_id,
        }
    }

    /// Returns the number of elements currently addressable.
    pub fn size(&self) -> usize {
        self.current_id.min(self.capacity)
    }

    fn wrapped(&self) -> bool {
        self.current_id >= self.capacity
    }

    /// Converts a logical index into the slot holding the element.
    pub fn internal(&self, ix: LogicalIndex) -> SlotIndex {
        let ix = if self.wrapped() {
            ix.0 % self.capacity + self.current_id % self.capacity
        } else {
            ix.0
        };
        SlotIndex(ix % self.capacity)
    }

    /// Converts a slot into the logical index of the element it holds.
    pub fn external(&self, slot: SlotIndex) -> LogicalIndex {
        let slot = slot.0 % self.capacity;
        if self.wrapped() {
            let oldest = self.current_id % self.capacity;
            LogicalIndex((slot + self.capacity - oldest) % self.capacity)
        } else {
            LogicalIndex(slot)
        }
    }

    /// Returns the slot of the next element to be written.
    pub fn next_slot(&self) -> SlotIndex {
        SlotIndex(self.current_id % self.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_before_wraparound() {
        let ixr = RingIndexer::new(5, 3);
        assert_eq!(ixr.size(), 3);
        assert_eq!(ixr.internal(LogicalIndex(0)), SlotIndex(0));
        assert_eq!(ixr.internal(LogicalIndex(2)), SlotIndex(2));
        assert_eq!(ixr.next_slot(), SlotIndex(3));
    }

    #[test]
    fn test_internal_after_wraparound() {
        // Seven writes into five slots: slots 0 and 1 hold the 6th and 7th elements.
        let ixr = RingIndexer::new(5, 7);
        assert_eq!(ixr.size(), 5);
        assert_eq!(ixr.internal(LogicalIndex(0)), SlotIndex(2));
        assert_eq!(ixr.internal(LogicalIndex(2)), SlotIndex(4));
        assert_eq!(ixr.internal(LogicalIndex(3)), SlotIndex(0));
        assert_eq!(ixr.internal(LogicalIndex(4)), SlotIndex(1));
        assert_eq!(ixr.external(SlotIndex(1)), LogicalIndex(4));
        assert_eq!(ixr.external(SlotIndex(2)), LogicalIndex(0));
    }

    #[test]
    fn test_bijection() {
        for capacity in 1..9 {
            for current_id in 0..(3 * capacity + 2) {
                let ixr = RingIndexer::new(capacity, current_id);
                for e in 0..ixr.size() {
                    let slot = ixr.internal(LogicalIndex(e));
                    assert!(slot.0 < capacity);
                    assert_eq!(ixr.external(slot), LogicalIndex(e));
                }
            }
        }
    }
}
