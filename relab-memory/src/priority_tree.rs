//! Priorities of the experiences stored in a replay buffer.
//!
//! [`PriorityTree`] keeps one priority per slot of a ring buffer, together with a
//! sum-tree and a max-tree built on top of the priorities. Both trees are perfect
//! n-ary trees, so that sampling an element proportionally to its priority,
//! querying the maximum priority, and updating a single priority all take
//! `O(log capacity)` time.
mod config;
mod level_tree;
mod sampling;
mod save_load;
use crate::{
    error::MemoryError,
    index::{LogicalIndex, RingIndexer, SlotIndex},
    util::{fmt_levels, fmt_truncated},
};
pub use config::PriorityTreeConfig;
use level_tree::{LevelTree, MaxOp, SumOp};
use log::{debug, info, trace};
use std::fmt;

/// Returns the number of levels above the leaves of a tree with `n_children` children
/// per node covering `capacity` leaves, i.e., `ceil(log_n_children(capacity))`, but at least 1.
pub(crate) fn tree_depth(capacity: usize, n_children: usize) -> usize {
    let mut depth = 1;
    let mut span = n_children;
    while span < capacity {
        span = span.saturating_mul(n_children);
        depth += 1;
    }
    depth
}

/// Stores experience priorities in a ring buffer along with a sum-tree and a max-tree.
///
/// Priorities are addressed with [`LogicalIndex`], `0` being the oldest stored element.
/// Once `capacity` priorities have been appended, each new priority overwrites the oldest one.
///
/// The sum-tree holds `f64` values while priorities are `f32`. The first time the maximum
/// priority departs from `initial_priority`, the sum-tree is rebuilt from scratch.
pub struct PriorityTree {
    initial_priority: f32,
    capacity: usize,
    n_children: usize,
    depth: usize,
    current_id: usize,
    need_refresh_all: bool,
    priorities: Vec<f32>,
    sum_tree: LevelTree<SumOp>,
    max_tree: LevelTree<MaxOp>,
}

impl PriorityTree {
    /// Creates a priority tree.
    ///
    /// # Arguments
    ///
    /// * `capacity` - The number of priorities the tree can store
    /// * `initial_priority` - The priority reported by [`PriorityTree::max()`] while empty
    /// * `n_children` - The number of children of each node
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidCapacity`] if `capacity` is zero and
    /// [`MemoryError::InvalidChildren`] if `n_children < 2`.
    pub fn new(capacity: usize, initial_priority: f32, n_children: usize) -> Result<Self, MemoryError> {
        if capacity == 0 {
            return Err(MemoryError::InvalidCapacity(capacity));
        }
        if n_children < 2 {
            return Err(MemoryError::InvalidChildren(n_children));
        }

        let depth = tree_depth(capacity, n_children);
        info!(
            "Construct priority tree with capacity = {}, n_children = {}, depth = {}",
            capacity, n_children, depth
        );

        Ok(Self {
            initial_priority,
            capacity,
            n_children,
            depth,
            current_id: 0,
            need_refresh_all: true,
            priorities: vec![0f32; capacity],
            sum_tree: LevelTree::new(depth, n_children),
            max_tree: LevelTree::new(depth, n_children),
        })
    }

    /// Creates a priority tree from its configuration.
    pub fn build(config: &PriorityTreeConfig) -> Result<Self, MemoryError> {
        Self::new(config.capacity, config.initial_priority, config.n_children)
    }

    /// Returns the sum of all priorities, or zero if nothing was appended yet.
    pub fn sum(&self) -> f64 {
        if self.current_id == 0 {
            return 0.0;
        }
        self.sum_tree.root()
    }

    /// Returns the largest priority, or the initial priority if nothing was appended yet.
    pub fn max(&self) -> f32 {
        if self.current_id == 0 {
            return self.initial_priority;
        }
        self.max_tree.root()
    }

    /// Empties the tree, keeping its configuration.
    pub fn clear(&mut self) {
        self.current_id = 0;
        self.need_refresh_all = true;
        self.priorities.iter_mut().for_each(|p| *p = 0.0);
        self.sum_tree.clear();
        self.max_tree.clear();
    }

    /// Returns the number of stored priorities.
    pub fn size(&self) -> usize {
        self.indexer().size()
    }

    /// Returns `true` if no priority is stored.
    pub fn is_empty(&self) -> bool {
        self.current_id == 0
    }

    /// Returns the number of priorities the tree can store.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of children of each node.
    pub fn n_children(&self) -> usize {
        self.n_children
    }

    /// Returns the number of levels above the leaves.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the priority given to the first elements.
    pub fn initial_priority(&self) -> f32 {
        self.initial_priority
    }

    /// Returns the number of priorities appended since construction or the last clear.
    pub fn current_id(&self) -> usize {
        self.current_id
    }

    /// Appends a priority, overwriting the oldest one if the tree is full.
    pub fn append(&mut self, priority: f32) {
        let slot = self.indexer().next_slot();
        trace!("PriorityTree::append(): slot = {}, priority = {}", slot, priority);

        self.current_id += 1;
        self.write(slot, priority);
    }

    /// Returns the priority of the element at `index`.
    pub fn get(&self, index: LogicalIndex) -> Result<f32, MemoryError> {
        let slot = self.slot(index)?;
        Ok(self.priorities[slot.0])
    }

    /// Replaces the priority of the element at `index`.
    pub fn set(&mut self, index: LogicalIndex, priority: f32) -> Result<(), MemoryError> {
        let slot = self.slot(index)?;
        self.write(slot, priority);
        Ok(())
    }

    /// Returns the mapping between logical indices and slots in the current state.
    pub fn indexer(&self) -> RingIndexer {
        RingIndexer::new(self.capacity, self.current_id)
    }

    /// Converts a logical index to a slot, checking that it refers to a stored element.
    fn slot(&self, index: LogicalIndex) -> Result<SlotIndex, MemoryError> {
        let size = self.size();
        if index.0 >= size {
            return Err(MemoryError::IndexOutOfRange {
                index: index.0,
                size,
            });
        }
        Ok(self.indexer().internal(index))
    }

    /// Writes a priority into a slot and updates both trees.
    fn write(&mut self, slot: SlotIndex, priority: f32) {
        let old_priority = self.priorities[slot.0];
        self.priorities[slot.0] = priority;
        self.update_max_tree(slot, old_priority);
        self.update_sum_tree(slot, old_priority);

        if self.need_refresh_all && self.max() != self.initial_priority {
            self.refresh_all_sum_tree();
            self.need_refresh_all = false;
        }
    }

    /// Returns the index of the parent of a node.
    pub fn parent_index(&self, idx: usize) -> usize {
        idx / self.n_children
    }

    /// Adds the change of the priority in `slot` to all its ancestors in the sum-tree.
    fn update_sum_tree(&mut self, slot: SlotIndex, old_priority: f32) {
        self.sum_tree.propagate(&self.priorities, slot.0, old_priority);
    }

    /// Updates the ancestors of `slot` in the max-tree, stopping at the first unaffected one.
    fn update_max_tree(&mut self, slot: SlotIndex, old_priority: f32) {
        self.max_tree.propagate(&self.priorities, slot.0, old_priority);
    }

    /// Recomputes the whole sum-tree from the stored priorities.
    fn refresh_all_sum_tree(&mut self) {
        debug!(
            "Refresh the whole sum-tree (max priority = {}, size = {})",
            self.max(),
            self.size()
        );
        let size = self.size();
        self.sum_tree.rebuild(&self.priorities[..size]);
    }

    /// Returns `true` until the first maximum priority different from the initial one is seen.
    pub fn need_refresh_all(&self) -> bool {
        self.need_refresh_all
    }
}

impl fmt::Display for PriorityTree {
    /// Prints a summary of the tree. The alternate form (`{:#}`) also prints
    /// the first priorities and the first nodes of each level of both trees.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PriorityTree[initial_priority: {}, capacity: {}, n_children: {}, depth: {}, current_id: {}, need_refresh_all: {}]",
            self.initial_priority,
            self.capacity,
            self.n_children,
            self.depth,
            self.current_id,
            self.need_refresh_all
        )?;

        if f.alternate() {
            let fmt_value = |v: &f32| format!("{:.1}", v);
            write!(
                f,
                "\n #-> priorities = {}",
                fmt_truncated(&self.priorities, 10, fmt_value)
            )?;
            write!(
                f,
                "\n #-> sum_tree = {}",
                fmt_levels(self.sum_tree.levels(), 3, |v: &f64| format!("{:.1}", v))
            )?;
            write!(
                f,
                "\n #-> max_tree = {}",
                fmt_levels(self.max_tree.levels(), 3, fmt_value)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-4, "{} != {}", a, b);
    }

    fn check_consistency(tree: &PriorityTree, expected: &[f32]) {
        assert_eq!(tree.size(), expected.len());
        let sum: f64 = expected.iter().map(|&p| p as f64).sum();
        let max = expected.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        assert_close(tree.sum(), sum);
        assert_eq!(tree.max(), max);
        for (i, &p) in expected.iter().enumerate() {
            assert_eq!(tree.get(LogicalIndex(i)).unwrap(), p);
        }
    }

    #[test]
    fn test_tree_depth() {
        assert_eq!(tree_depth(1, 2), 1);
        assert_eq!(tree_depth(2, 2), 1);
        assert_eq!(tree_depth(3, 2), 2);
        assert_eq!(tree_depth(8, 2), 3);
        assert_eq!(tree_depth(9, 2), 4);
        assert_eq!(tree_depth(100, 10), 2);
        assert_eq!(tree_depth(101, 10), 3);
        assert_eq!(tree_depth(1_000_000, 10), 6);
    }

    #[test]
    fn test_parent_index() {
        let tree = PriorityTree::new(100, 1.0, 10).unwrap();
        assert_eq!(tree.parent_index(0), 0);
        assert_eq!(tree.parent_index(9), 0);
        assert_eq!(tree.parent_index(10), 1);
        assert_eq!(tree.parent_index(99), 9);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            PriorityTree::new(0, 1.0, 10),
            Err(MemoryError::InvalidCapacity(0))
        ));
        assert!(matches!(
            PriorityTree::new(10, 1.0, 1),
            Err(MemoryError::InvalidChildren(1))
        ));
    }

    #[test]
    fn test_empty_tree() {
        let tree = PriorityTree::new(5, 2.0, 2).unwrap();
        assert_eq!(tree.sum(), 0.0);
        assert_eq!(tree.max(), 2.0);
        assert_eq!(tree.size(), 0);
        assert!(tree.is_empty());
        assert!(matches!(
            tree.get(LogicalIndex(0)),
            Err(MemoryError::IndexOutOfRange { index: 0, size: 0 })
        ));
    }

    #[test]
    fn test_append_and_set() {
        let mut tree = PriorityTree::new(6, 1.0, 2).unwrap();
        let mut expected = vec![];
        for p in [1.0f32, 1.0, 1.0].iter() {
            tree.append(*p);
            expected.push(*p);
            check_consistency(&tree, &expected);
        }
        assert!(tree.need_refresh_all());

        // The first priority different from the initial one triggers the refresh.
        tree.set(LogicalIndex(1), 4.0).unwrap();
        expected[1] = 4.0;
        check_consistency(&tree, &expected);
        assert!(!tree.need_refresh_all());

        for p in [0.5f32, 2.5].iter() {
            tree.append(*p);
            expected.push(*p);
            check_consistency(&tree, &expected);
        }

        tree.set(LogicalIndex(1), 0.1).unwrap();
        expected[1] = 0.1;
        check_consistency(&tree, &expected);
        assert!(matches!(
            tree.set(LogicalIndex(5), 1.0),
            Err(MemoryError::IndexOutOfRange { index: 5, size: 5 })
        ));
    }

    #[test]
    fn test_consistency_over_many_updates() {
        let rng = fastrand::Rng::with_seed(7);
        let mut tree = PriorityTree::new(37, 1.0, 3).unwrap();
        let mut expected: Vec<f32> = vec![];

        for step in 0..500 {
            if step % 3 == 0 || expected.is_empty() {
                let p = rng.f32() * 10.0;
                tree.append(p);
                if expected.len() == 37 {
                    expected.remove(0);
                }
                expected.push(p);
            } else {
                let i = rng.usize(..expected.len());
                let p = rng.f32() * 10.0;
                tree.set(LogicalIndex(i), p).unwrap();
                expected[i] = p;
            }
            check_consistency(&tree, &expected);
        }
    }

    #[test]
    fn test_wraparound_overwrite() {
        let capacity = 4;
        let mut tree = PriorityTree::new(capacity, 1.0, 2).unwrap();
        for i in 0..=capacity {
            tree.append((i + 1) as f32);
        }
        assert_eq!(tree.size(), capacity);
        assert_eq!(tree.get(LogicalIndex(0)).unwrap(), 2.0);
        assert_eq!(tree.get(LogicalIndex(3)).unwrap(), 5.0);
        check_consistency(&tree, &[2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_clear() {
        let mut tree = PriorityTree::new(4, 1.0, 2).unwrap();
        tree.append(3.0);
        tree.append(5.0);
        assert!(!tree.need_refresh_all());
        tree.clear();
        assert_eq!(tree.size(), 0);
        assert_eq!(tree.sum(), 0.0);
        assert_eq!(tree.max(), 1.0);
        assert!(tree.need_refresh_all());
        assert_eq!(tree.capacity(), 4);

        tree.append(2.0);
        check_consistency(&tree, &[2.0]);
    }

    #[test]
    fn test_display() {
        let mut tree = PriorityTree::new(3, 1.0, 2).unwrap();
        tree.append(2.0);
        let summary = format!("{}", tree);
        assert_eq!(
            summary,
            "PriorityTree[initial_priority: 1, capacity: 3, n_children: 2, depth: 2, current_id: 1, need_refresh_all: false]"
        );
        let verbose = format!("{:#}", tree);
        assert!(verbose.contains(" #-> priorities = [2.0, 0.0, 0.0]"));
        assert!(verbose.contains(" #-> sum_tree = [[2.0, 0.0], [2.0]]"));
        assert!(verbose.contains(" #-> max_tree = [[2.0, 0.0], [2.0]]"));
    }
}
