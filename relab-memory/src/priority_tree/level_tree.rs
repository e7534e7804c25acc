//! Perfect n-ary trees stored level by level above an array of leaves.
//!
//! The sum-tree and the max-tree of [`PriorityTree`](super::PriorityTree) share
//! the same layout and the same walk from a leaf to the root. They only differ
//! in how a node reacts to the change of one of its leaves, which is captured
//! by [`TreeOp`].
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt::Display, marker::PhantomData};

/// Children of a node, either leaves (priorities) or nodes of the level below.
pub enum Children<'a, T> {
    /// Priorities, children of the nodes at level 0.
    Leaves(&'a [f32]),

    /// Nodes of the level below.
    Nodes(&'a [T]),
}

/// Combine operation of a [`LevelTree`].
pub trait TreeOp {
    /// Type of the values stored in the nodes.
    type Value: Copy + Default + PartialEq + Display + Serialize + DeserializeOwned;

    /// Returns the new value of `node` after a leaf below it changed from `old` to `new`,
    /// or `None` if neither the node nor its ancestors are affected.
    fn update(
        node: Self::Value,
        old: f32,
        new: f32,
        children: Children<'_, Self::Value>,
    ) -> Option<Self::Value>;

    /// Folds a leaf into a node when the tree is rebuilt from scratch.
    fn accumulate(node: Self::Value, leaf: f32) -> Self::Value;
}

/// Sum of the leaves, kept in `f64` to limit the drift of incremental updates.
pub struct SumOp;

impl TreeOp for SumOp {
    type Value = f64;

    fn update(node: f64, old: f32, new: f32, _children: Children<'_, f64>) -> Option<f64> {
        // Every ancestor of the leaf includes its value.
        Some(node + (new as f64 - old as f64))
    }

    fn accumulate(node: f64, leaf: f32) -> f64 {
        node + leaf as f64
    }
}

/// Maximum of the leaves.
pub struct MaxOp;

impl MaxOp {
    fn max_child_value(children: Children<'_, f32>) -> f32 {
        let block = match children {
            Children::Leaves(block) => block,
            Children::Nodes(block) => block,
        };
        block.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }
}

impl TreeOp for MaxOp {
    type Value = f32;

    fn update(node: f32, old: f32, new: f32, children: Children<'_, f32>) -> Option<f32> {
        if node == old {
            // The old leaf may have been the maximum of this block.
            Some(Self::max_child_value(children))
        } else if node < new {
            Some(new)
        } else {
            None
        }
    }

    fn accumulate(node: f32, leaf: f32) -> f32 {
        node.max(leaf)
    }
}

/// A perfect n-ary tree whose level `d` has `n_children^(depth - 1 - d)` nodes.
///
/// Level 0 is the level right above the leaves and the last level holds the root.
pub struct LevelTree<O: TreeOp> {
    n_children: usize,
    levels: Vec<Vec<O::Value>>,
    phantom: PhantomData<O>,
}

/// Returns the number of nodes at `level` in a tree of the given depth.
pub fn level_len(depth: usize, n_children: usize, level: usize) -> usize {
    n_children.pow((depth - 1 - level) as u32)
}

impl<O: TreeOp> LevelTree<O> {
    /// Creates a tree filled with default values (zeros).
    pub fn new(depth: usize, n_children: usize) -> Self {
        let levels = (0..depth)
            .map(|d| vec![O::Value::default(); level_len(depth, n_children, d)])
            .collect();
        Self {
            n_children,
            levels,
            phantom: PhantomData,
        }
    }

    /// Creates a tree from levels read from a checkpoint. The caller checks their shape.
    pub fn from_levels(levels: Vec<Vec<O::Value>>, n_children: usize) -> Self {
        Self {
            n_children,
            levels,
            phantom: PhantomData,
        }
    }

    /// Returns the nodes at `level`.
    pub fn level(&self, level: usize) -> &[O::Value] {
        &self.levels[level]
    }

    /// Returns all levels, the one nearest to the leaves first.
    pub fn levels(&self) -> &[Vec<O::Value>] {
        &self.levels
    }

    /// Returns the value of the root node.
    pub fn root(&self) -> O::Value {
        self.levels
            .last()
            .and_then(|level| level.first().copied())
            .unwrap_or_default()
    }

    /// Resets every node to its default value.
    pub fn clear(&mut self) {
        for level in self.levels.iter_mut() {
            level.iter_mut().for_each(|v| *v = O::Value::default());
        }
    }

    /// Propagates the change of `leaves[slot]` from `old` to its current value.
    ///
    /// The walk goes from the parent of the leaf up to the root and stops as soon as
    /// [`TreeOp::update`] reports that a node is unaffected.
    pub fn propagate(&mut self, leaves: &[f32], slot: usize, old: f32) {
        let n = self.n_children;
        let new = leaves[slot];
        let mut parent = slot / n;

        for d in 0..self.levels.len() {
            let (below, rest) = self.levels.split_at_mut(d);
            let first = parent * n;
            let children = if d == 0 {
                let end = (first + n).min(leaves.len());
                Children::Leaves(&leaves[first..end])
            } else {
                Children::Nodes(&below[d - 1][first..first + n])
            };

            match O::update(rest[0][parent], old, new, children) {
                Some(value) => rest[0][parent] = value,
                None => break,
            }
            parent /= n;
        }
    }

    /// Recomputes every node from the given leaves.
    pub fn rebuild(&mut self, leaves: &[f32]) {
        self.clear();
        let n = self.n_children;
        for (slot, &leaf) in leaves.iter().enumerate() {
            let mut parent = slot / n;
            for level in self.levels.iter_mut() {
                level[parent] = O::accumulate(level[parent], leaf);
                parent /= n;
            }
        }
    }
}
