//! Sampling of elements proportionally to their priorities.
use super::PriorityTree;
use crate::{
    error::MemoryError,
    index::{LogicalIndex, SlotIndex},
};

impl PriorityTree {
    /// Samples `n` indices with probabilities proportional to the priorities.
    ///
    /// Indices are drawn with replacement, using the thread-local generator of [`fastrand`].
    pub fn sample_indices(&self, n: usize) -> Result<Vec<LogicalIndex>, MemoryError> {
        self.sample_indices_with(&fastrand::Rng::new(), n)
    }

    /// Samples `n` indices with probabilities proportional to the priorities, using `rng`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::EmptyBuffer`] if no priority is stored.
    pub fn sample_indices_with(
        &self,
        rng: &fastrand::Rng,
        n: usize,
    ) -> Result<Vec<LogicalIndex>, MemoryError> {
        if self.is_empty() {
            return Err(MemoryError::EmptyBuffer);
        }

        let sum = self.sum();
        let indices = (0..n)
            .map(|_| self.tower_sampling(sum * rng.f64()))
            .collect();
        Ok(indices)
    }

    /// Returns the index of the element whose cumulative priority range contains `priority`.
    ///
    /// The sum-tree is walked down from the root. At each node, children are scanned from
    /// left to right and the first one whose range contains `priority` is selected.
    /// Values above [`PriorityTree::sum()`] select the most recent element.
    pub fn tower_sampling(&self, mut priority: f64) -> LogicalIndex {
        let size = self.size();
        if priority > self.sum() {
            return LogicalIndex(size.saturating_sub(1));
        }

        let n = self.n_children;
        let mut index = 0;
        for level in (0..self.depth).rev() {
            let first = n * index;
            let mut total = 0f64;
            let mut selected = None;
            let mut last_nonzero = None;

            for child in first..first + n {
                let value = if level == 0 {
                    // Slots above `size` have never been written.
                    if child >= size {
                        break;
                    }
                    self.priorities[child] as f64
                } else {
                    self.sum_tree.level(level - 1)[child]
                };

                if priority <= total + value {
                    selected = Some((child, total));
                    break;
                }
                if value > 0.0 {
                    last_nonzero = Some((child, total));
                }
                total += value;
            }

            // Rounding errors can leave `priority` slightly above the sum of the children.
            let (child, offset) = selected.or(last_nonzero).unwrap_or((first, 0.0));
            index = child;
            priority -= offset;
        }

        self.indexer().external(SlotIndex(index))
    }

    /// Computes importance sampling weights of the given elements, normalized by their maximum.
    ///
    /// The weight of element `i` is $w_i=\left(N P(i)\right)^{-\beta}$, where `N` is the number of
    /// stored elements and $P(i)$ the probability of sampling element `i`.
    pub fn importance_weights(
        &self,
        indices: &[LogicalIndex],
        beta: f32,
    ) -> Result<Vec<f32>, MemoryError> {
        let sum = self.sum();
        let n = self.size() as f64;
        let ws = indices
            .iter()
            .map(|&ix| -> Result<f64, MemoryError> {
                let p = (self.get(ix)? as f64 / sum).max(f64::MIN_POSITIVE);
                Ok((n * p).powf(-beta as f64))
            })
            .collect::<Result<Vec<_>, MemoryError>>()?;

        let w_max = ws.iter().copied().fold(0f64, f64::max);
        Ok(ws.iter().map(|w| (w / w_max) as f32).collect())
    }
}
