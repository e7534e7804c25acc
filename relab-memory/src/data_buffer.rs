//! Storage of n-step transitions with their priorities.
//!
//! [`DataBuffer`] turns a stream of raw experiences, i.e., (action, reward, done)
//! triples, into n-step transitions and stores them in ring buffers. Each stored
//! transition gets a priority in an embedded [`PriorityTree`], from which batches
//! are sampled proportionally to priorities.
mod batch;
mod beta_schedule;
mod bounded_deque;
mod config;
mod save_load;
use crate::{
    error::MemoryError,
    index::{LogicalIndex, RingIndexer},
    priority_tree::PriorityTree,
    util::fmt_truncated,
};
pub use batch::{SampledBatch, Transitions};
pub use beta_schedule::BetaSchedule;
pub use bounded_deque::BoundedDeque;
pub use config::{DataBufferConfig, PerConfig};
use log::{debug, info, trace};
use std::fmt;

/// A raw experience: the action taken, the reward received, and whether the episode ended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Experience {
    /// The action taken at time `t`.
    pub action: i32,

    /// The reward received after taking the action.
    pub reward: f32,

    /// `true` if the episode ended after taking the action.
    pub done: bool,
}

impl Experience {
    /// Creates an experience.
    pub fn new(action: i32, reward: f32, done: bool) -> Self {
        Self {
            action,
            reward,
            done,
        }
    }
}

/// State of prioritized sampling, not part of checkpoints.
struct PerState {
    config: PerConfig,
    beta_schedule: BetaSchedule,
    rng: fastrand::Rng,
    last_indices: Vec<LogicalIndex>,
    last_weights: Vec<f32>,
}

impl PerState {
    fn new(config: &PerConfig) -> Self {
        Self {
            config: config.clone(),
            beta_schedule: BetaSchedule::from_config(config),
            rng: fastrand::Rng::with_seed(config.seed),
            last_indices: vec![],
            last_weights: vec![],
        }
    }
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// A buffer of n-step transitions (action, n-step return, done) with their priorities.
///
/// # Multistep returns
///
/// Experiences are first kept in three queues of at most `n_steps` elements. When an
/// experience with reward `r` arrives, the `i`-th pending return (counted from the newest
/// one) receives `gamma^(i+1) * r`. A transition is then finalized from the oldest
/// pending entry either
///
/// * when the queues hold `n_steps` entries, giving the full n-step return, or
/// * when the episode ends, in which case every pending entry is finalized, oldest first,
///   with the done flag of the last experience.
///
/// Each finalized transition is written into the ring buffers and appended to the
/// priority tree with the current maximum priority, so that new transitions are sampled
/// at least once with high probability.
///
/// ```mermaid
/// graph LR
///     A[Experience]-->|append|B[Pending queues]
///     B -->|add_datum|C[Ring buffers]
///     B -->|"append(max)"|D[PriorityTree]
///     D -->|sample_indices|E[SampledBatch]
///     C -->|read|E
///     E -->|update_priorities|D
/// ```
///
/// # Indices
///
/// Transitions are addressed with [`LogicalIndex`], `0` being the oldest stored one.
/// The mapping to ring slots is shared with the priority tree.
pub struct DataBuffer {
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
    per_state: PerState,
}

impl DataBuffer {
    /// Creates a data buffer with the default configuration of prioritized sampling.
    ///
    /// # Arguments
    ///
    /// * `capacity` - The number of transitions the buffer can store
    /// * `n_steps` - The number of steps for which rewards are accumulated
    /// * `gamma` - The discount factor
    /// * `initial_priority` - The priority given to the first transitions
    /// * `n_children` - The number of children of each node of the priority trees
    pub fn new(
        capacity: usize,
        n_steps: usize,
        gamma: f32,
        initial_priority: f32,
        n_children: usize,
    ) -> Result<Self, MemoryError> {
        let config = DataBufferConfig {
            capacity,
            n_steps,
            gamma,
            initial_priority,
            n_children,
            per_config: PerConfig::default(),
        };
        Self::build(&config)
    }

    /// Creates a data buffer from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidCapacity`], [`MemoryError::InvalidSteps`] or
    /// [`MemoryError::InvalidChildren`] if the corresponding parameter is invalid.
    pub fn build(config: &DataBufferConfig) -> Result<Self, MemoryError> {
        if config.n_steps == 0 {
            return Err(MemoryError::InvalidSteps(config.n_steps));
        }
        let priorities =
            PriorityTree::new(config.capacity, config.initial_priority, config.n_children)?;
        let capacity = config.capacity;
        info!(
            "Construct data buffer with capacity = {}, n_steps = {}, gamma = {}",
            capacity, config.n_steps, config.gamma
        );

        Ok(Self {
            capacity,
            n_steps: config.n_steps,
            gamma: config.gamma,
            pending_actions: BoundedDeque::new(config.n_steps),
            pending_returns: BoundedDeque::new(config.n_steps),
            pending_dones: BoundedDeque::new(config.n_steps),
            actions: vec![0; capacity],
            returns: vec![0.0; capacity],
            dones: vec![false; capacity],
            priorities,
            current_id: 0,
            per_state: PerState::new(&config.per_config),
        })
    }

    /// Adds an experience and returns the number of transitions it finalized.
    pub fn append(&mut self, experience: Experience) -> usize {
        trace!("DataBuffer::append(): {:?}", experience);

        // Every pending return receives its discounted share of the new reward.
        let gamma = self.gamma;
        for (i, ret) in self.pending_returns.iter_mut().enumerate() {
            *ret += gamma.powi(i as i32 + 1) * experience.reward;
        }

        self.pending_returns.push_front(experience.reward);
        self.pending_actions.push_front(experience.action);
        self.pending_dones.push_front(experience.done);

        if experience.done {
            let done = self.last_pending_done();
            let mut n = 0;
            while let (Some(action), Some(ret)) =
                (self.pending_actions.pop_back(), self.pending_returns.pop_back())
            {
                self.add_datum(action, ret, done);
                n += 1;
            }
            self.pending_actions.clear();
            self.pending_returns.clear();
            self.pending_dones.clear();
            n
        } else if self.pending_returns.len() == self.n_steps {
            let done = self.last_pending_done();
            match (self.pending_actions.pop_back(), self.pending_returns.pop_back()) {
                (Some(action), Some(ret)) => {
                    self.pending_dones.pop_back();
                    self.add_datum(action, ret, done);
                    1
                }
                _ => 0,
            }
        } else {
            0
        }
    }

    /// Returns the done flag of the most recent pending experience.
    fn last_pending_done(&self) -> bool {
        self.pending_dones.front().copied().unwrap_or(false)
    }

    /// Writes a transition into the ring buffers with the current maximum priority.
    ///
    /// # Arguments
    ///
    /// * `action` - The action at time `t`
    /// * `ret` - The n-step return from time `t`
    /// * `done` - Whether the episode ended before time `t + n_steps`
    pub fn add_datum(&mut self, action: i32, ret: f32, done: bool) {
        let slot = RingIndexer::new(self.capacity, self.current_id).next_slot();
        trace!(
            "DataBuffer::add_datum(): slot = {}, action = {}, return = {}, done = {}",
            slot,
            action,
            ret,
            done
        );
        self.actions[slot.0] = action;
        self.returns[slot.0] = ret;
        self.dones[slot.0] = done;

        let max_p = self.priorities.max();
        self.priorities.append(max_p);
        self.current_id += 1;
    }

    /// Gathers the transitions at the given logical indices.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::IndexOutOfRange`] if an index does not refer to a stored transition.
    pub fn read(&self, indices: &[LogicalIndex]) -> Result<Transitions, MemoryError> {
        let indexer = RingIndexer::new(self.capacity, self.current_id);
        let size = indexer.size();
        let mut batch = Transitions::with_capacity(indices.len());

        for &ix in indices {
            if ix.0 >= size {
                return Err(MemoryError::IndexOutOfRange { index: ix.0, size });
            }
            let slot = indexer.internal(ix).0;
            batch.actions.push(self.actions[slot]);
            batch.returns.push(self.returns[slot]);
            batch.dones.push(self.dones[slot]);
        }
        Ok(batch)
    }

    /// Samples transitions proportionally to their priorities.
    ///
    /// The sampled indices and importance weights are kept until the next call,
    /// see [`DataBuffer::report()`].
    pub fn sample(&mut self, batch_size: usize) -> Result<SampledBatch, MemoryError> {
        let indices = self
            .priorities
            .sample_indices_with(&self.per_state.rng, batch_size)?;
        let beta = self.per_state.beta_schedule.beta();
        let weights = self.priorities.importance_weights(&indices, beta)?;
        let transitions = self.read(&indices)?;

        self.per_state.last_indices = indices.clone();
        self.per_state.last_weights = weights.clone();

        Ok(SampledBatch {
            indices,
            transitions,
            weights,
        })
    }

    /// Sets the priorities of transitions from their TD errors, as `(|td_error| + eps)^omega`.
    pub fn update_priorities(
        &mut self,
        indices: &[LogicalIndex],
        td_errors: &[f32],
    ) -> Result<(), MemoryError> {
        if indices.len() != td_errors.len() {
            return Err(MemoryError::LengthMismatch {
                expected: indices.len(),
                actual: td_errors.len(),
            });
        }

        let PerConfig { omega, eps, .. } = self.per_state.config;
        for (&ix, &td_error) in indices.iter().zip(td_errors.iter()) {
            self.priorities.set(ix, (td_error.abs() + eps).powf(omega))?;
        }
        self.per_state.beta_schedule.step();
        Ok(())
    }

    /// Updates the priorities of the last sampled transitions from their losses, and
    /// returns the losses scaled by the importance sampling weights.
    pub fn report(&mut self, losses: &[f32]) -> Result<Vec<f32>, MemoryError> {
        let indices = std::mem::take(&mut self.per_state.last_indices);
        let res = self.update_priorities(&indices, losses);
        self.per_state.last_indices = indices;
        res?;

        Ok(losses
            .iter()
            .zip(self.per_state.last_weights.iter())
            .map(|(loss, w)| loss * w)
            .collect())
    }

    /// Returns the indices of the last sampled transitions.
    pub fn last_indices(&self) -> &[LogicalIndex] {
        &self.per_state.last_indices
    }

    /// Returns the current exponent of importance sampling weights.
    pub fn beta(&self) -> f32 {
        self.per_state.beta_schedule.beta()
    }

    /// Returns the number of calls to [`DataBuffer::update_priorities()`] so far, including
    /// the `n_updates_done` of the configuration.
    ///
    /// Checkpoints do not contain this count. To resume the exponent schedule in a new
    /// buffer, pass it to [`PerConfig::n_updates_done()`].
    pub fn n_priority_updates(&self) -> usize {
        self.per_state.beta_schedule.n_updates()
    }

    /// Returns the number of stored transitions.
    pub fn size(&self) -> usize {
        self.current_id.min(self.capacity)
    }

    /// Returns `true` if no transition is stored.
    pub fn is_empty(&self) -> bool {
        self.current_id == 0
    }

    /// Returns the number of experiences waiting for their n-step return.
    pub fn n_pending(&self) -> usize {
        self.pending_returns.len()
    }

    /// Returns the number of transitions the buffer can store.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of steps of the returns.
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Returns the discount factor.
    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    /// Returns the number of transitions written since construction or the last clear.
    pub fn current_id(&self) -> usize {
        self.current_id
    }

    /// Returns the priorities of the stored transitions.
    pub fn priority_tree(&self) -> &PriorityTree {
        &self.priorities
    }

    /// Replaces the priority of the transition at `index`.
    pub fn set_priority(&mut self, index: LogicalIndex, priority: f32) -> Result<(), MemoryError> {
        self.priorities.set(index, priority)
    }

    /// Empties the buffer, keeping its configuration.
    pub fn clear(&mut self) {
        debug!("Clear data buffer with {} transitions", self.size());
        self.pending_actions.clear();
        self.pending_returns.clear();
        self.pending_dones.clear();
        self.actions.iter_mut().for_each(|a| *a = 0);
        self.returns.iter_mut().for_each(|r| *r = 0.0);
        self.dones.iter_mut().for_each(|d| *d = false);
        self.priorities.clear();
        self.current_id = 0;
        self.per_state.last_indices.clear();
        self.per_state.last_weights.clear();
    }
}

impl fmt::Display for DataBuffer {
    /// Prints a summary of the buffer. The alternate form (`{:#}`) also prints the
    /// pending queues, the first elements of the ring buffers and the priority tree.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DataBuffer[capacity: {}, n_steps: {}, gamma: {}, current_id: {}]",
            self.capacity, self.n_steps, self.gamma, self.current_id
        )?;

        if f.alternate() {
            let int = |v: &i32| v.to_string();
            let float = |v: &f32| format!("{:.3}", v);
            let boolean = |v: &bool| v.to_string();
            let n = self.n_steps;
            write!(
                f,
                "\n #-> past_actions = {}",
                fmt_truncated(&self.pending_actions.to_vec(), n, int)
            )?;
            write!(
                f,
                "\n #-> past_rewards = {}",
                fmt_truncated(&self.pending_returns.to_vec(), n, float)
            )?;
            write!(
                f,
                "\n #-> past_dones = {}",
                fmt_truncated(&self.pending_dones.to_vec(), n, boolean)
            )?;
            write!(f, "\n #-> actions = {}", fmt_truncated(&self.actions, 10, int))?;
            write!(f, "\n #-> rewards = {}", fmt_truncated(&self.returns, 10, float))?;
            write!(f, "\n #-> dones = {}", fmt_truncated(&self.dones, 10, boolean))?;
            write!(f, "\n #-> priority_tree = {:#}", self.priorities)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn buffer(capacity: usize, n_steps: usize, gamma: f32) -> DataBuffer {
        DataBuffer::new(capacity, n_steps, gamma, 1.0, 2).unwrap()
    }

    fn all(buffer: &DataBuffer) -> Transitions {
        let ixs = (0..buffer.size()).map(LogicalIndex).collect::<Vec<_>>();
        buffer.read(&ixs).unwrap()
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            DataBuffer::new(0, 1, 0.9, 1.0, 2),
            Err(MemoryError::InvalidCapacity(0))
        ));
        assert!(matches!(
            DataBuffer::new(4, 0, 0.9, 1.0, 2),
            Err(MemoryError::InvalidSteps(0))
        ));
        assert!(matches!(
            DataBuffer::new(4, 1, 0.9, 1.0, 1),
            Err(MemoryError::InvalidChildren(1))
        ));
    }

    #[test]
    fn test_n_step_returns() {
        let mut buffer = buffer(10, 3, 0.5);
        assert_eq!(buffer.append(Experience::new(0, 1.0, false)), 0);
        assert_eq!(buffer.append(Experience::new(1, 1.0, false)), 0);
        assert_eq!(buffer.append(Experience::new(2, 1.0, false)), 1);
        assert_eq!(buffer.append(Experience::new(3, 1.0, false)), 1);

        assert_eq!(buffer.size(), 2);
        assert_eq!(buffer.n_pending(), 2);
        let batch = all(&buffer);
        assert_eq!(batch.actions, vec![0, 1]);
        assert_eq!(batch.returns, vec![1.75, 1.75]);
        assert_eq!(batch.dones, vec![false, false]);
    }

    #[test]
    fn test_discounting_of_distinct_rewards() {
        let mut buffer = buffer(10, 2, 0.9);
        for (a, r) in [(0, 1.0f32), (1, 2.0), (2, 3.0)].iter() {
            buffer.append(Experience::new(*a, *r, false));
        }
        let batch = all(&buffer);
        assert_eq!(batch.actions, vec![0, 1]);
        assert!((batch.returns[0] - (1.0 + 0.9 * 2.0)).abs() < 1e-6);
        assert!((batch.returns[1] - (2.0 + 0.9 * 3.0)).abs() < 1e-6);
    }

    #[test]
    fn test_episode_boundary_flush() {
        let mut buffer = buffer(10, 3, 0.5);
        buffer.append(Experience::new(7, 1.0, false));
        assert_eq!(buffer.append(Experience::new(8, 1.0, true)), 2);

        assert_eq!(buffer.size(), 2);
        assert_eq!(buffer.n_pending(), 0);
        let batch = all(&buffer);
        assert_eq!(batch.actions, vec![7, 8]);
        assert_eq!(batch.returns, vec![1.5, 1.0]);
        assert_eq!(batch.dones, vec![true, true]);

        // The next episode starts from empty queues.
        buffer.append(Experience::new(9, 2.0, false));
        assert_eq!(buffer.n_pending(), 1);
        assert_eq!(buffer.size(), 2);
    }

    #[test]
    fn test_one_step_returns() {
        let mut buffer = buffer(4, 1, 0.99);
        assert_eq!(buffer.append(Experience::new(1, 0.5, false)), 1);
        assert_eq!(buffer.append(Experience::new(2, -1.0, true)), 1);
        let batch = all(&buffer);
        assert_eq!(batch.unpack(), (vec![1, 2], vec![0.5, -1.0], vec![false, true]));
    }

    #[test]
    fn test_wraparound() {
        let mut buffer = buffer(3, 1, 0.99);
        for a in 0..5 {
            buffer.append(Experience::new(a, a as f32, false));
        }
        assert_eq!(buffer.size(), 3);
        let batch = all(&buffer);
        assert_eq!(batch.actions, vec![2, 3, 4]);
        assert_eq!(batch.returns, vec![2.0, 3.0, 4.0]);
        assert!(matches!(
            buffer.read(&[LogicalIndex(3)]),
            Err(MemoryError::IndexOutOfRange { index: 3, size: 3 })
        ));
    }

    #[test]
    fn test_new_transitions_get_max_priority() {
        let mut buffer = buffer(8, 1, 0.99);
        buffer.append(Experience::new(0, 0.0, false));
        buffer.append(Experience::new(1, 0.0, false));
        assert_eq!(buffer.priority_tree().get(LogicalIndex(0)).unwrap(), 1.0);

        buffer.set_priority(LogicalIndex(1), 5.0).unwrap();
        buffer.append(Experience::new(2, 0.0, false));
        assert_eq!(buffer.priority_tree().get(LogicalIndex(2)).unwrap(), 5.0);
        assert_eq!(buffer.priority_tree().sum(), 11.0);
    }

    #[test]
    fn test_set_priority_follows_ring_slots() {
        let config = DataBufferConfig::default()
            .capacity(4)
            .n_steps(1)
            .n_children(2)
            .per_config(PerConfig::default().seed(3));
        let mut buffer = DataBuffer::build(&config).unwrap();
        for a in 0..6 {
            buffer.append(Experience::new(a, 0.0, false));
        }
        assert_eq!(buffer.current_id(), buffer.priority_tree().current_id());

        // Logical index 1 is the transition with action 3 after wraparound.
        for i in 0..4 {
            buffer.set_priority(LogicalIndex(i), 0.0).unwrap();
        }
        buffer.set_priority(LogicalIndex(1), 2.0).unwrap();
        assert_eq!(buffer.read(&[LogicalIndex(1)]).unwrap().actions, vec![3]);
        assert_eq!(buffer.priority_tree().get(LogicalIndex(1)).unwrap(), 2.0);

        let batch = buffer.sample(20).unwrap();
        assert!(batch.indices.iter().all(|ix| ix.0 == 1));
        assert!(batch.transitions.actions.iter().all(|&a| a == 3));

        assert!(matches!(
            buffer.set_priority(LogicalIndex(4), 1.0),
            Err(MemoryError::IndexOutOfRange { index: 4, size: 4 })
        ));
    }

    #[test]
    fn test_sample_and_report() {
        let config = DataBufferConfig::default()
            .capacity(16)
            .n_steps(1)
            .n_children(4)
            .per_config(
                PerConfig::default()
                    .omega(1.0)
                    .eps(0.0)
                    .beta_final(1.0)
                    .n_updates_final(2)
                    .seed(1),
            );
        let mut buffer = DataBuffer::build(&config).unwrap();
        assert!(matches!(buffer.sample(4), Err(MemoryError::EmptyBuffer)));

        for a in 0..10 {
            buffer.append(Experience::new(a, 1.0, false));
        }
        let batch = buffer.sample(4).unwrap();
        assert_eq!(batch.indices.len(), 4);
        assert_eq!(batch.transitions.len(), 4);
        // All priorities are equal, so are the weights.
        assert!(batch.weights.iter().all(|&w| (w - 1.0).abs() < 1e-6));
        assert_eq!(buffer.last_indices(), batch.indices.as_slice());
        for (ix, a) in batch.indices.iter().zip(batch.transitions.actions.iter()) {
            assert_eq!(ix.0 as i32, *a);
        }

        let beta_0 = buffer.beta();
        let weighted = buffer.report(&[2.0, -2.0, 2.0, 2.0]).unwrap();
        assert_eq!(weighted, vec![2.0, -2.0, 2.0, 2.0]);
        assert!(buffer.beta() > beta_0);
        assert_eq!(buffer.n_priority_updates(), 1);
        for ix in batch.indices.iter() {
            assert_eq!(buffer.priority_tree().get(*ix).unwrap(), 2.0);
        }

        assert!(matches!(
            buffer.report(&[1.0]),
            Err(MemoryError::LengthMismatch { expected: 4, actual: 1 })
        ));
    }

    #[test]
    fn test_update_priorities_biases_sampling() {
        let config = DataBufferConfig::default()
            .capacity(4)
            .n_steps(1)
            .n_children(2)
            .per_config(PerConfig::default().omega(1.0).eps(0.0).seed(5));
        let mut buffer = DataBuffer::build(&config).unwrap();
        for a in 0..4 {
            buffer.append(Experience::new(a, 0.0, false));
        }
        let ixs = (0..4).map(LogicalIndex).collect::<Vec<_>>();
        buffer
            .update_priorities(&ixs, &[0.0, 0.0, -3.0, 0.0])
            .unwrap();

        let batch = buffer.sample(50).unwrap();
        assert!(batch.transitions.actions.iter().all(|&a| a == 2));
    }

    #[test]
    fn test_clear() {
        let mut buffer = buffer(4, 3, 0.9);
        for a in 0..6 {
            buffer.append(Experience::new(a, 1.0, a == 4));
        }
        assert!(buffer.size() > 0);
        buffer.clear();
        assert_eq!(buffer.size(), 0);
        assert_eq!(buffer.n_pending(), 0);
        assert_eq!(buffer.current_id(), 0);
        assert_eq!(buffer.priority_tree().size(), 0);
        assert_eq!(buffer.capacity(), 4);
        assert_eq!(buffer.n_steps(), 3);

        buffer.append(Experience::new(1, 1.0, true));
        assert_eq!(all(&buffer).actions, vec![1]);
    }

    #[test]
    fn test_display() {
        let mut buffer = buffer(4, 2, 0.5);
        buffer.append(Experience::new(3, 1.0, false));
        assert_eq!(
            format!("{}", buffer),
            "DataBuffer[capacity: 4, n_steps: 2, gamma: 0.5, current_id: 0]"
        );
        let verbose = format!("{:#}", buffer);
        assert!(verbose.contains(" #-> past_actions = [3]"));
        assert!(verbose.contains(" #-> past_rewards = [1.000]"));
        assert!(verbose.contains(" #-> priority_tree = PriorityTree["));
    }
}
