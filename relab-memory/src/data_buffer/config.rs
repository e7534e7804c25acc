//! Configuration for the data buffer.
//!
//! This module provides configuration structures for [`DataBuffer`](super::DataBuffer):
//! - Multistep returns and capacity of the buffer
//! - Shape of the priority trees
//! - Prioritized sampling and importance sampling weights
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of prioritized sampling.
///
/// # Examples
///
/// ```rust
/// use relab_memory::PerConfig;
///
/// let config = PerConfig::default()
///     .omega(0.7)
///     .beta_0(0.4)
///     .beta_final(1.0)
///     .n_updates_final(500_000);
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PerConfig {
    /// Prioritization exponent. The priority of a transition is `(|td_error| + eps)^omega`,
    /// a value of 0 resulting in uniform sampling.
    pub omega: f32,

    /// Importance sampling exponent before any priority update.
    pub beta_0: f32,

    /// Importance sampling exponent after `n_updates_final` priority updates.
    /// Equal to `beta_0` for a constant exponent.
    pub beta_final: f32,

    /// Number of priority updates over which the exponent moves from `beta_0` to `beta_final`.
    pub n_updates_final: usize,

    /// Number of priority updates already done, e.g., by the run a checkpoint comes from.
    #[serde(default)]
    pub n_updates_done: usize,

    /// Small constant keeping priorities positive.
    pub eps: f32,

    /// Seed of the random number generator used for sampling.
    pub seed: u64,
}

impl Default for PerConfig {
    /// Creates a default configuration:
    /// - `omega = 0.7`
    /// - `beta_0 = 0.5`
    /// - `beta_final = 0.5`
    /// - `n_updates_final = 0`
    /// - `n_updates_done = 0`
    /// - `eps = 1e-6`
    /// - `seed = 42`
    fn default() -> Self {
        Self {
            omega: 0.7,
            beta_0: 0.5,
            beta_final: 0.5,
            n_updates_final: 0,
            n_updates_done: 0,
            eps: 1e-6,
            seed: 42,
        }
    }
}

impl PerConfig {
    /// Sets the prioritization exponent.
    pub fn omega(mut self, omega: f32) -> Self {
        self.omega = omega;
        self
    }

    /// Sets the initial importance sampling exponent.
    pub fn beta_0(mut self, beta_0: f32) -> Self {
        self.beta_0 = beta_0;
        self
    }

    /// Sets a constant importance sampling exponent.
    pub fn beta(mut self, beta: f32) -> Self {
        self.beta_0 = beta;
        self.beta_final = beta;
        self
    }

    /// Sets the final importance sampling exponent.
    pub fn beta_final(mut self, beta_final: f32) -> Self {
        self.beta_final = beta_final;
        self
    }

    /// Sets the number of priority updates to reach the final exponent.
    pub fn n_updates_final(mut self, n_updates_final: usize) -> Self {
        self.n_updates_final = n_updates_final;
        self
    }

    /// Sets the number of priority updates already done, to resume the exponent schedule.
    pub fn n_updates_done(mut self, n_updates_done: usize) -> Self {
        self.n_updates_done = n_updates_done;
        self
    }

    /// Sets the constant added to the absolute TD errors.
    pub fn eps(mut self, eps: f32) -> Self {
        self.eps = eps;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Configuration of [`DataBuffer`](super::DataBuffer).
///
/// # Examples
///
/// ```rust
/// use relab_memory::{DataBufferConfig, PerConfig};
///
/// let config = DataBufferConfig::default()
///     .capacity(100_000)
///     .n_steps(3)
///     .gamma(0.99)
///     .per_config(PerConfig::default().seed(0));
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DataBufferConfig {
    /// The number of transitions the buffer can store.
    pub capacity: usize,

    /// The number of steps over which rewards are accumulated.
    pub n_steps: usize,

    /// The discount factor.
    pub gamma: f32,

    /// The priority given to the first transitions.
    pub initial_priority: f32,

    /// The number of children of each node of the priority trees.
    pub n_children: usize,

    /// Configuration of prioritized sampling.
    #[serde(default)]
    pub per_config: PerConfig,
}

impl Default for DataBufferConfig {
    /// Creates a default configuration:
    /// - `capacity = 10000`
    /// - `n_steps = 1`
    /// - `gamma = 0.99`
    /// - `initial_priority = 1.0`
    /// - `n_children = 10`
    fn default() -> Self {
        Self {
            capacity: 10000,
            n_steps: 1,
            gamma: 0.99,
            initial_priority: 1.0,
            n_children: 10,
            per_config: PerConfig::default(),
        }
    }
}

impl DataBufferConfig {
    /// Sets the capacity of the buffer.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the number of steps of the returns.
    pub fn n_steps(mut self, n_steps: usize) -> Self {
        self.n_steps = n_steps;
        self
    }

    /// Sets the discount factor.
    pub fn gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    /// Sets the priority given to the first transitions.
    pub fn initial_priority(mut self, initial_priority: f32) -> Self {
        self.initial_priority = initial_priority;
        self
    }

    /// Sets the number of children of each node of the priority trees.
    pub fn n_children(mut self, n_children: usize) -> Self {
        self.n_children = n_children;
        self
    }

    /// Sets the configuration of prioritized sampling.
    pub fn per_config(mut self, per_config: PerConfig) -> Self {
        self.per_config = per_config;
        self
    }

    /// Loads the configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
