//! Exponent of the importance sampling weights.
use super::PerConfig;

/// Exponent of the importance sampling weights, driven by the number of priority updates.
///
/// The exponent is `beta_0` before any update and moves linearly to `beta_final` over
/// `n_updates_final` updates. With `beta_0 == beta_final`, which is the default of
/// [`PerConfig`], it is constant.
#[derive(Clone, Debug, PartialEq)]
pub struct BetaSchedule {
    beta_0: f32,
    beta_final: f32,
    n_updates_final: usize,
    n_updates: usize,
}

impl BetaSchedule {
    /// Creates the schedule of a buffer, starting after `n_updates_done` updates.
    pub fn from_config(config: &PerConfig) -> Self {
        Self {
            beta_0: config.beta_0,
            beta_final: config.beta_final,
            n_updates_final: config.n_updates_final,
            n_updates: config.n_updates_done,
        }
    }

    /// Creates a schedule with a constant exponent.
    pub fn constant(beta: f32) -> Self {
        Self {
            beta_0: beta,
            beta_final: beta,
            n_updates_final: 0,
            n_updates: 0,
        }
    }

    /// Returns the current exponent.
    pub fn beta(&self) -> f32 {
        if self.n_updates >= self.n_updates_final {
            return self.beta_final;
        }
        let progress = self.n_updates as f32 / self.n_updates_final as f32;
        self.beta_0 + (self.beta_final - self.beta_0) * progress
    }

    /// Returns the number of priority updates seen so far.
    pub fn n_updates(&self) -> usize {
        self.n_updates
    }

    /// Records one priority update.
    pub(crate) fn step(&mut self) {
        self.n_updates = self.n_updates.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_constant() {
        let mut schedule = BetaSchedule::from_config(&PerConfig::default());
        assert_eq!(schedule.beta(), 0.5);
        for _ in 0..10 {
            schedule.step();
        }
        assert_eq!(schedule.beta(), 0.5);
        assert_eq!(schedule.n_updates(), 10);
        assert_eq!(BetaSchedule::constant(0.3).beta(), 0.3);
    }

    #[test]
    fn test_annealing() {
        let config = PerConfig::default().beta_0(0.5).beta_final(1.0).n_updates_final(4);
        let mut schedule = BetaSchedule::from_config(&config);
        schedule.step();
        schedule.step();
        assert!((schedule.beta() - 0.75).abs() < 1e-6);
        for _ in 0..10 {
            schedule.step();
        }
        assert_eq!(schedule.beta(), 1.0);
    }

    #[test]
    fn test_resume() {
        let config = PerConfig::default()
            .beta_0(0.4)
            .beta_final(1.0)
            .n_updates_final(6)
            .n_updates_done(3);
        let schedule = BetaSchedule::from_config(&config);
        assert_eq!(schedule.n_updates(), 3);
        assert!((schedule.beta() - 0.7).abs() < 1e-6);
    }
}
