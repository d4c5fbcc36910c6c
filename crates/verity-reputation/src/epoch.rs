//! Epoch phase controller.
//!
//! Decides per epoch how much of the reward distribution comes from the
//! fixed bootstrap allocation and how much from merit.
//!
//! ```text
//! epoch:  0 ........ 10 ................... 50 ........
//!         │ BOOTSTRAP │        HYBRID        │  MERIT
//! fixed:  │    1.0    │ 0.3 ──linear──▶ 0.1  │   0.0
//! ```
//!
//! Everything here is a pure function of the epoch, the schedule and the
//! two input vectors. Calling it twice with the same inputs yields
//! bit-identical output.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ReputationError, Result};
use crate::weights::WeightVector;

/// Epoch boundaries and the fixed-fraction decay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseSchedule {
    /// First epoch of the hybrid phase.
    pub bootstrap_until: u64,
    /// First epoch of the merit phase.
    pub merit_from: u64,
    /// Fixed fraction at the start of the hybrid phase.
    pub initial_fixed_fraction: f64,
    /// Fixed fraction floor, reached at `merit_from`.
    pub final_fixed_fraction: f64,
}

impl Default for PhaseSchedule {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseSchedule {
    /// Creates the default schedule.
    ///
    /// Defaults:
    /// - Bootstrap: epochs 0 to 9
    /// - Hybrid: epochs 10 to 49, fixed fraction 0.3 decaying to 0.1
    /// - Merit: epoch 50 onwards
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bootstrap_until: 10,
            merit_from: 50,
            initial_fixed_fraction: 0.3,
            final_fixed_fraction: 0.1,
        }
    }

    /// Sets the first hybrid epoch.
    #[must_use]
    pub const fn with_bootstrap_until(mut self, epoch: u64) -> Self {
        self.bootstrap_until = epoch;
        self
    }

    /// Sets the first merit epoch.
    #[must_use]
    pub const fn with_merit_from(mut self, epoch: u64) -> Self {
        self.merit_from = epoch;
        self
    }

    /// Sets the fixed-fraction decay range.
    #[must_use]
    pub const fn with_fixed_fractions(mut self, initial: f64, last: f64) -> Self {
        self.initial_fixed_fraction = initial;
        self.final_fixed_fraction = last;
        self
    }

    /// Checks thresholds and fractions.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::InvalidSchedule`] when
    /// `0 < bootstrap_until <= merit_from` does not hold or the fractions
    /// are outside `[0, 1]` or increase over time.
    pub fn validate(&self) -> Result<()> {
        if self.bootstrap_until == 0 {
            return Err(ReputationError::InvalidSchedule(
                "bootstrap_until must be at least 1".to_string(),
            ));
        }
        if self.bootstrap_until > self.merit_from {
            return Err(ReputationError::InvalidSchedule(format!(
                "bootstrap_until {} is after merit_from {}",
                self.bootstrap_until, self.merit_from
            )));
        }
        for (name, value) in [
            ("initial_fixed_fraction", self.initial_fixed_fraction),
            ("final_fixed_fraction", self.final_fixed_fraction),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ReputationError::InvalidSchedule(format!(
                    "{} {} is outside [0, 1]",
                    name, value
                )));
            }
        }
        if self.initial_fixed_fraction < self.final_fixed_fraction {
            return Err(ReputationError::InvalidSchedule(format!(
                "fixed fraction rises from {} to {}",
                self.initial_fixed_fraction, self.final_fixed_fraction
            )));
        }
        Ok(())
    }

    /// Derives the phase for an epoch.
    pub fn phase(&self, epoch: u64) -> Phase {
        if epoch < self.bootstrap_until {
            Phase::Bootstrap
        } else if epoch >= self.merit_from {
            Phase::Merit
        } else {
            Phase::Hybrid {
                fixed_fraction: self.fixed_fraction(epoch),
            }
        }
    }

    /// Linear decay from the initial to the final fraction across the
    /// hybrid phase, floored at the final fraction.
    fn fixed_fraction(&self, epoch: u64) -> f64 {
        let span = self.merit_from.saturating_sub(self.bootstrap_until);
        if span == 0 {
            return self.final_fixed_fraction;
        }
        let elapsed = epoch.saturating_sub(self.bootstrap_until) as f64;
        let step = (self.initial_fixed_fraction - self.final_fixed_fraction) / span as f64;
        (self.initial_fixed_fraction - elapsed * step).max(self.final_fixed_fraction)
    }

    /// Computes the final weight vector for an epoch.
    ///
    /// - Bootstrap: the bootstrap allocation, returned unchanged when it
    ///   already sums to 1 and normalized otherwise
    /// - Hybrid: [`blend`] of the two vectors
    /// - Merit: the normalized merit vector
    ///
    /// A phase whose preferred input is empty falls back to the other
    /// input. The result is empty only if both are.
    pub fn weights(&self, epoch: u64, bootstrap: &WeightVector, merit: &WeightVector) -> WeightVector {
        let phase = self.phase(epoch);
        let bootstrap = as_distribution(bootstrap);
        let merit = merit.normalized();

        let weights = match phase {
            Phase::Bootstrap => {
                if bootstrap.is_empty() {
                    merit
                } else {
                    bootstrap
                }
            }
            Phase::Hybrid { fixed_fraction } => {
                if merit.is_empty() {
                    bootstrap
                } else if bootstrap.is_empty() {
                    merit
                } else {
                    blend(fixed_fraction, &bootstrap, &merit)
                }
            }
            Phase::Merit => {
                if merit.is_empty() {
                    bootstrap
                } else {
                    merit
                }
            }
        };

        debug!(epoch, %phase, workers = weights.len(), "weight vector computed");
        weights
    }
}

/// Returns the allocation as-is if it is already a distribution.
fn as_distribution(allocation: &WeightVector) -> WeightVector {
    let exact = !allocation.is_empty()
        && allocation.is_normalized()
        && allocation.iter().all(|(_, w)| w.is_finite() && w > 0.0);
    if exact {
        allocation.clone()
    } else {
        allocation.normalized()
    }
}

/// Blends two vectors and renormalizes.
///
/// `fixed · bootstrap + (1 − fixed) · merit`, over the union of workers,
/// with both inputs normalized first.
pub fn blend(fixed_fraction: f64, bootstrap: &WeightVector, merit: &WeightVector) -> WeightVector {
    let bootstrap = bootstrap.normalized();
    let merit = merit.normalized();

    let mut mixed = WeightVector::new();
    for (worker, weight) in bootstrap.iter() {
        mixed.insert(worker, fixed_fraction * weight);
    }
    for (worker, weight) in merit.iter() {
        let base = mixed.get(worker).unwrap_or(0.0);
        mixed.insert(worker, base + (1.0 - fixed_fraction) * weight);
    }
    mixed.normalized()
}

/// Reward-policy phase for one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum Phase {
    /// Fixed allocation only.
    Bootstrap,
    /// Blend of fixed allocation and merit.
    Hybrid {
        /// Share taken from the bootstrap allocation.
        fixed_fraction: f64,
    },
    /// Merit only.
    Merit,
}

impl Phase {
    /// Share of the weight coming from the bootstrap allocation.
    pub fn fixed_fraction(&self) -> f64 {
        match self {
            Phase::Bootstrap => 1.0,
            Phase::Hybrid { fixed_fraction } => *fixed_fraction,
            Phase::Merit => 0.0,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Bootstrap => write!(f, "bootstrap"),
            Phase::Hybrid { fixed_fraction } => write!(f, "hybrid ({:.3} fixed)", fixed_fraction),
            Phase::Merit => write!(f, "merit"),
        }
    }
}
