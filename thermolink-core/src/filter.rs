//! First-order exponential smoothing
//!
//! ```text
//! estimate_t = estimate_{t-1} + factor · (raw_t - estimate_{t-1})
//! ```
//!
//! A small factor follows slowly and rejects noise; a factor of 1.0 passes
//! the input straight through. Temperature and signal strength each get their
//! own instance with their own factor.

use crate::errors::ConfigError;

/// Stateful low-pass filter over one quantity
#[derive(Debug, Clone, Copy)]
pub struct ExponentialSmoother {
    factor: f32,
    estimate: Option<f32>,
}

impl ExponentialSmoother {
    /// Create a smoother; `factor` must lie in (0, 1]
    pub fn new(factor: f32) -> Result<Self, ConfigError> {
        if !(factor > 0.0 && factor <= 1.0) {
            return Err(ConfigError::InvalidFactor { factor });
        }

        Ok(Self {
            factor,
            estimate: None,
        })
    }

    /// Fold one raw value into the estimate and return the new estimate
    ///
    /// The first value seeds the estimate. A non-finite value is ignored and
    /// the current estimate (NaN if unseeded) is returned.
    pub fn update(&mut self, raw: f32) -> f32 {
        if !raw.is_finite() {
            return self.estimate();
        }

        let next = match self.estimate {
            None => raw,
            Some(prev) => prev + self.factor * (raw - prev),
        };
        self.estimate = Some(next);
        next
    }

    /// Current estimate, NaN before the first update
    pub fn estimate(&self) -> f32 {
        self.estimate.unwrap_or(f32::NAN)
    }

    /// Smoothing factor
    pub fn factor(&self) -> f32 {
        self.factor
    }

    /// `true` once the first value has been taken
    pub fn is_seeded(&self) -> bool {
        self.estimate.is_some()
    }
}
