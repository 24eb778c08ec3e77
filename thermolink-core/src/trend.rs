//! Windowed rate of change
//!
//! The estimator keeps a baseline and the time it was taken. Once a full
//! window has passed it reports how far the value moved, scaled to units per
//! minute, and starts a new window from the current value.

use crate::time::Timestamp;

const MS_PER_MINUTE: f32 = 60_000.0;

/// Direction of the latest reported rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Rate above the deadband
    Rising,
    /// Rate below the negative deadband
    Falling,
    /// Rate inside the deadband, or none
    Steady,
}

impl Direction {
    /// Classify a rate, treating `|rate| < deadband` as steady
    pub fn of(rate: f32, deadband: f32) -> Self {
        if !rate.is_finite() || libm::fabsf(rate) < deadband {
            Direction::Steady
        } else if rate > 0.0 {
            Direction::Rising
        } else {
            Direction::Falling
        }
    }

    /// Lowercase name for messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Rising => "rising",
            Direction::Falling => "falling",
            Direction::Steady => "steady",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start: Timestamp,
    baseline: f32,
}

/// Fixed-window trend estimator
#[derive(Debug, Clone, Copy)]
pub struct TrendEstimator {
    window_ms: u64,
    window: Option<Window>,
    rate: Option<f32>,
}

impl TrendEstimator {
    /// Estimator over `window_ms`
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            window: None,
            rate: None,
        }
    }

    /// Feed the latest value; returns a rate when a window closes
    ///
    /// NaN means no reading has been produced yet; it is refused without
    /// touching the window.
    pub fn tick(&mut self, value: f32, now: Timestamp) -> Option<f32> {
        if value.is_nan() {
            return None;
        }

        let window = match self.window {
            None => {
                self.window = Some(Window {
                    start: now,
                    baseline: value,
                });
                return None;
            }
            Some(window) => window,
        };

        let elapsed = now.saturating_sub(window.start);
        if elapsed < self.window_ms || elapsed == 0 {
            return None;
        }

        let rate = MS_PER_MINUTE * (value - window.baseline) / elapsed as f32;
        self.window = Some(Window {
            start: now,
            baseline: value,
        });
        self.rate = Some(rate);
        Some(rate)
    }

    /// Most recently reported rate
    pub fn rate(&self) -> Option<f32> {
        self.rate
    }

    /// Span a rate is computed over
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }
}
