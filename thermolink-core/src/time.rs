//! Time management for the control loop
//!
//! Every cadence in the node (measurement, publishing, reconnect probing) is
//! a poll against a monotonic millisecond counter, never a timer interrupt:
//! - [`TimeSource`] abstracts the counter
//! - [`Periodic`] gates a task on "has its period elapsed since it last ran"
//! - [`FixedTime`] is a hand-driven clock for tests and simulations

use fugit::MillisDurationU64;

/// Timestamp in milliseconds since device boot
pub type Timestamp = u64;

/// Source of time for the system
pub trait TimeSource {
    /// Get current timestamp in milliseconds
    fn now(&self) -> Timestamp;
}

/// Fixed time source for testing
#[derive(Debug, Clone)]
pub struct FixedTime {
    timestamp: Timestamp,
}

impl FixedTime {
    /// Clock stopped at `timestamp`
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }

    /// Jump to `timestamp`
    pub fn set(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }

    /// Move forward by `ms`
    pub fn advance(&mut self, ms: u64) {
        self.timestamp += ms;
    }
}

impl TimeSource for FixedTime {
    fn now(&self) -> Timestamp {
        self.timestamp
    }
}

/// Host monotonic clock (requires std)
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct HostClock {
    started: std::time::Instant,
}

#[cfg(feature = "std")]
impl HostClock {
    /// Clock starting at zero now
    pub fn new() -> Self {
        Self {
            started: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl TimeSource for HostClock {
    fn now(&self) -> Timestamp {
        self.started.elapsed().as_millis() as Timestamp
    }
}

/// Polled period gate
///
/// A task guarded by `Periodic` runs the first time it is polled and then
/// whenever at least one period has passed since its last run. The last-run
/// mark moves to `now`, not to `last + period`, so a late loop never tries to
/// catch up with a burst of back-to-back runs.
#[derive(Debug, Clone, Copy)]
pub struct Periodic {
    period: MillisDurationU64,
    last_run: Option<Timestamp>,
}

impl Periodic {
    /// Gate that is due on its first poll
    pub const fn new(period: MillisDurationU64) -> Self {
        Self {
            period,
            last_run: None,
        }
    }

    /// Returns `true` and marks the task as run if its period has elapsed
    pub fn due(&mut self, now: Timestamp) -> bool {
        let ready = match self.last_run {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.period.to_millis(),
        };

        if ready {
            self.last_run = Some(now);
        }
        ready
    }

    /// Milliseconds until the task is next due
    pub fn remaining(&self, now: Timestamp) -> u64 {
        match self.last_run {
            None => 0,
            Some(last) => self
                .period
                .to_millis()
                .saturating_sub(now.saturating_sub(last)),
        }
    }

    /// Configured period
    pub fn period(&self) -> MillisDurationU64 {
        self.period
    }

    /// When the task last ran
    pub fn last_run(&self) -> Option<Timestamp> {
        self.last_run
    }
}
