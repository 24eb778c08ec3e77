//! Core types and hardware seams
//!
//! These are the collaborators the control loop drives but does not
//! implement. Keep them simple - a board support crate should be able to
//! implement each one in a handful of lines.

use crate::time::Timestamp;

/// One smoothed measurement
///
/// Produced once per measurement period and superseded by the next one of
/// the same quantity. A NaN value is the "no data yet" sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    /// Value, NaN when there is none
    pub value: f32,
    /// Monotonic time it was taken
    pub timestamp: Timestamp,
}

impl Reading {
    /// Sentinel reading before the first measurement
    pub const UNSET: Self = Self {
        value: f32::NAN,
        timestamp: 0,
    };

    /// Reading of `value` at `timestamp`
    pub fn new(value: f32, timestamp: Timestamp) -> Self {
        Self { value, timestamp }
    }

    /// `false` for the no-data sentinel
    pub fn is_set(&self) -> bool {
        !self.value.is_nan()
    }
}

impl Default for Reading {
    fn default() -> Self {
        Self::UNSET
    }
}

/// Hardware watchdog
///
/// The loop must feed it every iteration or the device reboots. That reboot
/// is the designed recovery for any hang the firmware did not anticipate.
pub trait Watchdog {
    /// Restart the watchdog countdown
    fn feed(&mut self);
}

/// Network link the outbound channels share
pub trait Connectivity {
    /// Link is up
    fn is_connected(&self) -> bool;

    /// Try to bring the link back; `true` when it came up
    fn reconnect(&mut self) -> bool;

    /// Drop the link on operator request
    fn disconnect(&mut self);
}

/// Watchdog for hosted builds and tests, counting feeds
#[derive(Debug, Clone, Default)]
pub struct CountingWatchdog {
    /// Feeds so far
    pub feeds: u32,
}

impl Watchdog for CountingWatchdog {
    fn feed(&mut self) {
        self.feeds = self.feeds.wrapping_add(1);
    }
}
