//! Error Types for the Measurement and Publish Path
//!
//! ## Design Philosophy
//!
//! Errors are returned from hot paths that run inside a watchdog-guarded loop,
//! so they follow the same rules as the rest of the crate:
//!
//! 1. **Small Size**: every variant fits in a few words and is `Copy`.
//! 2. **No Heap Allocation**: reasons are `&'static str`, never `String`.
//! 3. **Never Fatal**: nothing here aborts the control loop. Callers log the
//!    error and carry on; the next cycle is the retry.
//!
//! ## Error Categories
//!
//! ### Acquisition
//! - [`SensorError`]: the hardware source failed or produced a non-finite sample.
//!   The node turns this into a NaN sentinel reading ("no data yet").
//!
//! ### Delivery
//! - [`ChannelError`]: a destination refused or could not take a message. The
//!   publish scheduler stalls on it and retries the same message next cycle.
//!
//! ### Persistence
//! - [`StorageError`]: the retained record could not be loaded or saved.
//!
//! ### Setup and Commands
//! - [`ConfigError`]: the node configuration is inconsistent.
//! - [`CommandError`]: an inbound command could not be understood.
//!
//! ## Handling Strategy
//!
//! ```rust
//! use thermolink_core::ChannelError;
//!
//! fn describe(result: Result<(), ChannelError>) -> &'static str {
//!     match result {
//!         Ok(()) => "sent",
//!         Err(ChannelError::NotConnected) => "offline, retry next cycle",
//!         Err(ChannelError::RateLimited) => "destination throttled us",
//!         Err(_) => "rejected",
//!     }
//! }
//! # assert_eq!(describe(Ok(())), "sent");
//! ```

use thiserror_no_std::Error;

/// Hardware sample source failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Bus transaction failed
    #[error("Sensor bus error: {reason}")]
    Bus {
        /// What the bus driver reported
        reason: &'static str,
    },

    /// Sample was NaN or infinite
    #[error("Sensor produced a non-finite sample")]
    InvalidSample,
}

/// Outbound channel failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// Transport has no session with the destination
    #[error("Not connected")]
    NotConnected,

    /// Destination rate policy refused the message
    #[error("Rate limited by destination")]
    RateLimited,

    /// Destination accepted the request but rejected its content
    #[error("Rejected: {reason}")]
    Rejected {
        /// Destination-supplied or adapter-supplied reason
        reason: &'static str,
    },

    /// Payload does not fit the destination's limit
    #[error("Payload of {len} bytes exceeds limit of {max}")]
    PayloadTooLarge {
        /// Payload length in bytes
        len: usize,
        /// Maximum accepted length
        max: usize,
    },

    /// Any other transport failure
    #[error("Transport error: {reason}")]
    Transport {
        /// Short description from the adapter
        reason: &'static str,
    },
}

/// Retained record storage failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Backing medium cannot be reached
    #[error("Storage unavailable")]
    Unavailable,

    /// Stored bytes do not decode to a record
    #[error("Stored record is corrupt")]
    Corrupt,

    /// Read or write failed
    #[error("Storage I/O error: {reason}")]
    Io {
        /// Short description from the backend
        reason: &'static str,
    },
}

/// Configuration validation failures
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// Ladder thresholds must be strictly increasing
    #[error("Ladder threshold {index} is not greater than its predecessor")]
    LadderNotIncreasing {
        /// Index of the offending threshold
        index: usize,
    },

    /// A ladder needs exactly one more label than thresholds
    #[error("Ladder has {thresholds} thresholds but {labels} labels")]
    LadderLabelCount {
        /// Number of thresholds
        thresholds: usize,
        /// Number of labels
        labels: usize,
    },

    /// Ladder threshold is NaN or infinite
    #[error("Ladder threshold {index} is not finite")]
    LadderNotFinite {
        /// Index of the offending threshold
        index: usize,
    },

    /// Smoothing factor outside (0, 1]
    #[error("Smoothing factor {factor} outside (0, 1]")]
    InvalidFactor {
        /// Offending factor
        factor: f32,
    },

    /// Burst trimming would discard every sample
    #[error("Trimming {trim} from each end of {capacity} samples leaves nothing")]
    InvalidTrim {
        /// Samples dropped from each end
        trim: usize,
        /// Burst capacity
        capacity: usize,
    },

    /// A publishing channel was given a zero quota
    #[error("Channel {channel} has a zero quota")]
    ZeroQuota {
        /// Channel name
        channel: &'static str,
    },

    /// A periodic task was given a zero period
    #[error("Period for {task} is zero")]
    ZeroPeriod {
        /// Task name
        task: &'static str,
    },
}

/// Inbound command parsing failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Topic does not name a known command
    #[error("Unknown command topic")]
    UnknownTopic,

    /// Payload is not valid for the command
    #[error("Invalid payload for {command}")]
    InvalidPayload {
        /// Command name
        command: &'static str,
    },
}

#[cfg(feature = "defmt")]
impl defmt::Format for SensorError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Bus { reason } => defmt::write!(fmt, "Sensor bus: {}", reason),
            Self::InvalidSample => defmt::write!(fmt, "Non-finite sample"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ChannelError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::NotConnected => defmt::write!(fmt, "Not connected"),
            Self::RateLimited => defmt::write!(fmt, "Rate limited"),
            Self::Rejected { reason } => defmt::write!(fmt, "Rejected: {}", reason),
            Self::PayloadTooLarge { len, max } => {
                defmt::write!(fmt, "Payload {} > {}", len, max)
            }
            Self::Transport { reason } => defmt::write!(fmt, "Transport: {}", reason),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for StorageError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Unavailable => defmt::write!(fmt, "Storage unavailable"),
            Self::Corrupt => defmt::write!(fmt, "Record corrupt"),
            Self::Io { reason } => defmt::write!(fmt, "Storage I/O: {}", reason),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CommandError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::UnknownTopic => defmt::write!(fmt, "Unknown topic"),
            Self::InvalidPayload { command } => defmt::write!(fmt, "Bad payload for {}", command),
        }
    }
}
