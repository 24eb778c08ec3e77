//! Measurement pipeline and publish scheduler for thermolink nodes
//!
//! Samples a temperature sensor and the radio signal strength, smooths and
//! classifies both, tracks a trend and retained extrema, and republishes
//! the results to several rate-limited destinations from one cooperative
//! loop guarded by a hardware watchdog.
//!
//! Key constraints:
//! - Runs without an allocator (`no_std` with `default-features = false`)
//! - No blocking: every task is a period polled against a millisecond clock
//! - Per-destination message quotas are never exceeded
//!
//! ```no_run
//! use thermolink_core::{Node, NodeConfig, RetainedStore};
//!
//! let mut store = RetainedStore::new();
//! let mut node = Node::new(NodeConfig::default()).unwrap();
//! node.boot(&mut store, 0);
//!
//! // loop { node.run_once(clock.now(), &mut peripherals); }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

#[macro_use]
mod macros;

pub mod acquire;
pub mod buffer;
pub mod channel;
pub mod classify;
pub mod command;
pub mod config;
pub mod display;
pub mod errors;
pub mod filter;
pub mod message;
pub mod node;
pub mod scheduler;
pub mod stats;
pub mod tables;
pub mod time;
pub mod traits;
pub mod trend;

// Public API
pub use acquire::{Calibration, SampleAcquirer, SampleSource};
pub use channel::{BrokerChannel, Channel, ControlChannel, FieldWriter};
pub use classify::StatusLadder;
pub use config::NodeConfig;
pub use errors::{ChannelError, CommandError, ConfigError, SensorError, StorageError};
pub use filter::ExponentialSmoother;
pub use message::{Message, MessageTable, Phase};
pub use node::{CycleReport, Node, Peripherals};
pub use scheduler::{Invocation, PublishScheduler, StopReason};
pub use stats::{PersistentRecord, PersistentStats, RecordStore, RetainedStore};
pub use time::{Periodic, TimeSource, Timestamp};
pub use traits::{Connectivity, Reading, Watchdog};
pub use trend::{Direction, TrendEstimator};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
