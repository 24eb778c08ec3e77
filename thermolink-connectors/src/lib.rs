//! Hosted Transports for Thermolink Nodes
//!
//! ## Overview
//!
//! `thermolink-core` defines the seams a node publishes through
//! ([`Channel`](thermolink_core::Channel),
//! [`FieldWriter`](thermolink_core::FieldWriter),
//! [`ControlChannel`](thermolink_core::ControlChannel),
//! [`BrokerChannel`](thermolink_core::BrokerChannel) and
//! [`RecordStore`](thermolink_core::RecordStore)). This crate implements them
//! for hosted builds: gateways, simulators and bench rigs running on a full OS.
//!
//! ## Transport Selection Guide
//!
//! | Destination | Type                         | Feature | Transport            |
//! |-------------|------------------------------|---------|----------------------|
//! | Debug       | [`console::ConsoleChannel`]  | -       | any `io::Write`      |
//! | Graph       | [`graph::GraphWriter`]       | `http`  | HTTP GET via `ureq`  |
//! | Control     | [`control::LoopbackControl`] | -       | in-process queue     |
//! | Broker      | [`mqtt::MqttBroker`]         | `mqtt`  | MQTT via `rumqttc`   |
//! | Persistence | [`store::JsonFileStore`]     | -       | JSON file            |
//!
//! ### Console
//!
//! Writes `key: payload` lines. It enforces the same kind of rate policy a
//! cloud console does (N messages per window) so a node can be tuned against
//! it before it meets the real thing.
//!
//! ### Graph
//!
//! One GET per write carrying every staged field, in the style of the common
//! IoT graphing services. A body of `0` means the service dropped the update
//! (usually because it arrived too soon after the previous one).
//!
//! ### MQTT
//!
//! Publishes with QoS 0 through the request queue and never blocks; inbound
//! command messages are handed out by `poll_inbound`, which also drives the
//! connection's event loop.
//!
//! ## Error Mapping
//!
//! Transports fail with [`ConnectorError`], which carries owned detail for
//! logs. At the trait seam it collapses into the core's `Copy` error types,
//! since that is all the publish scheduler needs to decide on a retry.
//!
//! ## Example Usage
//!
//! ```rust
//! use thermolink_connectors::console::{ConsoleChannel, RatePolicy};
//! use thermolink_core::{Channel, time::FixedTime};
//!
//! let mut console = ConsoleChannel::new(Vec::new(), RatePolicy::new(4, 1_000), FixedTime::new(0));
//! console.send("temperature", "21.5 C").unwrap();
//! assert_eq!(console.into_inner(), b"temperature: 21.5 C\n");
//! ```

pub mod console;
pub mod control;
pub mod store;

#[cfg(feature = "http")]
pub mod graph;

#[cfg(feature = "mqtt")]
pub mod mqtt;

// Re-export common types
pub use console::{ConsoleChannel, RatePolicy};
pub use control::LoopbackControl;
pub use store::JsonFileStore;

#[cfg(feature = "http")]
pub use graph::{GraphConfig, GraphWriter};

#[cfg(feature = "mqtt")]
pub use mqtt::{MqttBroker, MqttConfig};

use thermolink_core::{ChannelError, StorageError};
use thiserror::Error;

/// Common connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Not connected")]
    NotConnected,

    #[error("Rate limited")]
    RateLimited,

    #[error("Timeout")]
    Timeout,

    #[error("Rejected by destination: {0}")]
    Rejected(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<&ConnectorError> for ChannelError {
    fn from(error: &ConnectorError) -> Self {
        match error {
            ConnectorError::NotConnected => ChannelError::NotConnected,
            ConnectorError::RateLimited => ChannelError::RateLimited,
            ConnectorError::Timeout => ChannelError::Transport { reason: "timeout" },
            ConnectorError::Rejected(_) => ChannelError::Rejected {
                reason: "refused by destination",
            },
            ConnectorError::ProtocolError(_) => ChannelError::Transport { reason: "protocol" },
            ConnectorError::ConfigError(_) => ChannelError::Rejected {
                reason: "misconfigured",
            },
            ConnectorError::Io(_) => ChannelError::Transport { reason: "i/o" },
            ConnectorError::Serialization(_) => ChannelError::Rejected {
                reason: "unencodable",
            },
        }
    }
}

impl From<&ConnectorError> for StorageError {
    fn from(error: &ConnectorError) -> Self {
        match error {
            ConnectorError::Serialization(_) => StorageError::Corrupt,
            ConnectorError::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                StorageError::Unavailable
            }
            ConnectorError::Io(_) => StorageError::Io { reason: "file" },
            _ => StorageError::Unavailable,
        }
    }
}

/// Connection statistics common to all connectors
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    /// Total messages sent successfully
    pub messages_sent: u64,
    /// Total messages failed to send
    pub messages_failed: u64,
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Number of reconnections
    pub reconnections: u32,
    /// Last error message
    pub last_error: Option<String>,
}

impl ConnectionStats {
    pub fn record_sent(&mut self, bytes: usize) {
        self.messages_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    /// Count a failure and convert it for the trait seam
    pub fn record_failure(&mut self, error: ConnectorError) -> ChannelError {
        log::warn!("Send failed: {}", error);
        self.messages_failed += 1;
        let mapped = ChannelError::from(&error);
        self.last_error = Some(error.to_string());
        mapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_core_types() {
        assert_eq!(
            ChannelError::from(&ConnectorError::RateLimited),
            ChannelError::RateLimited
        );
        assert_eq!(
            ChannelError::from(&ConnectorError::Timeout),
            ChannelError::Transport { reason: "timeout" }
        );

        let bad_json = serde_json::from_str::<u32>("{").unwrap_err();
        assert_eq!(
            StorageError::from(&ConnectorError::from(bad_json)),
            StorageError::Corrupt
        );
    }

    #[test]
    fn stats_track_failures() {
        let mut stats = ConnectionStats::default();
        stats.record_sent(12);
        let error = stats.record_failure(ConnectorError::NotConnected);

        assert_eq!(error, ChannelError::NotConnected);
        assert_eq!(stats.messages_sent, 1);
        assert_eq!(stats.bytes_sent, 12);
        assert_eq!(stats.messages_failed, 1);
        assert_eq!(stats.last_error.as_deref(), Some("Not connected"));
    }
}
