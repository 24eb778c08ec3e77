//! Node configuration
//!
//! Which channels exist, which values each one carries, and every cadence in
//! the loop are values resolved when the node is constructed. One firmware
//! image serves every variant; a deployment only changes this struct (or
//! the JSON/TOML it is deserialized from on hosted builds).
//!
//! ```rust
//! use thermolink_core::config::{NodeConfig, DebugValue};
//!
//! let mut config = NodeConfig::default();
//! config.broker.enabled = false;
//! config.debug.values.clear();
//! config.debug.values.push(DebugValue::Temperature).unwrap();
//! assert!(config.validate().is_ok());
//! ```

use fugit::MillisDurationU64;
use heapless::{String, Vec};

use crate::acquire::Calibration;
use crate::channel::push_truncated;
use crate::classify::StatusLadder;
use crate::errors::ConfigError;

/// Samples per measurement burst
pub const BURST_SAMPLES: usize = 9;

/// Most library versions announced at boot
pub const MAX_LIBRARIES: usize = 4;

/// Most fields in one graph write
pub const MAX_GRAPH_FIELDS: usize = 8;

/// Values the debug channel can rotate through, in their fixed order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DebugValue {
    /// Smoothed RSSI
    SignalStrength,
    /// Smoothed temperature
    Temperature,
    /// Temperature status label
    Status,
    /// Retained reconnect count
    Reconnects,
    /// Outcome of the latest graph write
    LastWriteResult,
}

impl DebugValue {
    /// Every value, in default rotation order
    pub const ALL: [DebugValue; 5] = [
        DebugValue::SignalStrength,
        DebugValue::Temperature,
        DebugValue::Status,
        DebugValue::Reconnects,
        DebugValue::LastWriteResult,
    ];
}

/// Numeric fields the graph channel can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum GraphField {
    /// Smoothed RSSI
    SignalStrength,
    /// Smoothed temperature
    Temperature,
    /// Latest trend rate per minute
    TemperatureDelta,
}

/// A dependency announced in the boot messages
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LibraryVersion {
    /// Library name
    pub name: String<24>,
    /// Version string
    pub version: String<16>,
}

impl LibraryVersion {
    /// Build from borrowed parts, truncating to capacity
    pub fn new(name: &str, version: &str) -> Self {
        let mut library = Self {
            name: String::new(),
            version: String::new(),
        };
        push_truncated(&mut library.name, name);
        push_truncated(&mut library.version, version);
        library
    }
}

/// Sampling, smoothing and trend settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MeasurementConfig {
    /// Measurement cadence
    pub period_ms: u64,
    /// Samples dropped from each end of a burst
    pub burst_trim: usize,
    /// Smoothing factor for temperature, in (0, 1]
    pub temperature_factor: f32,
    /// Smoothing factor for RSSI, in (0, 1]
    pub signal_factor: f32,
    /// Raw temperature sample conversion
    pub calibration: Calibration,
    /// Span the trend rate is computed over
    pub trend_window_ms: u64,
    /// Rates smaller than this (per minute) count as steady
    pub trend_deadband: f32,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            period_ms: 5_000,
            burst_trim: 2,
            temperature_factor: 0.2,
            signal_factor: 0.5,
            calibration: Calibration::IDENTITY,
            trend_window_ms: 60_000,
            trend_deadband: 0.05,
        }
    }
}

impl MeasurementConfig {
    /// Measurement cadence
    pub fn period(&self) -> MillisDurationU64 {
        MillisDurationU64::millis(self.period_ms)
    }
}

/// Serial debug channel
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DebugConfig {
    /// Publish on this channel
    pub enabled: bool,
    /// Publish cadence
    pub period_ms: u64,
    /// Most messages per invocation
    pub quota: usize,
    /// Steady rotation, in order
    pub values: Vec<DebugValue, 5>,
}

impl Default for DebugConfig {
    fn default() -> Self {
        let mut values = Vec::new();
        for value in DebugValue::ALL {
            let _ = values.push(value);
        }
        Self {
            enabled: true,
            period_ms: 5_000,
            quota: 4,
            values,
        }
    }
}

impl DebugConfig {
    /// Publish cadence
    pub fn period(&self) -> MillisDurationU64 {
        MillisDurationU64::millis(self.period_ms)
    }

    /// Enabled values in their fixed rotation order, duplicates dropped
    pub fn rotation(&self) -> Vec<DebugValue, 5> {
        let mut rotation = Vec::new();
        for value in DebugValue::ALL {
            if self.values.contains(&value) {
                let _ = rotation.push(value);
            }
        }
        rotation
    }
}

/// HTTP graph channel
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GraphConfig {
    /// Publish on this channel
    pub enabled: bool,
    /// Write cadence
    pub period_ms: u64,
    /// Field `i` of the write carries `fields[i - 1]`
    pub fields: Vec<GraphField, MAX_GRAPH_FIELDS>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        let mut fields = Vec::new();
        let _ = fields.push(GraphField::SignalStrength);
        let _ = fields.push(GraphField::Temperature);
        let _ = fields.push(GraphField::TemperatureDelta);
        Self {
            enabled: true,
            period_ms: 60_000,
            fields,
        }
    }
}

impl GraphConfig {
    /// Write cadence
    pub fn period(&self) -> MillisDurationU64 {
        MillisDurationU64::millis(self.period_ms)
    }
}

/// Mobile control channel
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ControlConfig {
    /// Serve requests on this channel
    pub enabled: bool,
    /// Cadence of the indicator refresh
    pub period_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period_ms: 2_000,
        }
    }
}

impl ControlConfig {
    /// Indicator refresh cadence
    pub fn period(&self) -> MillisDurationU64 {
        MillisDurationU64::millis(self.period_ms)
    }
}

/// Publish/subscribe broker channel
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BrokerConfig {
    /// Publish on this channel
    pub enabled: bool,
    /// Publish cadence
    pub period_ms: u64,
    /// Most messages per invocation
    pub quota: usize,
    /// Prepended to every published and subscribed topic
    pub topic_prefix: String<32>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        let mut topic_prefix = String::new();
        push_truncated(&mut topic_prefix, "thermolink/node/");
        Self {
            enabled: true,
            period_ms: 10_000,
            quota: 6,
            topic_prefix,
        }
    }
}

impl BrokerConfig {
    /// Publish cadence
    pub fn period(&self) -> MillisDurationU64 {
        MillisDurationU64::millis(self.period_ms)
    }
}

/// Complete node configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NodeConfig {
    /// Name announced at boot
    pub device_name: String<24>,
    /// Firmware build identifier
    pub build_id: String<32>,
    /// Dependencies announced at boot
    pub libraries: Vec<LibraryVersion, MAX_LIBRARIES>,
    /// Sampling, smoothing and trend
    pub measurement: MeasurementConfig,
    /// Temperature status thresholds and labels
    pub temperature_ladder: StatusLadder,
    /// Signal status thresholds and labels
    pub signal_ladder: StatusLadder,
    /// How often a dropped link is retried
    pub reconnect_probe_ms: u64,
    /// Serial debug channel
    pub debug: DebugConfig,
    /// HTTP graph channel
    pub graph: GraphConfig,
    /// Mobile control channel
    pub control: ControlConfig,
    /// Broker channel
    pub broker: BrokerConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let mut device_name = String::new();
        push_truncated(&mut device_name, "thermolink");
        let mut build_id = String::new();
        push_truncated(&mut build_id, crate::VERSION);
        let mut libraries = Vec::new();
        let _ = libraries.push(LibraryVersion::new("thermolink-core", crate::VERSION));

        Self {
            device_name,
            build_id,
            libraries,
            measurement: MeasurementConfig::default(),
            temperature_ladder: StatusLadder::temperature(),
            signal_ladder: StatusLadder::signal(),
            reconnect_probe_ms: 30_000,
            debug: DebugConfig::default(),
            graph: GraphConfig::default(),
            control: ControlConfig::default(),
            broker: BrokerConfig::default(),
        }
    }
}

impl NodeConfig {
    /// How often a dropped link is retried
    pub fn reconnect_probe(&self) -> MillisDurationU64 {
        MillisDurationU64::millis(self.reconnect_probe_ms)
    }

    /// Check everything the node relies on at construction
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.temperature_ladder.validate()?;
        self.signal_ladder.validate()?;

        for factor in [
            self.measurement.temperature_factor,
            self.measurement.signal_factor,
        ] {
            if !(factor > 0.0 && factor <= 1.0) {
                return Err(ConfigError::InvalidFactor { factor });
            }
        }

        if self.measurement.burst_trim * 2 >= BURST_SAMPLES {
            return Err(ConfigError::InvalidTrim {
                trim: self.measurement.burst_trim,
                capacity: BURST_SAMPLES,
            });
        }

        let periods = [
            ("measurement", self.measurement.period_ms, true),
            ("trend window", self.measurement.trend_window_ms, true),
            ("reconnect probe", self.reconnect_probe_ms, true),
            ("debug", self.debug.period_ms, self.debug.enabled),
            ("graph", self.graph.period_ms, self.graph.enabled),
            ("control", self.control.period_ms, self.control.enabled),
            ("broker", self.broker.period_ms, self.broker.enabled),
        ];
        for (task, period_ms, enabled) in periods {
            if enabled && period_ms == 0 {
                return Err(ConfigError::ZeroPeriod { task });
            }
        }

        if self.debug.enabled && self.debug.quota == 0 {
            return Err(ConfigError::ZeroQuota { channel: "debug" });
        }
        if self.broker.enabled && self.broker.quota == 0 {
            return Err(ConfigError::ZeroQuota { channel: "broker" });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(NodeConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_zero_quota() {
        let mut config = NodeConfig::default();
        config.debug.quota = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroQuota { channel: "debug" })
        );

        // A disabled channel is not checked
        config.debug.enabled = false;
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_zero_period() {
        let mut config = NodeConfig::default();
        config.graph.period_ms = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroPeriod { task: "graph" })
        );
    }

    #[test]
    fn rejects_bad_factor() {
        let mut config = NodeConfig::default();
        config.measurement.signal_factor = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFactor { .. })
        ));
    }

    #[test]
    fn rejects_excessive_trim() {
        let mut config = NodeConfig::default();
        config.measurement.burst_trim = BURST_SAMPLES / 2 + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTrim { .. })
        ));
    }

    #[test]
    fn rotation_order_is_fixed() {
        let mut debug = DebugConfig::default();
        debug.values.clear();
        debug.values.push(DebugValue::Reconnects).unwrap();
        debug.values.push(DebugValue::SignalStrength).unwrap();
        debug.values.push(DebugValue::Reconnects).unwrap();

        assert_eq!(
            debug.rotation().as_slice(),
            &[DebugValue::SignalStrength, DebugValue::Reconnects]
        );
    }

    #[test]
    fn periods_convert() {
        let config = NodeConfig::default();
        assert_eq!(config.measurement.period().to_millis(), 5_000);
        assert_eq!(config.reconnect_probe().to_millis(), 30_000);
    }

    #[test]
    fn deserializes_partial_json() {
        let json = r#"{
            "device_name": "attic",
            "debug": { "quota": 2, "values": ["temperature", "status"] },
            "broker": { "enabled": false }
        }"#;

        let config: NodeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.device_name.as_str(), "attic");
        assert_eq!(config.debug.quota, 2);
        assert_eq!(config.debug.period_ms, 5_000);
        assert!(!config.broker.enabled);
        assert_eq!(config.validate(), Ok(()));
    }
}
