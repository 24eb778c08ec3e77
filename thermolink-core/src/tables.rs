//! Message tables for the debug and broker channels
//!
//! Both tables render from a [`Snapshot`] of node state taken just before
//! the scheduler runs, so the values in a batch are consistent with each
//! other and a retried message carries the latest numbers.

use core::fmt;

use chrono::{DateTime, Datelike, Timelike, Utc};
use heapless::Vec;

use crate::classify::signal_quality;
use crate::config::{DebugValue, NodeConfig};
use crate::message::{Message, MessageTable, Phase};
use crate::stats::PersistentRecord;
use crate::time::Timestamp;
use crate::traits::Reading;
use crate::trend::Direction;

/// Point-in-time view of everything a message may report
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    /// Monotonic time of the snapshot
    pub now: Timestamp,
    /// Smoothed temperature
    pub temperature: Reading,
    /// Smoothed RSSI
    pub signal: Reading,
    /// Latest temperature rate in units per minute
    pub trend: Option<f32>,
    /// Direction of the latest rate
    pub direction: Direction,
    /// Temperature status label
    pub temperature_status: &'a str,
    /// Signal status label
    pub signal_status: &'a str,
    /// Retained record
    pub record: &'a PersistentRecord,
    /// Outcome of the latest graph write, `None` before the first one
    pub last_graph_write: Option<bool>,
}

/// Formats a reading value, or `n/a` for the NaN sentinel
struct Value {
    value: f32,
    precision: usize,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_nan() {
            f.write_str("n/a")
        } else {
            write!(f, "{:.*}", self.precision, self.value)
        }
    }
}

fn value(value: f32, precision: usize) -> Value {
    Value { value, precision }
}

/// Extrema are only meaningful once something was folded in
fn extreme(record: &PersistentRecord, pick: fn(&PersistentRecord) -> f32) -> Value {
    if record.has_extremes() {
        value(pick(record), 1)
    } else {
        value(f32::NAN, 1)
    }
}

/// Epoch seconds rendered as a UTC date and time
struct BootTime(u64);

impl fmt::Display for BootTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DateTime::<Utc>::from_timestamp(self.0 as i64, 0) {
            Some(at) if self.0 > 0 => write!(
                f,
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}Z",
                at.year(),
                at.month(),
                at.day(),
                at.hour(),
                at.minute(),
                at.second()
            ),
            _ => f.write_str("unsynced"),
        }
    }
}

/// Signed rate, or `n/a` before the first window closed
struct Rate(Option<f32>);

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(rate) if rate.is_finite() => write!(f, "{:+.2}", rate),
            _ => f.write_str("n/a"),
        }
    }
}

/// Debug channel: boot summary, build, libraries; then rotating values
pub struct DebugTable<'a> {
    config: &'a NodeConfig,
    snapshot: &'a Snapshot<'a>,
    rotation: Vec<DebugValue, 5>,
}

impl<'a> DebugTable<'a> {
    /// Rotation taken from the debug configuration
    pub fn new(config: &'a NodeConfig, snapshot: &'a Snapshot<'a>) -> Self {
        Self {
            config,
            snapshot,
            rotation: config.debug.rotation(),
        }
    }

    fn render_boot(&self, index: usize) -> Message {
        let record = self.snapshot.record;
        match index {
            0 => Message::new(
                "boot",
                format_args!(
                    "#{} at {}, previous run {}s",
                    record.boot_count,
                    BootTime(record.last_boot_time),
                    record.last_run_duration_secs
                ),
            ),
            1 => Message::new(
                "build",
                format_args!("{} {}", self.config.device_name, self.config.build_id),
            ),
            n => match self.config.libraries.get(n - 2) {
                Some(library) => Message::with_prefix(
                    "lib/",
                    &library.name,
                    format_args!("{}", library.version),
                ),
                None => Message::new("lib", format_args!("")),
            },
        }
    }

    fn render_value(&self, value: DebugValue) -> Message {
        let snap = self.snapshot;
        match value {
            DebugValue::SignalStrength => Message::new(
                "signal",
                format_args!(
                    "{} dBm, {}% ({})",
                    self::value(snap.signal.value, 0),
                    signal_quality(snap.signal.value),
                    snap.signal_status
                ),
            ),
            DebugValue::Temperature => Message::new(
                "temperature",
                format_args!(
                    "{} C, {}/min {}",
                    self::value(snap.temperature.value, 1),
                    Rate(snap.trend),
                    snap.direction.as_str()
                ),
            ),
            DebugValue::Status => Message::new("status", format_args!("{}", snap.temperature_status)),
            DebugValue::Reconnects => {
                Message::new("reconnects", format_args!("{}", snap.record.reconnect_count))
            }
            DebugValue::LastWriteResult => Message::new(
                "graph-write",
                format_args!(
                    "{}",
                    match snap.last_graph_write {
                        None => "pending",
                        Some(true) => "ok",
                        Some(false) => "failed",
                    }
                ),
            ),
        }
    }
}

impl MessageTable for DebugTable<'_> {
    fn len(&self, phase: Phase) -> usize {
        match phase {
            Phase::Boot => 2 + self.config.libraries.len(),
            Phase::Steady => self.rotation.len(),
        }
    }

    fn render(&self, phase: Phase, index: usize) -> Message {
        match phase {
            Phase::Boot => self.render_boot(index),
            Phase::Steady => match self.rotation.get(index) {
                Some(value) => self.render_value(*value),
                None => Message::new("", format_args!("")),
            },
        }
    }
}

/// Broker topic suffixes published every period, in order
pub const BROKER_TOPICS: [&str; 6] = [
    "status",
    "signal",
    "temperature",
    "temperature/min",
    "temperature/max",
    "temperature/delta",
];

/// Broker channel: an `online` announcement, then the fixed topic set
pub struct BrokerTable<'a> {
    config: &'a NodeConfig,
    snapshot: &'a Snapshot<'a>,
}

impl<'a> BrokerTable<'a> {
    /// Broker messages for `config` and `snapshot`
    pub fn new(config: &'a NodeConfig, snapshot: &'a Snapshot<'a>) -> Self {
        Self { config, snapshot }
    }
}

impl MessageTable for BrokerTable<'_> {
    fn len(&self, phase: Phase) -> usize {
        match phase {
            Phase::Boot => 1,
            Phase::Steady => BROKER_TOPICS.len(),
        }
    }

    fn render(&self, phase: Phase, index: usize) -> Message {
        let prefix = self.config.broker.topic_prefix.as_str();
        let snap = self.snapshot;

        if phase == Phase::Boot {
            return Message::with_prefix(
                prefix,
                "online",
                format_args!("boot {}", snap.record.boot_count),
            );
        }

        let topic = BROKER_TOPICS.get(index).copied().unwrap_or("");
        match index {
            0 => Message::with_prefix(prefix, topic, format_args!("{}", snap.temperature_status)),
            1 => Message::with_prefix(prefix, topic, format_args!("{}", value(snap.signal.value, 0))),
            2 => Message::with_prefix(
                prefix,
                topic,
                format_args!("{}", value(snap.temperature.value, 2)),
            ),
            3 => Message::with_prefix(
                prefix,
                topic,
                format_args!("{}", extreme(snap.record, |r| r.min_observed)),
            ),
            4 => Message::with_prefix(
                prefix,
                topic,
                format_args!("{}", extreme(snap.record, |r| r.max_observed)),
            ),
            _ => Message::with_prefix(prefix, topic, format_args!("{}", Rate(snap.trend))),
        }
    }
}

/// Reply to a broker `getinfo` command
pub fn info_message(config: &NodeConfig, snapshot: &Snapshot<'_>) -> Message {
    let record = snapshot.record;
    Message::with_prefix(
        config.broker.topic_prefix.as_str(),
        "info",
        format_args!(
            "{} {}: {} C ({}, {}/min) min {} max {}, {} dBm ({}), boots {}, reconnects {}, up {}s",
            config.device_name,
            config.build_id,
            value(snapshot.temperature.value, 1),
            snapshot.temperature_status,
            Rate(snapshot.trend),
            extreme(record, |r| r.min_observed),
            extreme(record, |r| r.max_observed),
            value(snapshot.signal.value, 0),
            snapshot.signal_status,
            record.boot_count,
            record.reconnect_count,
            snapshot.now / 1000
        ),
    )
}
