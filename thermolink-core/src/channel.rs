//! Outbound channel contracts
//!
//! The node publishes to four kinds of destination. Each transport lives
//! outside this crate; these traits are the seams it plugs into.
//!
//! | Destination | Trait              | Driven by                         |
//! |-------------|--------------------|-----------------------------------|
//! | Debug       | [`Channel`]        | publish scheduler (boot + rotate) |
//! | Graph       | [`FieldWriter`]    | one multi-field write per period  |
//! | Control     | [`ControlChannel`] | pull requests + indicator outputs |
//! | Broker      | [`BrokerChannel`]  | publish scheduler + inbound pump  |
//!
//! Every send is synchronous and reports acceptance through `Result`. A
//! failure is never fatal: the scheduler keeps the message and retries it
//! first on its next invocation.

use heapless::String;

use crate::errors::ChannelError;

/// Longest topic or key accepted by the tables
pub const TOPIC_LEN: usize = 64;

/// Longest inbound command payload
pub const COMMAND_PAYLOAD_LEN: usize = 64;

/// Key/value publisher
pub trait Channel {
    /// Hand one message to the destination
    fn send(&mut self, key: &str, payload: &str) -> Result<(), ChannelError>;
}

/// Graphing destination taking a set of numeric fields per write
///
/// Fields are staged with [`set_field`](Self::set_field) and go out together
/// on [`commit`](Self::commit), which also clears the staging area.
pub trait FieldWriter {
    /// Stage field `index` (1-based, as graphing services number them)
    fn set_field(&mut self, index: u8, value: f32);

    /// Send the staged fields as one write
    fn commit(&mut self) -> Result<(), ChannelError>;
}

/// Virtual endpoints exposed to the mobile control app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Retained boot counter
    BootCount,
    /// Retained reconnect counter
    Reconnects,
    /// Smoothed temperature
    Temperature,
    /// Lowest temperature seen
    TemperatureMin,
    /// Highest temperature seen
    TemperatureMax,
    /// Smoothed RSSI in dBm
    SignalStrength,
    /// Rising edge resets the extrema to the current reading
    ResetExtremes,
    /// Rising edge zeroes the boot and reconnect counters
    ResetCounters,
    /// Rising edge drops the network link
    Disconnect,
}

impl Endpoint {
    /// Every endpoint, in pin order
    pub const ALL: [Endpoint; 9] = [
        Endpoint::BootCount,
        Endpoint::Reconnects,
        Endpoint::Temperature,
        Endpoint::TemperatureMin,
        Endpoint::TemperatureMax,
        Endpoint::SignalStrength,
        Endpoint::ResetExtremes,
        Endpoint::ResetCounters,
        Endpoint::Disconnect,
    ];

    /// Virtual pin number in the control app
    pub const fn pin(self) -> u8 {
        match self {
            Endpoint::BootCount => 0,
            Endpoint::Reconnects => 1,
            Endpoint::Temperature => 2,
            Endpoint::TemperatureMin => 3,
            Endpoint::TemperatureMax => 4,
            Endpoint::SignalStrength => 5,
            Endpoint::ResetExtremes => 10,
            Endpoint::ResetCounters => 11,
            Endpoint::Disconnect => 12,
        }
    }

    /// Endpoint bound to virtual `pin`
    pub fn from_pin(pin: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.pin() == pin)
    }

    /// Writable endpoints trigger administrative actions
    pub const fn is_writable(self) -> bool {
        matches!(
            self,
            Endpoint::ResetExtremes | Endpoint::ResetCounters | Endpoint::Disconnect
        )
    }
}

/// Request arriving from the control app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    /// App wants the current value of a readable endpoint
    Read(Endpoint),
    /// App wrote a level to a writable endpoint
    Write(Endpoint, i32),
}

/// Binary indicator outputs in the control app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    /// Temperature is climbing
    Rising,
    /// Temperature is dropping
    Falling,
}

/// Mobile control destination
pub trait ControlChannel {
    /// Pump the transport and return the next pending request, if any
    fn poll_request(&mut self) -> Option<ControlRequest>;

    /// Answer a read request
    fn respond(&mut self, endpoint: Endpoint, value: f32) -> Result<(), ChannelError>;

    /// Switch an indicator on or off
    fn set_indicator(&mut self, indicator: Indicator, on: bool) -> Result<(), ChannelError>;
}

/// Message received on a subscribed broker topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Full topic as received
    pub topic: String<TOPIC_LEN>,
    /// UTF-8 payload, truncated to capacity
    pub payload: String<COMMAND_PAYLOAD_LEN>,
}

impl Inbound {
    /// Build from borrowed parts, truncating to capacity
    pub fn new(topic: &str, payload: &str) -> Self {
        let mut inbound = Self {
            topic: String::new(),
            payload: String::new(),
        };
        push_truncated(&mut inbound.topic, topic);
        push_truncated(&mut inbound.payload, payload);
        inbound
    }
}

/// Publish/subscribe broker destination
pub trait BrokerChannel: Channel {
    /// Pump the transport and return the next inbound command message
    fn poll_inbound(&mut self) -> Option<Inbound>;
}

/// Append as much of `text` as fits; returns `false` if anything was cut
pub fn push_truncated<const N: usize>(target: &mut String<N>, text: &str) -> bool {
    for ch in text.chars() {
        if target.push(ch).is_err() {
            return false;
        }
    }
    true
}
