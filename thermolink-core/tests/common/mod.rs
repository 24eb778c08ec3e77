//! Fakes shared by the integration tests
//!
//! Every collaborator the node drives has an in-memory stand-in here that
//! records what it was asked to do and can be told to fail.

#![allow(dead_code)]

use std::collections::VecDeque;

use thermolink_core::{
    channel::{ControlRequest, Endpoint, Inbound, Indicator},
    errors::SensorError,
    BrokerChannel, Channel, ChannelError, Connectivity, ControlChannel, CycleReport,
    FieldWriter, Node, Peripherals, RetainedStore, SampleSource, Timestamp, Watchdog,
};

/// Sample source replaying a script, then repeating its last value
pub struct ScriptedSource {
    script: VecDeque<nb::Result<f32, SensorError>>,
    fallback: f32,
}

impl ScriptedSource {
    pub fn constant(value: f32) -> Self {
        Self {
            script: VecDeque::new(),
            fallback: value,
        }
    }

    /// Queue one full burst of `value`
    pub fn burst(&mut self, value: f32, samples: usize) {
        for _ in 0..samples {
            self.script.push_back(Ok(value));
        }
    }

    pub fn fail_once(&mut self, error: SensorError) {
        self.script.push_back(Err(nb::Error::Other(error)));
    }

    pub fn set(&mut self, value: f32) {
        self.fallback = value;
    }
}

impl SampleSource for ScriptedSource {
    fn read(&mut self) -> nb::Result<f32, SensorError> {
        self.script.pop_front().unwrap_or(Ok(self.fallback))
    }
}

#[derive(Default)]
pub struct FakeWatchdog {
    pub feeds: u32,
}

impl Watchdog for FakeWatchdog {
    fn feed(&mut self) {
        self.feeds += 1;
    }
}

pub struct FakeNetwork {
    pub up: bool,
    /// Whether a reconnect attempt brings the link up
    pub recovers: bool,
    pub attempts: u32,
    pub disconnects: u32,
}

impl Default for FakeNetwork {
    fn default() -> Self {
        Self {
            up: true,
            recovers: true,
            attempts: 0,
            disconnects: 0,
        }
    }
}

impl Connectivity for FakeNetwork {
    fn is_connected(&self) -> bool {
        self.up
    }

    fn reconnect(&mut self) -> bool {
        self.attempts += 1;
        self.up = self.recovers;
        self.up
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
        self.up = false;
    }
}

/// Key/value channel recording accepted messages
#[derive(Default)]
pub struct RecordingChannel {
    pub sent: Vec<(String, String)>,
    pub attempts: usize,
    /// Refuse the send with this attempt ordinal
    pub fail_at: Vec<usize>,
    pub offline: bool,
}

impl RecordingChannel {
    pub fn keys(&self) -> Vec<&str> {
        self.sent.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn payload_of(&self, key: &str) -> Option<&str> {
        self.sent
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, p)| p.as_str())
    }
}

impl Channel for RecordingChannel {
    fn send(&mut self, key: &str, payload: &str) -> Result<(), ChannelError> {
        let attempt = self.attempts;
        self.attempts += 1;
        if self.offline {
            return Err(ChannelError::NotConnected);
        }
        if self.fail_at.contains(&attempt) {
            return Err(ChannelError::Transport { reason: "timeout" });
        }
        self.sent.push((key.to_owned(), payload.to_owned()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeBroker {
    pub outbound: RecordingChannel,
    pub inbound: VecDeque<Inbound>,
}

impl FakeBroker {
    pub fn deliver(&mut self, topic: &str, payload: &str) {
        self.inbound.push_back(Inbound::new(topic, payload));
    }
}

impl Channel for FakeBroker {
    fn send(&mut self, key: &str, payload: &str) -> Result<(), ChannelError> {
        self.outbound.send(key, payload)
    }
}

impl BrokerChannel for FakeBroker {
    fn poll_inbound(&mut self) -> Option<Inbound> {
        self.inbound.pop_front()
    }
}

#[derive(Default)]
pub struct FakeGraph {
    staged: Vec<(u8, f32)>,
    pub writes: Vec<Vec<(u8, f32)>>,
    pub reject: bool,
}

impl FieldWriter for FakeGraph {
    fn set_field(&mut self, index: u8, value: f32) {
        self.staged.push((index, value));
    }

    fn commit(&mut self) -> Result<(), ChannelError> {
        let fields = std::mem::take(&mut self.staged);
        if self.reject {
            return Err(ChannelError::Rejected { reason: "quota" });
        }
        self.writes.push(fields);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeControl {
    pub requests: VecDeque<ControlRequest>,
    pub responses: Vec<(Endpoint, f32)>,
    pub rising: Option<bool>,
    pub falling: Option<bool>,
}

impl ControlChannel for FakeControl {
    fn poll_request(&mut self) -> Option<ControlRequest> {
        self.requests.pop_front()
    }

    fn respond(&mut self, endpoint: Endpoint, value: f32) -> Result<(), ChannelError> {
        self.responses.push((endpoint, value));
        Ok(())
    }

    fn set_indicator(&mut self, indicator: Indicator, on: bool) -> Result<(), ChannelError> {
        match indicator {
            Indicator::Rising => self.rising = Some(on),
            Indicator::Falling => self.falling = Some(on),
        }
        Ok(())
    }
}

/// Everything a node needs, owned in one place
pub struct Rig {
    pub temperature: ScriptedSource,
    pub signal: ScriptedSource,
    pub watchdog: FakeWatchdog,
    pub network: FakeNetwork,
    pub store: RetainedStore,
    pub debug: RecordingChannel,
    pub graph: FakeGraph,
    pub control: FakeControl,
    pub broker: FakeBroker,
}

impl Rig {
    pub fn new(temperature: f32, rssi: f32) -> Self {
        Self {
            temperature: ScriptedSource::constant(temperature),
            signal: ScriptedSource::constant(rssi),
            watchdog: FakeWatchdog::default(),
            network: FakeNetwork::default(),
            store: RetainedStore::new(),
            debug: RecordingChannel::default(),
            graph: FakeGraph::default(),
            control: FakeControl::default(),
            broker: FakeBroker::default(),
        }
    }

    /// One iteration with every channel attached
    pub fn run(&mut self, node: &mut Node, now: Timestamp) -> CycleReport {
        let mut hw = Peripherals {
            temperature: &mut self.temperature,
            signal: &mut self.signal,
            watchdog: &mut self.watchdog,
            network: &mut self.network,
            store: &mut self.store,
            debug: Some(&mut self.debug),
            graph: Some(&mut self.graph),
            control: Some(&mut self.control),
            broker: Some(&mut self.broker),
        };
        node.run_once(now, &mut hw)
    }
}
