//! In-process control channel
//!
//! Stands in for a mobile control app: a local UI, a test harness or a
//! bridge thread pushes requests in and reads back responses and indicator
//! states. Responses keep the latest value per endpoint, like the virtual
//! pins of a control app.

use std::collections::{HashMap, VecDeque};

use thermolink_core::{
    channel::{ControlRequest, Endpoint, Indicator},
    ChannelError, ControlChannel,
};

#[derive(Debug, Default)]
pub struct LoopbackControl {
    pending: VecDeque<ControlRequest>,
    values: HashMap<Endpoint, f32>,
    indicators: HashMap<Indicator, bool>,
    connected: bool,
}

impl LoopbackControl {
    pub fn new() -> Self {
        Self {
            connected: true,
            ..Self::default()
        }
    }

    /// Ask the node for the value behind `pin`
    pub fn request_read(&mut self, pin: u8) -> bool {
        match Endpoint::from_pin(pin) {
            Some(endpoint) => {
                self.pending.push_back(ControlRequest::Read(endpoint));
                true
            }
            None => false,
        }
    }

    /// Write `level` to a writable `pin`; read-only pins are refused here
    pub fn request_write(&mut self, pin: u8, level: i32) -> bool {
        match Endpoint::from_pin(pin) {
            Some(endpoint) if endpoint.is_writable() => {
                self.pending.push_back(ControlRequest::Write(endpoint, level));
                true
            }
            _ => false,
        }
    }

    /// Latest value the node reported for `endpoint`
    pub fn value(&self, endpoint: Endpoint) -> Option<f32> {
        self.values.get(&endpoint).copied()
    }

    pub fn indicator(&self, indicator: Indicator) -> bool {
        self.indicators.get(&indicator).copied().unwrap_or(false)
    }

    /// Simulate the app going away; responses then fail
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl ControlChannel for LoopbackControl {
    fn poll_request(&mut self) -> Option<ControlRequest> {
        self.pending.pop_front()
    }

    fn respond(&mut self, endpoint: Endpoint, value: f32) -> Result<(), ChannelError> {
        if !self.connected {
            return Err(ChannelError::NotConnected);
        }
        self.values.insert(endpoint, value);
        Ok(())
    }

    fn set_indicator(&mut self, indicator: Indicator, on: bool) -> Result<(), ChannelError> {
        if !self.connected {
            return Err(ChannelError::NotConnected);
        }
        self.indicators.insert(indicator, on);
        Ok(())
    }
}
