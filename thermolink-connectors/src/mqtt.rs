//! MQTT broker channel
//!
//! Publishes through the `rumqttc` request queue with QoS 0 and never
//! blocks the control loop: a full queue or a dropped connection is reported
//! as a failed send and the publish scheduler retries next period.
//!
//! The connection's event loop runs on its own thread and forwards link
//! changes and received publishes over a channel. `poll_inbound` drains that
//! channel, tracks the link state, re-subscribes to `{prefix}cmd/#` and
//! marks `{prefix}online` on every (re)connect, and hands out command
//! messages one at a time.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use rumqttc::{Client, Connection, Event, LastWill, MqttOptions, Packet, Publish, QoS};
use thermolink_core::{channel::Inbound, BrokerChannel, Channel, ChannelError};

use crate::{ConnectionStats, ConnectorError};

/// Events processed per `poll_inbound` call before giving the loop back
const MAX_EVENTS_PER_POLL: usize = 16;

/// Pause before the event loop retries after a connection error
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Broker connection settings
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// Prefix shared with the node's broker topics, ending in `/`
    pub topic_prefix: String,
    pub keep_alive: Duration,
    pub credentials: Option<(String, String)>,
    /// Capacity of the outgoing request queue
    pub queue_capacity: usize,
}

impl MqttConfig {
    pub fn new(host: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 1883,
            client_id: client_id.into(),
            topic_prefix: "thermolink/node/".into(),
            keep_alive: Duration::from_secs(60),
            credentials: None,
            queue_capacity: 32,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = prefix.into();
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Topic filter for inbound commands
    pub fn command_filter(&self) -> String {
        format!("{}cmd/#", self.topic_prefix)
    }

    /// Retained presence topic; the last will sets it to `offline`
    pub fn presence_topic(&self) -> String {
        format!("{}online", self.topic_prefix)
    }

    fn options(&self) -> Result<MqttOptions, ConnectorError> {
        if self.host.is_empty() || self.client_id.is_empty() {
            return Err(ConnectorError::ConfigError(
                "Host and client id are required".into(),
            ));
        }

        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_last_will(LastWill::new(
            self.presence_topic(),
            "offline",
            QoS::AtLeastOnce,
            true,
        ));
        if let Some((username, password)) = &self.credentials {
            options.set_credentials(username, password);
        }
        Ok(options)
    }
}

/// What the event loop thread reports back
#[derive(Debug)]
enum LinkEvent {
    Up,
    Down(String),
    Message(Publish),
}

/// Drive the connection until the client side goes away
fn run_event_loop(mut connection: Connection, events: mpsc::Sender<LinkEvent>) {
    for notification in connection.iter() {
        let event = match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => LinkEvent::Up,
            Ok(Event::Incoming(Packet::Disconnect)) => {
                LinkEvent::Down("broker disconnect".into())
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => LinkEvent::Message(publish),
            Ok(_) => continue,
            Err(e) => {
                if events.send(LinkEvent::Down(e.to_string())).is_err() {
                    break;
                }
                thread::sleep(RETRY_DELAY);
                continue;
            }
        };
        if events.send(event).is_err() {
            break;
        }
    }
    log::debug!("MQTT event loop stopped");
}

/// Broker destination over MQTT
pub struct MqttBroker {
    config: MqttConfig,
    client: Client,
    events: Receiver<LinkEvent>,
    connected: bool,
    stats: ConnectionStats,
}

impl MqttBroker {
    /// Start the event loop thread; the link comes up as `poll_inbound` is pumped
    pub fn connect(config: MqttConfig) -> Result<Self, ConnectorError> {
        let options = config.options()?;
        let (client, connection) = Client::new(options, config.queue_capacity.max(1));
        let (sender, events) = mpsc::channel();

        thread::Builder::new()
            .name("mqtt-events".into())
            .spawn(move || run_event_loop(connection, sender))?;

        log::info!(
            "MQTT connecting to {}:{} as {}",
            config.host,
            config.port,
            config.client_id
        );

        Ok(Self {
            config,
            client,
            events,
            connected: false,
            stats: ConnectionStats::default(),
        })
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Link state as of the last `poll_inbound`
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn on_connected(&mut self) {
        log::info!("MQTT connected");
        self.connected = true;
        self.stats.reconnections += 1;

        let filter = self.config.command_filter();
        if let Err(e) = self.client.try_subscribe(filter, QoS::AtLeastOnce) {
            log::warn!("MQTT subscribe failed: {}", e);
        }
        let presence = self.config.presence_topic();
        if let Err(e) = self
            .client
            .try_publish(presence, QoS::AtLeastOnce, true, "online")
        {
            log::warn!("MQTT presence publish failed: {}", e);
        }
    }

    /// Process one forwarded event; `Some(inbound)` for a command message
    fn pump_once(&mut self) -> Option<Option<Inbound>> {
        let event = match self.events.try_recv() {
            Ok(event) => event,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                self.connected = false;
                return None;
            }
        };

        match event {
            LinkEvent::Up => {
                self.on_connected();
                Some(None)
            }
            LinkEvent::Down(reason) => {
                if self.connected {
                    log::warn!("MQTT connection lost: {}", reason);
                }
                self.connected = false;
                Some(None)
            }
            LinkEvent::Message(publish) => Some(inbound_from(&publish)),
        }
    }
}

/// Convert a received publish, dropping payloads that are not UTF-8
fn inbound_from(publish: &Publish) -> Option<Inbound> {
    match std::str::from_utf8(&publish.payload) {
        Ok(payload) => Some(Inbound::new(&publish.topic, payload)),
        Err(_) => {
            log::warn!("Dropping non-UTF-8 message on {}", publish.topic);
            None
        }
    }
}

impl Channel for MqttBroker {
    fn send(&mut self, key: &str, payload: &str) -> Result<(), ChannelError> {
        if !self.connected {
            return Err(self.stats.record_failure(ConnectorError::NotConnected));
        }

        match self
            .client
            .try_publish(key, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
        {
            Ok(()) => {
                self.stats.record_sent(key.len() + payload.len());
                Ok(())
            }
            Err(e) => Err(self
                .stats
                .record_failure(ConnectorError::ProtocolError(e.to_string()))),
        }
    }
}

impl BrokerChannel for MqttBroker {
    fn poll_inbound(&mut self) -> Option<Inbound> {
        for _ in 0..MAX_EVENTS_PER_POLL {
            match self.pump_once() {
                None => return None,
                Some(Some(inbound)) => return Some(inbound),
                Some(None) => {}
            }
        }
        None
    }
}
