//! Simulated Sensor Node
//!
//! Runs the full control loop against simulated hardware for two minutes of
//! virtual time and prints every message each destination receives.
//!
//! ## What You'll See
//!
//! - The debug channel sending its boot table, then rotating values four at a time
//! - The broker announcing itself and publishing its topic set
//! - A graph write every minute
//! - The trend indicator switching on as the room warms up
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run --example simulated_node
//! ```

use thermolink_core::{
    channel::{ControlRequest, Endpoint, Inbound, Indicator},
    traits::CountingWatchdog,
    BrokerChannel, Channel, ChannelError, Connectivity, ControlChannel, FieldWriter, Node,
    NodeConfig, Peripherals, RetainedStore, SampleSource, SensorError, TimeSource,
    time::FixedTime,
};

/// Room warming by a fixed amount per sample, with a little ripple
struct WarmingRoom {
    temperature: f32,
    step: u32,
}

impl SampleSource for WarmingRoom {
    fn read(&mut self) -> nb::Result<f32, SensorError> {
        self.step = self.step.wrapping_add(1);
        self.temperature += 0.002;
        let ripple = ((self.step % 5) as f32 - 2.0) * 0.05;
        Ok(self.temperature + ripple)
    }
}

struct Radio;

impl SampleSource for Radio {
    fn read(&mut self) -> nb::Result<f32, SensorError> {
        Ok(-68.0)
    }
}

struct Wifi {
    up: bool,
}

impl Connectivity for Wifi {
    fn is_connected(&self) -> bool {
        self.up
    }

    fn reconnect(&mut self) -> bool {
        println!("  [wifi] reconnecting");
        self.up = true;
        true
    }

    fn disconnect(&mut self) {
        println!("  [wifi] disconnect requested");
        self.up = false;
    }
}

struct Printer(&'static str);

impl Channel for Printer {
    fn send(&mut self, key: &str, payload: &str) -> Result<(), ChannelError> {
        println!("  [{}] {} = {}", self.0, key, payload);
        Ok(())
    }
}

struct Broker {
    out: Printer,
    pending: Vec<Inbound>,
}

impl Channel for Broker {
    fn send(&mut self, key: &str, payload: &str) -> Result<(), ChannelError> {
        self.out.send(key, payload)
    }
}

impl BrokerChannel for Broker {
    fn poll_inbound(&mut self) -> Option<Inbound> {
        self.pending.pop()
    }
}

#[derive(Default)]
struct Graph {
    fields: Vec<(u8, f32)>,
}

impl FieldWriter for Graph {
    fn set_field(&mut self, index: u8, value: f32) {
        self.fields.push((index, value));
    }

    fn commit(&mut self) -> Result<(), ChannelError> {
        println!("  [graph] {:?}", self.fields);
        self.fields.clear();
        Ok(())
    }
}

struct App {
    pending: Vec<ControlRequest>,
}

impl ControlChannel for App {
    fn poll_request(&mut self) -> Option<ControlRequest> {
        self.pending.pop()
    }

    fn respond(&mut self, endpoint: Endpoint, value: f32) -> Result<(), ChannelError> {
        println!("  [app] pin {} -> {}", endpoint.pin(), value);
        Ok(())
    }

    fn set_indicator(&mut self, indicator: Indicator, on: bool) -> Result<(), ChannelError> {
        if on {
            println!("  [app] indicator {:?} on", indicator);
        }
        Ok(())
    }
}

fn main() {
    println!("thermolink simulated node");
    println!("=========================\n");

    let mut config = NodeConfig::default();
    config.measurement.trend_deadband = 0.01;

    let mut store = RetainedStore::new();
    let mut node = match Node::new(config) {
        Ok(node) => node,
        Err(e) => {
            eprintln!("invalid configuration: {}", e);
            return;
        }
    };
    node.boot(&mut store, 1_700_000_000);

    let mut temperature = WarmingRoom {
        temperature: 19.5,
        step: 0,
    };
    let mut radio = Radio;
    let mut watchdog = CountingWatchdog::default();
    let mut wifi = Wifi { up: true };
    let mut debug = Printer("debug");
    let mut graph = Graph::default();
    let mut app = App {
        pending: vec![ControlRequest::Read(Endpoint::BootCount)],
    };
    let mut broker = Broker {
        out: Printer("broker"),
        pending: vec![Inbound::new("thermolink/node/cmd/getinfo", "")],
    };

    let mut clock = FixedTime::new(0);
    while clock.now() <= 120_000 {
        let mut hw = Peripherals {
            temperature: &mut temperature,
            signal: &mut radio,
            watchdog: &mut watchdog,
            network: &mut wifi,
            store: &mut store,
            debug: Some(&mut debug),
            graph: Some(&mut graph),
            control: Some(&mut app),
            broker: Some(&mut broker),
        };

        let report = node.run_once(clock.now(), &mut hw);
        if report.measured {
            println!(
                "t={:>6}ms  {:.2} C  trend {:?}",
                clock.now(),
                node.temperature().value,
                node.trend_rate()
            );
        }
        clock.advance(1_000);
    }

    let snapshot = node.snapshot(clock.now());
    println!("\ndisplay ({:?}):\n{}", node.display_mode(), node.display_mode().render(&snapshot));
    println!("watchdog fed {} times", watchdog.feeds);
}
