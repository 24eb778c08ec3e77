//! End-to-end behaviour of the node control loop
//!
//! Drives a [`Node`] with in-memory fakes for every collaborator and checks
//! what reaches each destination across successive iterations.

mod common;

use thermolink_core::{
    channel::{ControlRequest, Endpoint},
    errors::SensorError,
    scheduler::StopReason,
    Direction, Node, NodeConfig, Phase, RecordStore,
};

use common::Rig;

const EPOCH: u64 = 1_700_000_000;

fn node_with(config: NodeConfig, rig: &mut Rig) -> Node {
    let mut node = Node::new(config).unwrap();
    node.boot(&mut rig.store, EPOCH);
    node
}

/// Smoothing disabled so readings equal the raw burst
fn unsmoothed() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.measurement.temperature_factor = 1.0;
    config.measurement.signal_factor = 1.0;
    config
}

#[test]
fn debug_channel_sends_boot_table_then_rotates() {
    let mut rig = Rig::new(21.0, -65.0);
    let mut node = node_with(NodeConfig::default(), &mut rig);

    let first = rig.run(&mut node, 0);
    let debug = first.debug.unwrap();
    assert_eq!(debug.sent, 4);
    assert_eq!(debug.boot_sent, 3);

    rig.run(&mut node, 5_000);
    rig.run(&mut node, 10_000);

    assert_eq!(
        rig.debug.keys(),
        [
            "boot",
            "build",
            "lib/thermolink-core",
            "signal",
            "temperature",
            "status",
            "reconnects",
            "graph-write",
            "signal",
            "temperature",
            "status",
            "reconnects",
        ]
    );
    assert_eq!(rig.debug.payload_of("signal"), Some("-65 dBm, 70% (good)"));
    assert_eq!(rig.debug.payload_of("status"), Some("comfortable"));
    assert!(rig.debug.sent[0].1.starts_with("#1 at 2023-11-14"));
}

#[test]
fn graph_outcome_feeds_debug_rotation() {
    let mut rig = Rig::new(21.0, -65.0);
    let mut node = node_with(NodeConfig::default(), &mut rig);

    let report = rig.run(&mut node, 0);
    assert_eq!(report.graph, Some(true));
    // Delta is unknown until a trend window closes
    assert_eq!(rig.graph.writes, vec![vec![(1, -65.0), (2, 21.0)]]);

    rig.run(&mut node, 5_000);
    assert_eq!(rig.debug.payload_of("graph-write"), Some("ok"));

    rig.graph.reject = true;
    let report = rig.run(&mut node, 60_000);
    assert_eq!(report.graph, Some(false));
    assert_eq!(node.last_graph_write(), Some(false));
}

#[test]
fn offline_debug_channel_resumes_where_it_stalled() {
    let mut rig = Rig::new(21.0, -65.0);
    let mut node = node_with(NodeConfig::default(), &mut rig);

    rig.debug.offline = true;
    let report = rig.run(&mut node, 0);
    assert_eq!(report.debug.unwrap().sent, 0);
    assert!(matches!(
        report.debug.unwrap().stop,
        StopReason::Stalled {
            phase: Phase::Boot,
            index: 0,
            ..
        }
    ));

    rig.debug.offline = false;
    rig.run(&mut node, 5_000);
    assert_eq!(
        rig.debug.keys(),
        ["boot", "build", "lib/thermolink-core", "signal"]
    );
    assert_eq!(node.debug_scheduler().stats().stalls, 1);
}

#[test]
fn broker_publishes_topics_under_quota() {
    let mut rig = Rig::new(21.0, -65.0);
    let mut node = node_with(NodeConfig::default(), &mut rig);

    let first = rig.run(&mut node, 0).broker.unwrap();
    assert_eq!(first.sent, 6);
    let second = rig.run(&mut node, 10_000).broker.unwrap();
    assert_eq!(second.sent, 6);

    let keys = rig.broker.outbound.keys();
    assert_eq!(
        keys,
        [
            "thermolink/node/online",
            "thermolink/node/status",
            "thermolink/node/signal",
            "thermolink/node/temperature",
            "thermolink/node/temperature/min",
            "thermolink/node/temperature/max",
            "thermolink/node/temperature/delta",
            "thermolink/node/status",
            "thermolink/node/signal",
            "thermolink/node/temperature",
            "thermolink/node/temperature/min",
            "thermolink/node/temperature/max",
        ]
    );
    assert_eq!(
        rig.broker.outbound.payload_of("thermolink/node/temperature"),
        Some("21.00")
    );
    assert_eq!(
        rig.broker.outbound.payload_of("thermolink/node/temperature/delta"),
        Some("n/a")
    );
}

#[test]
fn broker_commands_reset_and_report() {
    let mut rig = Rig::new(20.0, -65.0);
    let mut node = node_with(unsmoothed(), &mut rig);

    rig.run(&mut node, 0);
    rig.temperature.set(24.0);
    rig.run(&mut node, 5_000);
    assert_eq!(node.record().min_observed, 20.0);
    assert_eq!(node.record().max_observed, 24.0);

    rig.broker.deliver("thermolink/node/cmd/reset", "extremes");
    rig.broker.deliver("thermolink/node/cmd/getinfo", "");
    rig.broker.deliver("thermolink/node/cmd/reset", "bogus");
    let report = rig.run(&mut node, 6_000);

    assert_eq!(report.commands, 3);
    assert_eq!(node.record().min_observed, 24.0);
    assert_eq!(node.record().max_observed, 24.0);

    let info = rig
        .broker
        .outbound
        .payload_of("thermolink/node/info")
        .unwrap();
    assert!(info.contains("24.0 C"));
    assert!(info.contains("min 24.0 max 24.0"));

    rig.broker.deliver("thermolink/node/cmd/reset", "counters");
    rig.run(&mut node, 7_000);
    assert_eq!(node.record().boot_count, 0);
    assert_eq!(node.record().max_observed, 24.0);
}

#[test]
fn control_reads_are_answered() {
    let mut rig = Rig::new(21.0, -72.0);
    let mut node = node_with(unsmoothed(), &mut rig);

    rig.control
        .requests
        .push_back(ControlRequest::Read(Endpoint::TemperatureMin));
    rig.run(&mut node, 0);
    // Served before the first measurement
    assert!(rig.control.responses[0].1.is_nan());

    for endpoint in [
        Endpoint::BootCount,
        Endpoint::Temperature,
        Endpoint::TemperatureMax,
        Endpoint::SignalStrength,
    ] {
        rig.control.requests.push_back(ControlRequest::Read(endpoint));
    }
    let report = rig.run(&mut node, 1_000);

    assert_eq!(report.requests, 4);
    assert_eq!(
        &rig.control.responses[1..],
        &[
            (Endpoint::BootCount, 1.0),
            (Endpoint::Temperature, 21.0),
            (Endpoint::TemperatureMax, 21.0),
            (Endpoint::SignalStrength, -72.0),
        ]
    );
}

#[test]
fn control_writes_act_on_rising_edge() {
    let mut rig = Rig::new(20.0, -65.0);
    let mut node = node_with(unsmoothed(), &mut rig);

    rig.run(&mut node, 0);
    rig.temperature.set(24.0);
    rig.run(&mut node, 5_000);

    rig.control
        .requests
        .push_back(ControlRequest::Write(Endpoint::ResetExtremes, 1));
    rig.run(&mut node, 6_000);
    assert_eq!(node.record().min_observed, 24.0);

    rig.temperature.set(18.0);
    rig.run(&mut node, 10_000);
    assert_eq!(node.record().min_observed, 18.0);
    assert_eq!(node.record().max_observed, 24.0);

    // Still high: no new edge
    rig.control
        .requests
        .push_back(ControlRequest::Write(Endpoint::ResetExtremes, 1));
    rig.run(&mut node, 11_000);
    assert_eq!(node.record().max_observed, 24.0);

    rig.control
        .requests
        .push_back(ControlRequest::Write(Endpoint::ResetExtremes, 0));
    rig.control
        .requests
        .push_back(ControlRequest::Write(Endpoint::ResetExtremes, 1));
    rig.run(&mut node, 12_000);
    assert_eq!(node.record().min_observed, 18.0);
    assert_eq!(node.record().max_observed, 18.0);
}

#[test]
fn disconnect_then_probe_reconnects() {
    let mut rig = Rig::new(20.0, -65.0);
    let mut node = node_with(NodeConfig::default(), &mut rig);

    rig.run(&mut node, 0);
    rig.control
        .requests
        .push_back(ControlRequest::Write(Endpoint::Disconnect, 1));
    rig.run(&mut node, 1_000);
    assert_eq!(rig.network.disconnects, 1);
    assert!(!rig.network.up);

    // Probe not due yet
    assert_eq!(rig.run(&mut node, 20_000).reconnect, None);

    let report = rig.run(&mut node, 30_000);
    assert_eq!(report.reconnect, Some(true));
    assert!(rig.network.up);
    assert_eq!(node.record().reconnect_count, 1);
}

#[test]
fn failed_reconnects_are_each_counted() {
    let mut rig = Rig::new(20.0, -65.0);
    rig.network.up = false;
    rig.network.recovers = false;
    let mut node = node_with(NodeConfig::default(), &mut rig);

    for now in [0, 30_000, 60_000] {
        assert_eq!(rig.run(&mut node, now).reconnect, Some(false));
    }
    assert_eq!(rig.network.attempts, 3);
    assert_eq!(node.record().reconnect_count, 3);
}

#[test]
fn trend_drives_indicators() {
    let mut rig = Rig::new(20.0, -65.0);
    let mut node = node_with(unsmoothed(), &mut rig);

    let mut now = 0;
    while now < 60_000 {
        rig.run(&mut node, now);
        now += 5_000;
    }
    assert_eq!(node.trend_rate(), None);
    assert_eq!(rig.control.rising, Some(false));

    rig.temperature.set(21.0);
    rig.run(&mut node, 60_000);

    assert_eq!(node.trend_rate(), Some(1.0));
    assert_eq!(node.direction(), Direction::Rising);
    assert_eq!(rig.control.rising, Some(true));
    assert_eq!(rig.control.falling, Some(false));
}

#[test]
fn sensor_fault_leaves_no_data_sentinel() {
    let mut rig = Rig::new(20.0, -65.0);
    let mut node = node_with(unsmoothed(), &mut rig);

    rig.temperature.fail_once(SensorError::Bus { reason: "crc" });
    rig.run(&mut node, 0);
    assert!(!node.temperature().is_set());
    assert!(!node.record().has_extremes());

    rig.run(&mut node, 5_000);
    assert_eq!(node.temperature().value, 20.0);
    assert_eq!(node.record().min_observed, 20.0);
}

#[test]
fn watchdog_fed_twice_per_iteration() {
    let mut rig = Rig::new(20.0, -65.0);
    let mut node = node_with(NodeConfig::default(), &mut rig);

    for now in 0..10 {
        rig.run(&mut node, now * 100);
    }
    assert_eq!(rig.watchdog.feeds, 20);
}

#[test]
fn retained_record_survives_soft_reset_only() {
    let mut rig = Rig::new(19.0, -65.0);
    let mut node = node_with(unsmoothed(), &mut rig);
    rig.run(&mut node, 0);
    drop(node);

    let mut node = Node::new(unsmoothed()).unwrap();
    node.boot(&mut rig.store, EPOCH + 3_600);
    assert_eq!(node.record().boot_count, 2);
    assert_eq!(node.record().last_run_duration_secs, 3_600);
    assert_eq!(node.record().min_observed, 19.0);

    rig.store.power_loss();
    let mut node = Node::new(unsmoothed()).unwrap();
    node.boot(&mut rig.store, EPOCH + 7_200);
    assert_eq!(node.record().boot_count, 1);
    assert!(!node.record().has_extremes());
    assert_eq!(rig.store.load().unwrap().map(|r| r.boot_count), Some(1));
}

#[test]
fn disabled_channels_are_skipped() {
    let mut config = NodeConfig::default();
    config.debug.enabled = false;
    config.broker.enabled = false;
    let mut rig = Rig::new(20.0, -65.0);
    let mut node = node_with(config, &mut rig);

    let report = rig.run(&mut node, 0);
    assert!(report.measured);
    assert_eq!(report.debug, None);
    assert_eq!(report.broker, None);
    assert!(rig.debug.sent.is_empty());
    assert!(rig.broker.outbound.sent.is_empty());
}
