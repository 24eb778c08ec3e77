//! Node Control Loop
//!
//! ## Overview
//!
//! [`Node`] owns every piece of long-lived state the firmware has: filter
//! estimates, the trend window, the retained record, both publish
//! schedulers and the per-task period gates. There are no statics; a board
//! crate builds one `Node` and calls [`Node::run_once`] from its main loop.
//!
//! ## One Iteration
//!
//! ```text
//!  feed ─▶ reconnect probe ─▶ control requests ─▶ broker commands
//!    ─▶ measure (burst → smooth → trend → fold → save)
//!    ─▶ feed ─▶ debug scheduler ─▶ graph write ─▶ indicators ─▶ broker scheduler
//! ```
//!
//! Every step past the feeds is gated by its own [`Periodic`], polled
//! against the millisecond clock the caller passes in. Nothing blocks and
//! nothing fails the iteration: errors are logged and the next period is
//! the retry.
//!
//! ## Hardware
//!
//! Collaborators are borrowed for one iteration through [`Peripherals`], so
//! the node itself stays free of transport types and generic parameters.
//! Channels that are absent or disabled in the configuration are skipped.

use crate::acquire::{Calibration, SampleAcquirer, SampleSource};
use crate::channel::{
    BrokerChannel, Channel, ControlChannel, ControlRequest, Endpoint, FieldWriter, Indicator,
};
use crate::command::{Command, ResetTarget};
use crate::config::{GraphField, NodeConfig, BURST_SAMPLES};
use crate::display::DisplayMode;
use crate::errors::ConfigError;
use crate::filter::ExponentialSmoother;
use crate::scheduler::{Invocation, PublishScheduler};
use crate::stats::{PersistentRecord, PersistentStats, RecordStore};
use crate::tables::{info_message, BrokerTable, DebugTable, Snapshot};
use crate::time::{Periodic, Timestamp};
use crate::traits::{Connectivity, Reading, Watchdog};
use crate::trend::{Direction, TrendEstimator};

/// Most control requests or broker commands handled per iteration
pub const MAX_REQUESTS_PER_CYCLE: usize = 8;

/// Hardware and transports borrowed for one iteration
pub struct Peripherals<'a> {
    /// Temperature sensor
    pub temperature: &'a mut dyn SampleSource,
    /// Radio RSSI in dBm
    pub signal: &'a mut dyn SampleSource,
    /// Fed twice per iteration
    pub watchdog: &'a mut dyn Watchdog,
    /// Shared network link
    pub network: &'a mut dyn Connectivity,
    /// Retained record storage
    pub store: &'a mut dyn RecordStore,
    /// Serial debug channel
    pub debug: Option<&'a mut dyn Channel>,
    /// HTTP graph channel
    pub graph: Option<&'a mut dyn FieldWriter>,
    /// Mobile control channel
    pub control: Option<&'a mut dyn ControlChannel>,
    /// Publish/subscribe broker channel
    pub broker: Option<&'a mut dyn BrokerChannel>,
}

/// What one iteration did
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CycleReport {
    /// A measurement was taken
    pub measured: bool,
    /// Outcome of a reconnect attempt, if one was made
    pub reconnect: Option<bool>,
    /// Control requests served
    pub requests: usize,
    /// Broker commands handled
    pub commands: usize,
    /// Debug scheduler run, if due
    pub debug: Option<Invocation>,
    /// Graph write outcome, if due
    pub graph: Option<bool>,
    /// Broker scheduler run, if due
    pub broker: Option<Invocation>,
}

/// Measurement pipeline state
struct Pipeline {
    temperature_acquirer: SampleAcquirer<BURST_SAMPLES>,
    signal_acquirer: SampleAcquirer<BURST_SAMPLES>,
    temperature_filter: ExponentialSmoother,
    signal_filter: ExponentialSmoother,
    trend: TrendEstimator,
    temperature: Reading,
    signal: Reading,
    direction: Direction,
    last_graph_write: Option<bool>,
}

struct Schedule {
    measure: Periodic,
    reconnect: Periodic,
    debug: Periodic,
    graph: Periodic,
    control: Periodic,
    broker: Periodic,
}

fn snapshot<'a>(
    config: &'a NodeConfig,
    pipeline: &'a Pipeline,
    stats: &'a PersistentStats,
    now: Timestamp,
) -> Snapshot<'a> {
    Snapshot {
        now,
        temperature: pipeline.temperature,
        signal: pipeline.signal,
        trend: pipeline.trend.rate(),
        direction: pipeline.direction,
        temperature_status: config.temperature_ladder.label_for(pipeline.temperature.value),
        signal_status: config.signal_ladder.label_for(pipeline.signal.value),
        record: stats.record(),
        last_graph_write: pipeline.last_graph_write,
    }
}

fn persist(stats: &PersistentStats, store: &mut dyn RecordStore) {
    if let Err(e) = store.save(stats.record()) {
        log_warn!("Saving retained record failed: {}", e);
    }
}

/// Index into the level memory of a writable endpoint
fn write_slot(endpoint: Endpoint) -> Option<usize> {
    match endpoint {
        Endpoint::ResetExtremes => Some(0),
        Endpoint::ResetCounters => Some(1),
        Endpoint::Disconnect => Some(2),
        _ => None,
    }
}

/// The sensor node
pub struct Node {
    config: NodeConfig,
    pipeline: Pipeline,
    stats: PersistentStats,
    schedule: Schedule,
    debug: PublishScheduler,
    broker: PublishScheduler,
    write_levels: [i32; 3],
    display: DisplayMode,
}

impl Node {
    /// Validate `config` and build a node with fresh pipeline state
    ///
    /// The retained record starts fresh; call [`boot`](Self::boot) to load
    /// it from the store.
    pub fn new(config: NodeConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let measurement = &config.measurement;
        let pipeline = Pipeline {
            temperature_acquirer: SampleAcquirer::new(
                measurement.burst_trim,
                measurement.calibration,
            ),
            signal_acquirer: SampleAcquirer::new(measurement.burst_trim, Calibration::IDENTITY),
            temperature_filter: ExponentialSmoother::new(measurement.temperature_factor)?,
            signal_filter: ExponentialSmoother::new(measurement.signal_factor)?,
            trend: TrendEstimator::new(measurement.trend_window_ms),
            temperature: Reading::UNSET,
            signal: Reading::UNSET,
            direction: Direction::Steady,
            last_graph_write: None,
        };

        let schedule = Schedule {
            measure: Periodic::new(measurement.period()),
            reconnect: Periodic::new(config.reconnect_probe()),
            debug: Periodic::new(config.debug.period()),
            graph: Periodic::new(config.graph.period()),
            control: Periodic::new(config.control.period()),
            broker: Periodic::new(config.broker.period()),
        };

        Ok(Self {
            debug: PublishScheduler::new(config.debug.quota),
            broker: PublishScheduler::new(config.broker.quota),
            pipeline,
            stats: PersistentStats::new(PersistentRecord::fresh()),
            schedule,
            write_levels: [0; 3],
            display: DisplayMode::default(),
            config,
        })
    }

    /// Load the retained record and account for this process start
    ///
    /// `epoch_secs` is wall-clock time, 0 when it is not known yet.
    pub fn boot(&mut self, store: &mut dyn RecordStore, epoch_secs: u64) {
        self.stats = PersistentStats::load(&mut *store);
        self.stats.record_boot(epoch_secs);
        persist(&self.stats, store);

        let record = self.stats.record();
        log_info!(
            "Boot #{}, previous run {}s, {} reconnects",
            record.boot_count,
            record.last_run_duration_secs,
            record.reconnect_count
        );
    }

    /// Run one loop iteration at monotonic time `now`
    pub fn run_once(&mut self, now: Timestamp, hw: &mut Peripherals<'_>) -> CycleReport {
        let mut report = CycleReport::default();
        hw.watchdog.feed();

        if self.schedule.reconnect.due(now) {
            report.reconnect = self.probe_connection(hw.network, hw.store);
        }

        if let Some(control) = hw.control.as_deref_mut() {
            if self.config.control.enabled {
                report.requests = self.serve_control(control, hw.network, hw.store);
            }
        }

        if let Some(broker) = hw.broker.as_deref_mut() {
            if self.config.broker.enabled {
                report.commands = self.serve_commands(now, broker, hw.store);
            }
        }

        if self.schedule.measure.due(now) {
            self.measure(now, hw);
            report.measured = true;
        }

        hw.watchdog.feed();

        if let Some(debug) = hw.debug.as_deref_mut() {
            if self.config.debug.enabled && self.schedule.debug.due(now) {
                let snapshot = snapshot(&self.config, &self.pipeline, &self.stats, now);
                let table = DebugTable::new(&self.config, &snapshot);
                report.debug = Some(self.debug.invoke(&table, debug));
            }
        }

        if let Some(graph) = hw.graph.as_deref_mut() {
            if self.config.graph.enabled && self.schedule.graph.due(now) {
                let ok = self.write_graph(graph);
                self.pipeline.last_graph_write = Some(ok);
                report.graph = Some(ok);
            }
        }

        if let Some(control) = hw.control.as_deref_mut() {
            if self.config.control.enabled && self.schedule.control.due(now) {
                self.refresh_indicators(control);
            }
        }

        if let Some(broker) = hw.broker.as_deref_mut() {
            if self.config.broker.enabled && self.schedule.broker.due(now) {
                let snapshot = snapshot(&self.config, &self.pipeline, &self.stats, now);
                let table = BrokerTable::new(&self.config, &snapshot);
                report.broker = Some(self.broker.invoke(&table, broker));
            }
        }

        report
    }

    fn probe_connection(
        &mut self,
        network: &mut dyn Connectivity,
        store: &mut dyn RecordStore,
    ) -> Option<bool> {
        if network.is_connected() {
            return None;
        }

        let up = network.reconnect();
        self.stats.record_reconnect();
        persist(&self.stats, store);

        if up {
            log_info!(
                "Reconnected (attempt {})",
                self.stats.record().reconnect_count
            );
        } else {
            log_warn!("Reconnect attempt failed");
        }
        Some(up)
    }

    fn measure(&mut self, now: Timestamp, hw: &mut Peripherals<'_>) {
        let pipeline = &mut self.pipeline;

        pipeline.temperature = match pipeline
            .temperature_acquirer
            .acquire_burst(&mut *hw.temperature)
        {
            Ok(raw) => Reading::new(pipeline.temperature_filter.update(raw), now),
            Err(e) => {
                log_warn!("Temperature burst failed: {}", e);
                Reading::new(f32::NAN, now)
            }
        };

        pipeline.signal = match pipeline.signal_acquirer.acquire_burst(&mut *hw.signal) {
            Ok(raw) => Reading::new(pipeline.signal_filter.update(raw), now),
            Err(e) => {
                log_warn!("Signal burst failed: {}", e);
                Reading::new(f32::NAN, now)
            }
        };

        if let Some(rate) = pipeline.trend.tick(pipeline.temperature.value, now) {
            pipeline.direction = Direction::of(rate, self.config.measurement.trend_deadband);
            log_debug!("Temperature trend {} per minute", rate);
        }

        if self.stats.fold(&pipeline.temperature) {
            persist(&self.stats, hw.store);
        }
    }

    fn write_graph(&self, graph: &mut dyn FieldWriter) -> bool {
        for (slot, field) in self.config.graph.fields.iter().enumerate() {
            let value = match field {
                GraphField::SignalStrength => self.pipeline.signal.value,
                GraphField::Temperature => self.pipeline.temperature.value,
                GraphField::TemperatureDelta => self.pipeline.trend.rate().unwrap_or(f32::NAN),
            };
            if value.is_finite() {
                graph.set_field(slot as u8 + 1, value);
            }
        }

        match graph.commit() {
            Ok(()) => true,
            Err(e) => {
                log_warn!("Graph write failed: {}", e);
                false
            }
        }
    }

    fn serve_control(
        &mut self,
        control: &mut dyn ControlChannel,
        network: &mut dyn Connectivity,
        store: &mut dyn RecordStore,
    ) -> usize {
        let mut served = 0;
        while served < MAX_REQUESTS_PER_CYCLE {
            let Some(request) = control.poll_request() else {
                break;
            };
            served += 1;

            match request {
                ControlRequest::Read(endpoint) => {
                    if let Err(e) = control.respond(endpoint, self.endpoint_value(endpoint)) {
                        log_warn!("Control response on pin {} failed: {}", endpoint.pin(), e);
                    }
                }
                ControlRequest::Write(endpoint, level) => {
                    let Some(slot) = write_slot(endpoint) else {
                        log_warn!("Write to read-only pin {} ignored", endpoint.pin());
                        continue;
                    };
                    let rising = level > 0 && self.write_levels[slot] <= 0;
                    self.write_levels[slot] = level;
                    if rising {
                        self.trigger(endpoint, network, store);
                    }
                }
            }
        }
        served
    }

    fn trigger(
        &mut self,
        endpoint: Endpoint,
        network: &mut dyn Connectivity,
        store: &mut dyn RecordStore,
    ) {
        match endpoint {
            Endpoint::ResetExtremes => self.reset(ResetTarget::Extremes, store),
            Endpoint::ResetCounters => self.reset(ResetTarget::Counters, store),
            Endpoint::Disconnect => {
                log_info!("Disconnect requested");
                network.disconnect();
            }
            _ => {}
        }
    }

    fn reset(&mut self, target: ResetTarget, store: &mut dyn RecordStore) {
        let changed = match target {
            ResetTarget::Extremes => {
                log_info!("Resetting extremes");
                self.stats.reset_extremes(self.pipeline.temperature.value)
            }
            ResetTarget::Counters => {
                log_info!("Resetting boot counters");
                self.stats.reset_boot_counters()
            }
        };
        if changed {
            persist(&self.stats, store);
        }
    }

    fn endpoint_value(&self, endpoint: Endpoint) -> f32 {
        let record = self.stats.record();
        let extreme = |value: f32| {
            if record.has_extremes() {
                value
            } else {
                f32::NAN
            }
        };

        match endpoint {
            Endpoint::BootCount => record.boot_count as f32,
            Endpoint::Reconnects => record.reconnect_count as f32,
            Endpoint::Temperature => self.pipeline.temperature.value,
            Endpoint::TemperatureMin => extreme(record.min_observed),
            Endpoint::TemperatureMax => extreme(record.max_observed),
            Endpoint::SignalStrength => self.pipeline.signal.value,
            writable => write_slot(writable)
                .map(|slot| self.write_levels[slot] as f32)
                .unwrap_or(0.0),
        }
    }

    fn serve_commands(
        &mut self,
        now: Timestamp,
        broker: &mut dyn BrokerChannel,
        store: &mut dyn RecordStore,
    ) -> usize {
        let mut handled = 0;
        while handled < MAX_REQUESTS_PER_CYCLE {
            let Some(inbound) = broker.poll_inbound() else {
                break;
            };
            handled += 1;

            let command = match Command::parse(
                &self.config.broker.topic_prefix,
                &inbound.topic,
                &inbound.payload,
            ) {
                Ok(command) => command,
                Err(e) => {
                    log_warn!("Ignoring message on {}: {}", inbound.topic.as_str(), e);
                    continue;
                }
            };

            match command {
                Command::Reset(target) => self.reset(target, store),
                Command::GetInfo => {
                    let snapshot = snapshot(&self.config, &self.pipeline, &self.stats, now);
                    let info = info_message(&self.config, &snapshot);
                    if let Err(e) = broker.send(&info.key, &info.payload) {
                        log_warn!("Info reply failed: {}", e);
                    }
                }
            }
        }
        handled
    }

    fn refresh_indicators(&self, control: &mut dyn ControlChannel) {
        let direction = self.pipeline.direction;
        for (indicator, on) in [
            (Indicator::Rising, direction == Direction::Rising),
            (Indicator::Falling, direction == Direction::Falling),
        ] {
            if let Err(e) = control.set_indicator(indicator, on) {
                log_warn!("Indicator update failed: {}", e);
            }
        }
    }

    /// Consistent view of current state for rendering
    pub fn snapshot(&self, now: Timestamp) -> Snapshot<'_> {
        snapshot(&self.config, &self.pipeline, &self.stats, now)
    }

    /// Local display button: move to the next mode
    pub fn press_button(&mut self) -> DisplayMode {
        self.display = self.display.next();
        self.display
    }

    /// Mode the display is in
    pub fn display_mode(&self) -> DisplayMode {
        self.display
    }

    /// Validated configuration
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Retained record
    pub fn record(&self) -> &PersistentRecord {
        self.stats.record()
    }

    /// Smoothed temperature
    pub fn temperature(&self) -> Reading {
        self.pipeline.temperature
    }

    /// Smoothed RSSI
    pub fn signal(&self) -> Reading {
        self.pipeline.signal
    }

    /// Direction of the latest trend rate
    pub fn direction(&self) -> Direction {
        self.pipeline.direction
    }

    /// Latest trend rate per minute
    pub fn trend_rate(&self) -> Option<f32> {
        self.pipeline.trend.rate()
    }

    /// Outcome of the latest graph write
    pub fn last_graph_write(&self) -> Option<bool> {
        self.pipeline.last_graph_write
    }

    /// Debug channel scheduler
    pub fn debug_scheduler(&self) -> &PublishScheduler {
        &self.debug
    }

    /// Broker channel scheduler
    pub fn broker_scheduler(&self) -> &PublishScheduler {
        &self.broker
    }
}
