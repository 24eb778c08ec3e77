//! Publish path benchmarks
//!
//! Measures the per-iteration cost the watchdog budget has to cover:
//! - One scheduler invocation over synthetic tables of several sizes
//! - Rendering and sending a full debug rotation from a real snapshot
//! - Burst acquisition and smoothing

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use thermolink_core::{
    acquire::SampleAcquirer,
    config::BURST_SAMPLES,
    tables::{DebugTable, Snapshot},
    Calibration, Channel, ChannelError, Direction, ExponentialSmoother, Message, MessageTable,
    NodeConfig, PersistentRecord, Phase, PublishScheduler, Reading, SampleSource, SensorError,
};

struct Synthetic {
    steady: usize,
}

impl MessageTable for Synthetic {
    fn len(&self, phase: Phase) -> usize {
        match phase {
            Phase::Boot => 3,
            Phase::Steady => self.steady,
        }
    }

    fn render(&self, phase: Phase, index: usize) -> Message {
        Message::new(phase.as_str(), format_args!("value {} = {:.2}", index, index as f32 * 0.5))
    }
}

/// Accepts everything and keeps a byte count so sends are not optimised out
struct Discard(usize);

impl Channel for Discard {
    fn send(&mut self, key: &str, payload: &str) -> Result<(), ChannelError> {
        self.0 += key.len() + payload.len();
        Ok(())
    }
}

struct Sawtooth(u32);

impl SampleSource for Sawtooth {
    fn read(&mut self) -> nb::Result<f32, SensorError> {
        self.0 = self.0.wrapping_add(1);
        Ok(20.0 + (self.0 % 7) as f32 * 0.1)
    }
}

fn bench_invoke(c: &mut Criterion) {
    let mut group = c.benchmark_group("invoke");
    for steady in [3usize, 8, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(steady), &steady, |b, &steady| {
            let table = Synthetic { steady };
            let mut scheduler = PublishScheduler::new(4);
            let mut sink = Discard(0);
            b.iter(|| black_box(scheduler.invoke(&table, &mut sink)));
        });
    }
    group.finish();
}

fn bench_debug_rotation(c: &mut Criterion) {
    let config = NodeConfig::default();
    let mut record = PersistentRecord::fresh();
    record.boot_count = 12;
    record.min_observed = 17.5;
    record.max_observed = 26.25;
    let snapshot = Snapshot {
        now: 3_600_000,
        temperature: Reading::new(21.4, 3_600_000),
        signal: Reading::new(-67.0, 3_600_000),
        trend: Some(0.12),
        direction: Direction::Rising,
        temperature_status: "comfortable",
        signal_status: "good",
        record: &record,
        last_graph_write: Some(true),
    };

    c.bench_function("debug_rotation", |b| {
        let table = DebugTable::new(&config, &snapshot);
        let mut scheduler = PublishScheduler::new(config.debug.quota);
        let mut sink = Discard(0);
        b.iter(|| black_box(scheduler.invoke(&table, &mut sink)));
    });
}

fn bench_acquire(c: &mut Criterion) {
    c.bench_function("acquire_and_smooth", |b| {
        let mut acquirer = SampleAcquirer::<BURST_SAMPLES>::new(2, Calibration::IDENTITY);
        let mut smoother = ExponentialSmoother::new(0.2).unwrap();
        let mut source = Sawtooth(0);
        b.iter(|| {
            let raw = acquirer.acquire_burst(&mut source).unwrap_or(f32::NAN);
            black_box(smoother.update(raw))
        });
    });
}

criterion_group!(benches, bench_invoke, bench_debug_rotation, bench_acquire);
criterion_main!(benches);
