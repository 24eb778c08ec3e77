//! Retained statistics
//!
//! A small record that lives in battery-backed or retained RAM (or a flash
//! page, or a file on a host build) and survives soft and watchdog resets:
//! boot counters, reconnect counter, and the lowest and highest temperature
//! seen. Only a power loss or an explicit operator command clears it.
//!
//! The storage medium is a collaborator behind [`RecordStore`]. The node
//! loads once at start and saves whenever a mutation reports a change.

use crate::errors::StorageError;
use crate::traits::Reading;

/// Bumped whenever the record layout changes; a stored record with another
/// version is discarded on load.
pub const RECORD_LAYOUT_VERSION: u16 = 1;

/// Minimum before the first fold; above any real reading
pub const SENTINEL_MIN: f32 = 9999.0;

/// Maximum before the first fold; below any real reading
pub const SENTINEL_MAX: f32 = -9999.0;

/// Contents of the retained region
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PersistentRecord {
    /// Layout the record was written with
    pub layout_version: u16,
    /// Process starts since the last counter reset
    pub boot_count: u32,
    /// Epoch seconds of the latest boot
    pub last_boot_time: u64,
    /// Seconds between the previous boot and this one
    pub last_run_duration_secs: i64,
    /// Reconnect attempts since the last counter reset
    pub reconnect_count: u32,
    /// Lowest reading, or the sentinel
    pub min_observed: f32,
    /// Highest reading, or the sentinel
    pub max_observed: f32,
}

impl PersistentRecord {
    /// Record as found after the first ever power-up
    pub const fn fresh() -> Self {
        Self {
            layout_version: RECORD_LAYOUT_VERSION,
            boot_count: 0,
            last_boot_time: 0,
            last_run_duration_secs: 0,
            reconnect_count: 0,
            min_observed: SENTINEL_MIN,
            max_observed: SENTINEL_MAX,
        }
    }

    /// True once at least one reading has been folded in
    pub fn has_extremes(&self) -> bool {
        self.min_observed <= self.max_observed
    }
}

impl Default for PersistentRecord {
    fn default() -> Self {
        Self::fresh()
    }
}

/// Load/save contract for the retained region
pub trait RecordStore {
    /// `Ok(None)` when nothing has ever been stored
    fn load(&mut self) -> Result<Option<PersistentRecord>, StorageError>;

    /// Write the whole record
    fn save(&mut self, record: &PersistentRecord) -> Result<(), StorageError>;
}

/// In-memory store standing in for a retained RAM section
///
/// Survives anything that does not drop the value, which is the same
/// lifetime a retained region has across a soft reset.
#[derive(Debug, Clone, Default)]
pub struct RetainedStore {
    slot: Option<PersistentRecord>,
    saves: u32,
}

impl RetainedStore {
    /// Empty region, as after power loss
    pub const fn new() -> Self {
        Self {
            slot: None,
            saves: 0,
        }
    }

    /// Number of successful saves, for wear accounting
    pub fn saves(&self) -> u32 {
        self.saves
    }

    /// Simulate a power loss
    pub fn power_loss(&mut self) {
        self.slot = None;
    }
}

impl RecordStore for RetainedStore {
    fn load(&mut self) -> Result<Option<PersistentRecord>, StorageError> {
        Ok(self.slot)
    }

    fn save(&mut self, record: &PersistentRecord) -> Result<(), StorageError> {
        self.slot = Some(*record);
        self.saves += 1;
        Ok(())
    }
}

/// Mutation rules over a [`PersistentRecord`]
///
/// Every mutator returns `true` when the record changed so the owner knows
/// to save it.
#[derive(Debug, Clone, Copy)]
pub struct PersistentStats {
    record: PersistentRecord,
}

impl PersistentStats {
    /// Wrap an already loaded record
    pub const fn new(record: PersistentRecord) -> Self {
        Self { record }
    }

    /// Load from `store`, falling back to a fresh record
    ///
    /// A missing, corrupt, or differently laid out record all start fresh.
    pub fn load<S: RecordStore + ?Sized>(store: &mut S) -> Self {
        let record = match store.load() {
            Ok(Some(record)) if record.layout_version == RECORD_LAYOUT_VERSION => record,
            Ok(Some(record)) => {
                log_warn!(
                    "Retained record layout {} != {}, starting fresh",
                    record.layout_version,
                    RECORD_LAYOUT_VERSION
                );
                PersistentRecord::fresh()
            }
            Ok(None) => {
                log_info!("No retained record, first power-up");
                PersistentRecord::fresh()
            }
            Err(e) => {
                log_warn!("Retained record unreadable: {}", e);
                PersistentRecord::fresh()
            }
        };
        Self { record }
    }

    /// Current record
    pub fn record(&self) -> &PersistentRecord {
        &self.record
    }

    /// Fold a reading into the extrema; NaN readings are skipped
    pub fn fold(&mut self, reading: &Reading) -> bool {
        let value = reading.value;
        if value.is_nan() {
            return false;
        }

        let before = (self.record.min_observed, self.record.max_observed);
        self.record.min_observed = self.record.min_observed.min(value);
        self.record.max_observed = self.record.max_observed.max(value);
        before != (self.record.min_observed, self.record.max_observed)
    }

    /// Operator reset: both extrema collapse onto the current value
    ///
    /// With no current value (NaN) the sentinels are restored instead.
    pub fn reset_extremes(&mut self, current: f32) -> bool {
        let (min, max) = if current.is_nan() {
            (SENTINEL_MIN, SENTINEL_MAX)
        } else {
            (current, current)
        };
        self.record.min_observed = min;
        self.record.max_observed = max;
        true
    }

    /// Operator reset of boot, run and reconnect counters; extrema stay
    pub fn reset_boot_counters(&mut self) -> bool {
        self.record.boot_count = 0;
        self.record.last_boot_time = 0;
        self.record.last_run_duration_secs = 0;
        self.record.reconnect_count = 0;
        true
    }

    /// Account for a process start at epoch second `now`
    ///
    /// An epoch of 0 means the clock was not synced; a run bounded by an
    /// unsynced boot has no known duration and records 0.
    pub fn record_boot(&mut self, now: u64) -> bool {
        if self.record.boot_count > 0 {
            self.record.last_run_duration_secs = if now == 0 || self.record.last_boot_time == 0 {
                0
            } else {
                (now as i64 - self.record.last_boot_time as i64).max(0)
            };
        }
        self.record.boot_count = self.record.boot_count.saturating_add(1);
        self.record.last_boot_time = now;
        true
    }

    /// Count one reconnect attempt
    pub fn record_reconnect(&mut self) -> bool {
        self.record.reconnect_count = self.record.reconnect_count.saturating_add(1);
        true
    }
}
