//! Local status display
//!
//! A button on the device cycles what the local display shows. The mode is
//! a small state machine advanced once per press and wrapping at the end.

use core::fmt;

use crate::tables::Snapshot;

/// What the local display shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    /// Current temperature and its status
    #[default]
    Temperature,
    /// Retained minimum and maximum
    Extremes,
    /// RSSI and its status
    Signal,
    /// Time since boot and boot count
    Uptime,
}

impl DisplayMode {
    /// Mode shown after the next button press
    pub fn next(self) -> Self {
        match self {
            DisplayMode::Temperature => DisplayMode::Extremes,
            DisplayMode::Extremes => DisplayMode::Signal,
            DisplayMode::Signal => DisplayMode::Uptime,
            DisplayMode::Uptime => DisplayMode::Temperature,
        }
    }

    /// Text for this mode, at most a couple of short lines
    pub fn render<'a>(self, snapshot: &'a Snapshot<'a>) -> DisplayText<'a> {
        DisplayText {
            mode: self,
            snapshot,
        }
    }
}

/// Lazily formatted display contents
pub struct DisplayText<'a> {
    mode: DisplayMode,
    snapshot: &'a Snapshot<'a>,
}

impl fmt::Display for DisplayText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snap = self.snapshot;
        match self.mode {
            DisplayMode::Temperature if snap.temperature.is_set() => write!(
                f,
                "{:.1} C\n{}",
                snap.temperature.value, snap.temperature_status
            ),
            DisplayMode::Temperature => f.write_str("-- C\nwaiting"),
            DisplayMode::Extremes if snap.record.has_extremes() => write!(
                f,
                "lo {:.1}\nhi {:.1}",
                snap.record.min_observed, snap.record.max_observed
            ),
            DisplayMode::Extremes => f.write_str("lo --\nhi --"),
            DisplayMode::Signal if snap.signal.is_set() => {
                write!(f, "{:.0} dBm\n{}", snap.signal.value, snap.signal_status)
            }
            DisplayMode::Signal => f.write_str("-- dBm\nno radio"),
            DisplayMode::Uptime => {
                let secs = snap.now / 1000;
                write!(
                    f,
                    "up {}:{:02}:{:02}\nboot #{}",
                    secs / 3600,
                    (secs / 60) % 60,
                    secs % 60,
                    snap.record.boot_count
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::PersistentRecord;
    use crate::traits::Reading;
    use crate::trend::Direction;

    fn snapshot(record: &PersistentRecord) -> Snapshot<'_> {
        Snapshot {
            now: 3_723_000,
            temperature: Reading::new(19.04, 0),
            signal: Reading::UNSET,
            trend: None,
            direction: Direction::Steady,
            temperature_status: "cold",
            signal_status: "unknown",
            record,
            last_graph_write: None,
        }
    }

    #[test]
    fn cycles_through_all_modes() {
        let mut mode = DisplayMode::default();
        for _ in 0..4 {
            mode = mode.next();
        }
        assert_eq!(mode, DisplayMode::Temperature);
        assert_eq!(DisplayMode::Signal.next(), DisplayMode::Uptime);
    }

    #[test]
    fn renders_each_mode() {
        let mut record = PersistentRecord::fresh();
        record.boot_count = 7;
        let snap = snapshot(&record);

        assert_eq!(DisplayMode::Temperature.render(&snap).to_string(), "19.0 C\ncold");
        assert_eq!(DisplayMode::Extremes.render(&snap).to_string(), "lo --\nhi --");
        assert_eq!(DisplayMode::Signal.render(&snap).to_string(), "-- dBm\nno radio");
        assert_eq!(DisplayMode::Uptime.render(&snap).to_string(), "up 1:02:03\nboot #7");
    }
}
