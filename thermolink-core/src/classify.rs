//! Status ladders
//!
//! A ladder is a strictly increasing list of thresholds with one more label
//! than thresholds. Label 0 covers everything below the first threshold and
//! reads as "unknown"; a value at or above threshold `i` (and below `i + 1`)
//! gets status `i + 1`.
//!
//! ```text
//! thresholds:        10.0      18.0      26.0
//!   ──── unknown ────┼── cold ──┼── ok ───┼── hot ────▶
//! status:      0         1          2         3
//! ```

use heapless::{String, Vec};

use crate::channel::push_truncated;
use crate::errors::ConfigError;

/// Most thresholds a ladder can hold
pub const MAX_RUNGS: usize = 8;

/// Longest status label in bytes
pub const LABEL_LEN: usize = 16;

/// Status label text
pub type Label = String<LABEL_LEN>;

/// Validated threshold ladder
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusLadder {
    thresholds: Vec<f32, MAX_RUNGS>,
    labels: Vec<Label, { MAX_RUNGS + 1 }>,
}

impl StatusLadder {
    /// Build a ladder, checking ordering and label count
    pub fn new(thresholds: &[f32], labels: &[&str]) -> Result<Self, ConfigError> {
        if thresholds.len() > MAX_RUNGS || labels.len() != thresholds.len() + 1 {
            return Err(ConfigError::LadderLabelCount {
                thresholds: thresholds.len(),
                labels: labels.len(),
            });
        }

        let mut ladder = Self {
            thresholds: Vec::new(),
            labels: Vec::new(),
        };
        // Capacity was checked above
        let _ = ladder.thresholds.extend_from_slice(thresholds);
        for label in labels {
            let mut text = Label::new();
            push_truncated(&mut text, label);
            let _ = ladder.labels.push(text);
        }

        ladder.validate()?;
        Ok(ladder)
    }

    /// Check invariants; used after deserialization too
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.labels.len() != self.thresholds.len() + 1 {
            return Err(ConfigError::LadderLabelCount {
                thresholds: self.thresholds.len(),
                labels: self.labels.len(),
            });
        }

        for (index, t) in self.thresholds.iter().enumerate() {
            if !t.is_finite() {
                return Err(ConfigError::LadderNotFinite { index });
            }
            if index > 0 && *t <= self.thresholds[index - 1] {
                return Err(ConfigError::LadderNotIncreasing { index });
            }
        }

        Ok(())
    }

    /// Map a value to its status index
    pub fn classify(&self, value: f32) -> usize {
        classify(value, &self.thresholds)
    }

    /// Label for a status index; out-of-range indices read as the lowest label
    pub fn label(&self, status: usize) -> &str {
        self.labels
            .get(status)
            .or_else(|| self.labels.first())
            .map(|l| l.as_str())
            .unwrap_or("")
    }

    /// Classify and return the label in one step
    pub fn label_for(&self, value: f32) -> &str {
        self.label(self.classify(value))
    }

    /// Ascending thresholds
    pub fn thresholds(&self) -> &[f32] {
        &self.thresholds
    }

    /// Number of labels, one more than the thresholds
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Always `false` for a validated ladder
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Default ladder for ambient temperature in °C
    pub fn temperature() -> Self {
        Self::new(
            &[-10.0, 10.0, 18.0, 26.0, 35.0],
            &["unknown", "freezing", "cold", "comfortable", "warm", "hot"],
        )
        .unwrap_or_else(|_| Self::empty())
    }

    /// Default ladder for radio signal strength in dBm
    pub fn signal() -> Self {
        Self::new(
            &[-90.0, -80.0, -70.0, -60.0],
            &["unknown", "poor", "fair", "good", "excellent"],
        )
        .unwrap_or_else(|_| Self::empty())
    }

    fn empty() -> Self {
        let mut labels = Vec::new();
        let _ = labels.push(Label::new());
        Self {
            thresholds: Vec::new(),
            labels,
        }
    }
}

/// Linear scan keeping the last rung whose threshold is `<= value`
///
/// NaN compares false against every threshold and so maps to 0.
pub fn classify(value: f32, thresholds: &[f32]) -> usize {
    let mut status = 0;
    for (i, threshold) in thresholds.iter().enumerate() {
        if value >= *threshold {
            status = i + 1;
        } else {
            break;
        }
    }
    status
}

/// Signal quality in percent from RSSI in dBm
///
/// -100 dBm and below is 0 %, -50 dBm and above is 100 %.
pub fn signal_quality(rssi_dbm: f32) -> u8 {
    if !rssi_dbm.is_finite() {
        return 0;
    }
    let quality = 2.0 * (rssi_dbm + 100.0);
    libm::roundf(quality.clamp(0.0, 100.0)) as u8
}
