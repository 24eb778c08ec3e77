//! Burst acquisition from a raw hardware source
//!
//! The acquirer pulls raw samples until its ring buffer is full and reduces
//! them to one trimmed-mean estimate. It has no time budget of its own: the
//! caller only invokes it when the measurement period is due, and a source
//! that hangs is caught by the hardware watchdog.

use crate::buffer::SampleBuffer;
use crate::errors::SensorError;

/// A raw quantity read from hardware
///
/// `nb::Error::WouldBlock` means "no sample yet, poll again" (an ADC still
/// converting, a radio that has not reported RSSI yet).
pub trait SampleSource {
    /// Read one raw sample
    fn read(&mut self) -> nb::Result<f32, SensorError>;
}

impl<S: SampleSource + ?Sized> SampleSource for &mut S {
    fn read(&mut self) -> nb::Result<f32, SensorError> {
        (**self).read()
    }
}

/// Linear conversion from raw counts to engineering units
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Calibration {
    /// Multiplier applied to the raw sample
    pub scale: f32,
    /// Added after scaling
    pub offset: f32,
}

impl Calibration {
    /// Pass raw samples through unchanged
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        offset: 0.0,
    };

    /// TMP36 on a 12-bit, 3.3 V ADC: 10 mV/°C with a 500 mV offset
    pub const TMP36_12BIT_3V3: Self = Self {
        scale: 3300.0 / 4095.0 / 10.0,
        offset: -50.0,
    };

    /// Convert one raw sample
    pub fn apply(&self, raw: f32) -> f32 {
        raw * self.scale + self.offset
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Collects bursts of `N` samples and reduces each to one estimate
#[derive(Clone)]
pub struct SampleAcquirer<const N: usize> {
    buffer: SampleBuffer<N>,
    trim: usize,
    calibration: Calibration,
}

impl<const N: usize> SampleAcquirer<N> {
    /// Create an acquirer dropping `trim` samples from each end of a burst
    ///
    /// `trim` is clamped so at least one sample is always averaged.
    pub fn new(trim: usize, calibration: Calibration) -> Self {
        let max_trim = N.saturating_sub(1) / 2;
        Self {
            buffer: SampleBuffer::new(),
            trim: trim.min(max_trim),
            calibration,
        }
    }

    /// Fill a burst from `source` and return its mid-average
    ///
    /// A bus error aborts the burst and discards the partial samples so the
    /// next burst starts clean.
    pub fn acquire_burst<S: SampleSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<f32, SensorError> {
        self.buffer.clear();

        while !self.buffer.is_full() {
            match source.read() {
                Ok(raw) if raw.is_finite() => self.buffer.push(self.calibration.apply(raw)),
                Ok(_) => {
                    self.buffer.clear();
                    return Err(SensorError::InvalidSample);
                }
                Err(nb::Error::WouldBlock) => continue,
                Err(nb::Error::Other(e)) => {
                    self.buffer.clear();
                    return Err(e);
                }
            }
        }

        let estimate = self
            .buffer
            .mid_average(self.trim)
            .ok_or(SensorError::InvalidSample);
        self.buffer.clear();
        estimate
    }

    /// Samples dropped from each end of a burst
    pub fn trim(&self) -> usize {
        self.trim
    }
}
