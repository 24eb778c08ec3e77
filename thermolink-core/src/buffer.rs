//! Fixed-Size Ring Buffer for Burst Sampling
//!
//! ## Overview
//!
//! A burst is a run of consecutive raw samples that gets reduced to one
//! estimate. The buffer holding it has a capacity fixed at compile time
//! through const generics, so a burst never allocates.
//!
//! ## Why a Ring Buffer?
//!
//! Analog front ends produce occasional outliers (ADC glitches, switching
//! noise from the radio). Keeping the last N samples and reducing them with a
//! trimmed mean rejects those outliers without a sort over unbounded history:
//! - O(1) insertion (overwrites oldest when full)
//! - O(N log N) reduction over a copy of at most N samples
//! - Zero heap allocations
//!
//! ## Readiness
//!
//! The buffer is "ready" once it is full. The acquirer keeps pulling samples
//! until then, reduces, and clears for the next burst.
//!
//! ```text
//! SampleBuffer<5>, trim = 1
//! ┌──────┬──────┬──────┬──────┬──────┐
//! │ 21.9 │ 22.1 │ 35.0 │ 22.0 │ 21.8 │   ← 35.0 is a glitch
//! └──────┴──────┴──────┴──────┴──────┘
//! sorted:  21.8 | 21.9 22.0 22.1 | 35.0
//!          drop   └── average ──┘  drop     → 22.0
//! ```
//!
//! ## Usage Example
//!
//! ```rust
//! use thermolink_core::buffer::SampleBuffer;
//!
//! let mut burst: SampleBuffer<5> = SampleBuffer::new();
//! for v in [21.9, 22.1, 35.0, 22.0, 21.8] {
//!     burst.push(v);
//! }
//! assert!(burst.is_full());
//! let estimate = burst.mid_average(1).unwrap();
//! assert!((estimate - 22.0).abs() < 1e-4);
//! ```

use heapless::Vec;

/// Fixed-size ring buffer of raw samples
///
/// ## Internal Invariants
///
/// - `write_pos < N`
/// - `len <= N`
/// - Iteration yields samples oldest first
#[derive(Clone)]
pub struct SampleBuffer<const N: usize> {
    data: [f32; N],

    /// Index where the next write will occur
    write_pos: usize,

    /// Current number of valid samples
    len: usize,
}

impl<const N: usize> SampleBuffer<N> {
    /// Creates a new empty buffer
    pub const fn new() -> Self {
        Self {
            data: [0.0; N],
            write_pos: 0,
            len: 0,
        }
    }

    /// Adds a sample, overwriting the oldest when full
    pub fn push(&mut self, sample: f32) {
        self.data[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % N;

        if self.len < N {
            self.len += 1;
        }
    }

    /// Get number of stored samples
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if buffer is full, i.e. the burst is ready to reduce
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Capacity fixed at compile time
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Get the most recent sample
    pub fn last(&self) -> Option<f32> {
        if self.is_empty() {
            return None;
        }

        let idx = if self.write_pos == 0 { N - 1 } else { self.write_pos - 1 };
        Some(self.data[idx])
    }

    /// Iterate over samples from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        let start = if self.len < N { 0 } else { self.write_pos };
        (0..self.len).map(move |i| self.data[(start + i) % N])
    }

    /// Clear all samples
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }

    /// Trimmed mean of the stored samples
    ///
    /// Drops the `trim` lowest and `trim` highest samples and averages the
    /// rest. Returns `None` when nothing would remain.
    pub fn mid_average(&self, trim: usize) -> Option<f32> {
        if self.len <= trim * 2 {
            return None;
        }

        let mut sorted: Vec<f32, N> = self.iter().collect();
        sorted.sort_unstable_by(|a, b| a.total_cmp(b));

        let kept = &sorted[trim..self.len - trim];
        let sum: f32 = kept.iter().sum();
        Some(sum / kept.len() as f32)
    }
}

impl<const N: usize> Default for SampleBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
