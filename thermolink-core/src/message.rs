//! Messages and message tables
//!
//! A channel's outbound traffic is described by two ordered tables, one per
//! [`Phase`]. The scheduler only ever asks for "message `i` of phase `p`";
//! the table renders it on demand from current state, so a retried message
//! always carries fresh values.

use core::fmt;

use heapless::String;

use crate::channel::{push_truncated, TOPIC_LEN};

/// Longest rendered payload
pub const PAYLOAD_LEN: usize = 160;

/// Scheduler phase a table entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// One-shot messages sent once per process start
    Boot,
    /// Messages rotated forever
    Steady,
}

impl Phase {
    /// Lowercase name for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Boot => "boot",
            Phase::Steady => "steady",
        }
    }
}

/// One rendered outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Channel key or topic
    pub key: String<TOPIC_LEN>,
    /// Rendered payload
    pub payload: String<PAYLOAD_LEN>,
    /// Set when key or payload did not fit and was cut
    pub truncated: bool,
}

impl Message {
    /// Render `key` and a formatted payload, truncating to capacity
    pub fn new(key: &str, payload: fmt::Arguments<'_>) -> Self {
        let mut message = Self {
            key: String::new(),
            payload: String::new(),
            truncated: false,
        };
        message.truncated = !push_truncated(&mut message.key, key);
        if fmt::Write::write_fmt(&mut message.payload, payload).is_err() {
            message.truncated = true;
        }
        message
    }

    /// Render a key built from a prefix and a suffix
    pub fn with_prefix(prefix: &str, suffix: &str, payload: fmt::Arguments<'_>) -> Self {
        let mut message = Self::new(prefix, payload);
        if !push_truncated(&mut message.key, suffix) {
            message.truncated = true;
        }
        message
    }
}

/// Ordered message tables of one channel
pub trait MessageTable {
    /// Number of entries in `phase`
    fn len(&self, phase: Phase) -> usize;

    /// Render entry `index` of `phase`; `index < self.len(phase)`
    fn render(&self, phase: Phase, index: usize) -> Message;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_payload() {
        let message = Message::new("temperature", format_args!("{:.1}", 21.26f32));
        assert_eq!(message.key.as_str(), "temperature");
        assert_eq!(message.payload.as_str(), "21.3");
        assert!(!message.truncated);
    }

    #[test]
    fn prefixed_key() {
        let message = Message::with_prefix("home/node1/", "signal", format_args!("{}", -61));
        assert_eq!(message.key.as_str(), "home/node1/signal");
        assert_eq!(message.payload.as_str(), "-61");
    }

    #[test]
    fn oversize_payload_marks_truncated() {
        let long = "y".repeat(PAYLOAD_LEN + 10);
        let message = Message::new("k", format_args!("{}", long));
        assert!(message.truncated);
    }
}
