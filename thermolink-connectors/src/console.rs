//! Console debug channel
//!
//! Prints each message as a `key: payload` line and refuses anything past
//! the configured number of messages per window, the way a hosted console
//! throttles a device that talks too fast.

use std::io::Write;

use thermolink_core::{time::HostClock, Channel, ChannelError, TimeSource, Timestamp};

use crate::{ConnectionStats, ConnectorError};

/// At most `max_messages` per `window_ms`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub max_messages: u32,
    pub window_ms: u64,
}

impl RatePolicy {
    pub const fn new(max_messages: u32, window_ms: u64) -> Self {
        Self {
            max_messages,
            window_ms,
        }
    }

    /// No throttling
    pub const fn unlimited() -> Self {
        Self::new(u32::MAX, 1)
    }
}

/// Debug channel over any writer
pub struct ConsoleChannel<W: Write, T: TimeSource = HostClock> {
    out: W,
    policy: RatePolicy,
    clock: T,
    window_start: Option<Timestamp>,
    in_window: u32,
    stats: ConnectionStats,
}

impl<W: Write> ConsoleChannel<W> {
    /// Console on the host's monotonic clock
    pub fn with_host_clock(out: W, policy: RatePolicy) -> Self {
        Self::new(out, policy, HostClock::new())
    }
}

impl<W: Write, T: TimeSource> ConsoleChannel<W, T> {
    pub fn new(out: W, policy: RatePolicy, clock: T) -> Self {
        Self {
            out,
            policy,
            clock,
            window_start: None,
            in_window: 0,
            stats: ConnectionStats::default(),
        }
    }

    /// Claim a slot in the current window
    fn admit(&mut self) -> Result<(), ConnectorError> {
        let now = self.clock.now();
        let expired = match self.window_start {
            None => true,
            Some(start) => now.saturating_sub(start) >= self.policy.window_ms,
        };
        if expired {
            self.window_start = Some(now);
            self.in_window = 0;
        }

        if self.in_window >= self.policy.max_messages {
            return Err(ConnectorError::RateLimited);
        }
        self.in_window += 1;
        Ok(())
    }

    fn write_line(&mut self, key: &str, payload: &str) -> Result<usize, ConnectorError> {
        writeln!(self.out, "{}: {}", key, payload)?;
        self.out.flush()?;
        Ok(key.len() + payload.len() + 3)
    }

    pub fn clock_mut(&mut self) -> &mut T {
        &mut self.clock
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write, T: TimeSource> Channel for ConsoleChannel<W, T> {
    fn send(&mut self, key: &str, payload: &str) -> Result<(), ChannelError> {
        let result = self.admit().and_then(|()| self.write_line(key, payload));
        match result {
            Ok(bytes) => {
                self.stats.record_sent(bytes);
                Ok(())
            }
            Err(e) => Err(self.stats.record_failure(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thermolink_core::time::FixedTime;

    fn console(policy: RatePolicy) -> ConsoleChannel<Vec<u8>, FixedTime> {
        ConsoleChannel::new(Vec::new(), policy, FixedTime::new(0))
    }

    #[test]
    fn writes_lines() {
        let mut console = console(RatePolicy::unlimited());
        console.send("boot", "#1").unwrap();
        console.send("signal", "-67 dBm").unwrap();

        assert_eq!(console.stats().messages_sent, 2);
        let text = String::from_utf8(console.into_inner()).unwrap();
        assert_eq!(text, "boot: #1\nsignal: -67 dBm\n");
    }

    #[test]
    fn throttles_within_window() {
        let mut console = console(RatePolicy::new(2, 1_000));

        assert!(console.send("a", "1").is_ok());
        assert!(console.send("b", "2").is_ok());
        assert_eq!(console.send("c", "3"), Err(ChannelError::RateLimited));

        console.clock_mut().advance(999);
        assert_eq!(console.send("c", "3"), Err(ChannelError::RateLimited));

        console.clock_mut().advance(1);
        assert!(console.send("c", "3").is_ok());
        assert_eq!(console.stats().messages_failed, 2);
    }

    #[test]
    fn io_failure_is_transport_error() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut console = ConsoleChannel::new(Broken, RatePolicy::unlimited(), FixedTime::new(0));
        assert_eq!(
            console.send("a", "1"),
            Err(ChannelError::Transport { reason: "i/o" })
        );
    }
}
