//! Rate-Limited Round-Robin Publish Scheduler
//!
//! ## Overview
//!
//! Cloud destinations cap how many messages a device may push per call
//! (a debug console might allow four per second, a broker bridge a handful
//! per period). The node has more to say than that: a set of one-shot boot
//! messages and a longer list of values that should all reach the
//! destination in turn. The scheduler spreads that traffic over successive
//! invocations without ever exceeding the cap.
//!
//! ## Phases
//!
//! ```text
//!            ┌──────────────┐ cursor past last entry ┌───────────────┐
//!  start ──▶ │     BOOT     │ ─────────────────────▶ │    STEADY     │ ◀─┐
//!            │ each message │  (rest of the quota    │ rotate values │   │ wrap
//!            │ exactly once │   carries over)        │ forever       │ ──┘
//!            └──────────────┘                        └───────────────┘
//! ```
//!
//! Each phase has its own [`BatchCursor`]. The cursors are the only state
//! that must survive between invocations; they guarantee forward progress
//! and fairness.
//!
//! ## Per-Invocation Algorithm
//!
//! While fewer than `quota` messages have gone out:
//!
//! 1. **BOOT**: a cursor past the last entry marks the phase complete for
//!    the rest of the process lifetime. The unused quota flows into STEADY
//!    in the same invocation; the quota is per call, not per phase.
//! 2. **STEADY**: a cursor past the last entry wraps to 0. One invocation
//!    sends at most one rotation closing back on its own first message
//!    (`len + 1` sends), so a table shorter than the quota never spins and
//!    an empty table sends nothing.
//! 3. Send the message under the cursor. On failure stop at once and leave
//!    the cursor where it is: the same message is the first attempt next
//!    time. On success advance the cursor.
//!
//! ## Guarantees
//!
//! - No invocation sends more than `quota` messages.
//! - With every send succeeding, the concatenated output of successive
//!   invocations is exactly the boot table once followed by the value table
//!   cycled, so no value is repeated before every other value went out.
//! - A failure never skips or loses a message; delivery per channel is
//!   at-least-once and in order.
//!
//! ## Example
//!
//! ```rust
//! use thermolink_core::message::{Message, MessageTable, Phase};
//! use thermolink_core::scheduler::{PublishScheduler, StopReason};
//! use thermolink_core::channel::Channel;
//! use thermolink_core::ChannelError;
//!
//! struct Table;
//! impl MessageTable for Table {
//!     fn len(&self, phase: Phase) -> usize {
//!         match phase { Phase::Boot => 1, Phase::Steady => 3 }
//!     }
//!     fn render(&self, phase: Phase, index: usize) -> Message {
//!         Message::new(phase.as_str(), format_args!("{}", index))
//!     }
//! }
//!
//! struct Sink(usize);
//! impl Channel for Sink {
//!     fn send(&mut self, _key: &str, _payload: &str) -> Result<(), ChannelError> {
//!         self.0 += 1;
//!         Ok(())
//!     }
//! }
//!
//! let mut scheduler = PublishScheduler::new(4);
//! let mut sink = Sink(0);
//! let report = scheduler.invoke(&Table, &mut sink);
//!
//! // Boot message, then values 0, 1, 2
//! assert_eq!(report.sent, 4);
//! assert_eq!(report.stop, StopReason::QuotaReached);
//! assert!(scheduler.boot_cursor().complete);
//! ```

use crate::channel::Channel;
use crate::errors::ChannelError;
use crate::message::{MessageTable, Phase};

/// Resume position within one phase's table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCursor {
    /// Next entry to attempt
    pub next_index: usize,
    /// Only meaningful for BOOT: the table has been fully sent
    pub complete: bool,
}

/// Why an invocation stopped sending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `quota` messages went out
    QuotaReached,
    /// STEADY rotation came back around to its first message
    RotationClosed,
    /// Nothing to send: boot done and the value table is empty
    Idle,
    /// A send failed; the cursor still points at the failed entry
    Stalled {
        /// Phase the failed entry belongs to
        phase: Phase,
        /// Table index of the failed entry
        index: usize,
        /// What the destination reported
        error: ChannelError,
    },
}

/// Outcome of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation {
    /// Messages accepted by the destination
    pub sent: usize,
    /// Of which boot-phase messages
    pub boot_sent: usize,
    /// Why the invocation ended
    pub stop: StopReason,
}

/// Running totals for observability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Invocations run
    pub invocations: u32,
    /// Messages accepted
    pub messages_sent: u32,
    /// Invocations cut short by a failed send
    pub stalls: u32,
}

/// Per-channel publish state machine
#[derive(Debug, Clone)]
pub struct PublishScheduler {
    quota: usize,
    boot: BatchCursor,
    steady: BatchCursor,
    stats: SchedulerStats,
}

impl PublishScheduler {
    /// Create a scheduler allowing at most `quota` sends per invocation
    pub fn new(quota: usize) -> Self {
        Self {
            quota,
            boot: BatchCursor::default(),
            steady: BatchCursor::default(),
            stats: SchedulerStats::default(),
        }
    }

    /// Run one invocation against `table`, sending through `channel`
    ///
    /// Never fails: a refused send is reported in the returned
    /// [`Invocation`] and retried first next time.
    pub fn invoke<T, C>(&mut self, table: &T, channel: &mut C) -> Invocation
    where
        T: MessageTable + ?Sized,
        C: Channel + ?Sized,
    {
        self.stats.invocations = self.stats.invocations.wrapping_add(1);
        let mut sent = 0;

        let boot_len = table.len(Phase::Boot);
        while !self.boot.complete && sent < self.quota {
            if self.boot.next_index >= boot_len {
                self.boot.complete = true;
                log_info!("Boot phase complete after {} messages", boot_len);
                break;
            }

            let index = self.boot.next_index;
            if let Err(error) = Self::deliver(table, channel, Phase::Boot, index) {
                return self.stalled(sent, sent, Phase::Boot, index, error);
            }
            self.boot.next_index += 1;
            sent += 1;
        }
        let boot_sent = sent;

        if !self.boot.complete {
            return self.finish(sent, boot_sent, StopReason::QuotaReached);
        }

        let steady_len = table.len(Phase::Steady);
        if steady_len == 0 {
            let stop = if sent < self.quota {
                StopReason::Idle
            } else {
                StopReason::QuotaReached
            };
            return self.finish(sent, boot_sent, stop);
        }

        // One rotation closing back on the invocation's first value message
        let mut rotation_left = steady_len + 1;
        while sent < self.quota {
            if rotation_left == 0 {
                return self.finish(sent, boot_sent, StopReason::RotationClosed);
            }
            if self.steady.next_index >= steady_len {
                self.steady.next_index = 0;
            }

            let index = self.steady.next_index;
            if let Err(error) = Self::deliver(table, channel, Phase::Steady, index) {
                return self.stalled(sent, boot_sent, Phase::Steady, index, error);
            }
            self.steady.next_index += 1;
            sent += 1;
            rotation_left -= 1;
        }

        self.finish(sent, boot_sent, StopReason::QuotaReached)
    }

    fn deliver<T, C>(
        table: &T,
        channel: &mut C,
        phase: Phase,
        index: usize,
    ) -> Result<(), ChannelError>
    where
        T: MessageTable + ?Sized,
        C: Channel + ?Sized,
    {
        let message = table.render(phase, index);
        if message.truncated {
            log_warn!("Message {} of {} phase truncated", index, phase.as_str());
        }
        channel.send(&message.key, &message.payload)
    }

    fn stalled(
        &mut self,
        sent: usize,
        boot_sent: usize,
        phase: Phase,
        index: usize,
        error: ChannelError,
    ) -> Invocation {
        self.stats.stalls = self.stats.stalls.wrapping_add(1);
        log_warn!(
            "Publish stalled at {} message {}: {}",
            phase.as_str(),
            index,
            error
        );
        self.finish(sent, boot_sent, StopReason::Stalled { phase, index, error })
    }

    fn finish(&mut self, sent: usize, boot_sent: usize, stop: StopReason) -> Invocation {
        self.stats.messages_sent = self.stats.messages_sent.wrapping_add(sent as u32);
        Invocation {
            sent,
            boot_sent,
            stop,
        }
    }

    /// Most messages per invocation
    pub fn quota(&self) -> usize {
        self.quota
    }

    /// Position in the boot table
    pub fn boot_cursor(&self) -> BatchCursor {
        self.boot
    }

    /// Position in the steady table
    pub fn steady_cursor(&self) -> BatchCursor {
        self.steady
    }

    /// Phase the next invocation starts in
    pub fn phase(&self) -> Phase {
        if self.boot.complete {
            Phase::Steady
        } else {
            Phase::Boot
        }
    }

    /// Running totals
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}
