//! Inbound operator commands
//!
//! The broker subscribes to two topics under its prefix:
//!
//! | Topic           | Payload                 | Effect                        |
//! |-----------------|-------------------------|-------------------------------|
//! | `cmd/reset`     | `counters` / `extremes` | reset boot counters / extrema |
//! | `cmd/getinfo`   | ignored                 | publish status on `info`      |

use crate::errors::CommandError;

/// Topic suffix of the reset command
pub const RESET_TOPIC: &str = "cmd/reset";

/// Topic suffix of the info request
pub const GET_INFO_TOPIC: &str = "cmd/getinfo";

/// What a reset command clears
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTarget {
    /// Boot, run and reconnect counters
    Counters,
    /// Observed minimum and maximum
    Extremes,
}

/// Operator command received over the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Clear part of the retained record
    Reset(ResetTarget),
    /// Publish the device info message
    GetInfo,
}

impl Command {
    /// Parse a message received on `topic` under `prefix`
    pub fn parse(prefix: &str, topic: &str, payload: &str) -> Result<Self, CommandError> {
        let suffix = topic
            .strip_prefix(prefix)
            .ok_or(CommandError::UnknownTopic)?;

        match suffix {
            RESET_TOPIC => match payload.trim() {
                p if p.eq_ignore_ascii_case("counters") => Ok(Command::Reset(ResetTarget::Counters)),
                p if p.eq_ignore_ascii_case("extremes") => Ok(Command::Reset(ResetTarget::Extremes)),
                _ => Err(CommandError::InvalidPayload { command: "reset" }),
            },
            GET_INFO_TOPIC => Ok(Command::GetInfo),
            _ => Err(CommandError::UnknownTopic),
        }
    }
}
