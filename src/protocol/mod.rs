//! Protocol state machine: handshake and steady-state measurement loop.
//!
//! The machine is a closed sum of two states. **Startup** learns the peer's
//! configured duty cycle by retrying `RequestConfig` until a
//! `ResponseConfig` arrives; **Normal** then periodically requests a
//! measured value and compares it against the learned target. Exactly one
//! request is ever outstanding per direction, which keeps retry bookkeeping
//! O(1) and makes the next matching response unambiguous without sequence
//! numbers.
//!
//! Everything the machine wants done to the outside world comes back as an
//! explicit [`Effect`] list from [`Machine::tick`] and [`Machine::handle`];
//! there are no callbacks and no hidden transition flags. The caller (see
//! the `runner` module) dispatches effects to the channel and the status
//! reporter at a single well-defined point per tick.

mod machine;
mod retry;

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::codec::{Packet, PacketType};
use crate::core::{
    DEFAULT_MAX_RETRIES, DEFAULT_MEASURE_INTERVAL, DEFAULT_TIMEOUT, StatusLight,
};

pub use machine::{Machine, Phase};
pub use retry::{RequestKind, RetryState};

/// Static configuration of one protocol endpoint.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// The duty cycle configured for this device.
    pub own_duty_cycle: u16,
    /// Time before an unanswered request counts as timed out.
    pub timeout: Duration,
    /// Nominal interval between measurement requests.
    pub measure_interval: Duration,
    /// Retransmissions of one request before the session fails.
    pub max_retries: u32,
}

impl ProtocolConfig {
    /// Configuration with protocol-default timing for a given duty cycle.
    pub fn new(own_duty_cycle: u16) -> Self {
        Self {
            own_duty_cycle,
            timeout: DEFAULT_TIMEOUT,
            measure_interval: DEFAULT_MEASURE_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// What this endpoint knows about the duty-cycle pair.
///
/// `expected_duty_cycle` becomes `Some` once the handshake completes and is
/// never unset within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerConfig {
    /// Our configured target.
    pub own_duty_cycle: u16,
    /// The peer's configured target, once learned.
    pub expected_duty_cycle: Option<u16>,
}

/// One observed deviation between the learned target and a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deviation {
    /// The peer's configured duty cycle learned during handshake.
    pub expected: u16,
    /// The value the peer measured at its output.
    pub measured: u16,
    /// `|expected - measured|`.
    pub deviation: u16,
}

/// Side effect requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Transmit a packet to the peer.
    Send(Packet),
    /// Report a session health change.
    Status(StatusLight),
    /// Report an observed duty-cycle deviation.
    Deviation(Deviation),
}

/// Structurally valid packets that violate the protocol contract.
///
/// These are warned about and ignored; they never affect retry bookkeeping
/// and never cause a transition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A packet type that expects a value arrived without one.
    #[error("{packet_type} packet is missing its value")]
    MissingValue {
        /// The offending packet type.
        packet_type: PacketType,
    },

    /// A packet type that is meaningless in the current state.
    #[error("unexpected {packet_type} packet")]
    Unexpected {
        /// The offending packet type.
        packet_type: PacketType,
    },
}

/// Retry budget exhausted for the outstanding request.
///
/// Fatal for the current session: it propagates out of the tick loop and
/// the scheduler tears the machine down and starts over from Startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("timed out waiting for {request} response after {retries} retries")]
pub struct TimeoutError {
    /// Which request went unanswered.
    pub request: RequestKind,
    /// Retries spent before giving up.
    pub retries: u32,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => f.write_str("request_config"),
            Self::Measured => f.write_str("request_measured"),
        }
    }
}
