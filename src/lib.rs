//! # PulseSync Protocol
//!
//! PulseSync keeps the duty-cycle configuration of two peer PWM
//! controllers in agreement across an unreliable byte-oriented serial
//! link. Each peer learns the other's configured target during a
//! handshake, then periodically requests a measured output value and
//! reports the drift against that target. It provides:
//!
//! - **Robust framing**: byte-stuffed frames that resynchronize on a
//!   single control byte after corruption, with no length field
//! - **Bounded retries**: every unanswered request is retried against a
//!   fixed budget, then escalated to a fatal session timeout
//! - **Portability**: single-threaded, tick-driven, and blocking-free;
//!   no OS timers, threads, or async runtime required
//! - **Hardware at arm's length**: UARTs, ADCs, and status LEDs enter
//!   only through small traits implemented by the embedding program
//!
//! ## Feature Flags
//!
//! - `sim` (default): loopback channel and mock measurement provider
//!
//! ## Example Usage
//!
//! ```rust
//! use pulsesync::prelude::*;
//! use std::time::Duration;
//!
//! // Two peers wired back-to-back over an in-memory serial link.
//! let (chan_a, chan_b) = pipe_pair();
//!
//! struct Steady(u16);
//! impl MeasureProvider for Steady {
//!     fn measure(&mut self) -> u16 {
//!         self.0
//!     }
//! }
//!
//! let mut a = Runner::new(
//!     chan_a,
//!     ProtocolConfig::new(1200),
//!     Steady(1200),
//!     NullStatusReporter,
//!     RestartPolicy::Halt,
//! )
//! .unwrap();
//! let mut b = Runner::new(
//!     chan_b,
//!     ProtocolConfig::new(1340),
//!     Steady(1340),
//!     NullStatusReporter,
//!     RestartPolicy::Halt,
//! )
//! .unwrap();
//!
//! // The scheduler supplies elapsed wall time; here we tick by hand.
//! for _ in 0..4 {
//!     a.step(Duration::from_millis(10)).unwrap();
//!     b.step(Duration::from_millis(10)).unwrap();
//! }
//!
//! assert_eq!(a.machine().expected_duty_cycle(), Some(1340));
//! assert_eq!(b.machine().expected_duty_cycle(), Some(1200));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

// Core constants, errors, and collaborator traits (always included)
pub mod core;

// Packet codec: escaping, typed packets, wire frames
pub mod codec;

// Transport channels and the frame reassembler
pub mod transport;

// Protocol state machine
pub mod protocol;

// Tick-driven session runner
pub mod runner;

// Simulation helpers (feature-gated)
#[cfg(feature = "sim")]
pub mod sim;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::codec::{FramingError, Packet, PacketType};
    pub use crate::core::{
        MeasureProvider, NullStatusReporter, PulseError, StatusLight, StatusReporter,
        TraceStatusReporter,
    };
    pub use crate::protocol::{
        Deviation, Effect, Machine, PeerConfig, Phase, ProtocolConfig, ProtocolError,
        RequestKind, RetryState, TimeoutError,
    };
    pub use crate::runner::{RestartPolicy, Runner};
    pub use crate::transport::{
        BytePort, Channel, FrameReassembler, LinkError, PipePort, SerialChannel, pipe_pair,
    };

    #[cfg(feature = "sim")]
    pub use crate::sim::{LoopbackChannel, MockMeasureProvider};
}

// Re-export commonly used items at crate root
pub use codec::{Packet, PacketType};
pub use core::PulseError;
pub use protocol::{Machine, ProtocolConfig};
pub use runner::{RestartPolicy, Runner};
pub use transport::Channel;
