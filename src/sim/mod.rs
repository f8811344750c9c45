//! Simulation helpers: scripted loopback channel and mock measurements.
//!
//! Everything here exists to exercise the protocol without hardware or a
//! second process: the loopback channel answers its own requests (with
//! optional packet loss), and the mock provider fabricates plausible
//! measured values. Gated behind the `sim` feature.

mod loopback;
mod mock;

pub use loopback::LoopbackChannel;
pub use mock::MockMeasureProvider;
