//! Transport channels: byte links pumped through the frame reassembler.
//!
//! A [`Channel`] moves whole packets between peers over an unreliable
//! byte-oriented link. Incoming bytes are scanned by a [`FrameReassembler`]
//! owned by the channel; decoded packets are queued and drained once per
//! tick through [`Channel::next_packet`], so packet handling never happens
//! re-entrantly inside the receive path.
//!
//! Hardware-bound links (UART and friends) are not implemented here: the
//! embedding program supplies a [`BytePort`] over its register driver and
//! wraps it in [`SerialChannel`]. The in-memory [`PipePort`] stands in for
//! the physical link when simulating two peers locally.

mod pipe;
mod reassembler;

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::codec::Packet;

pub use pipe::PipePort;
pub use reassembler::FrameReassembler;

/// Transport channel failures.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The other end of the link is gone.
    #[error("link closed by peer")]
    Closed,

    /// Underlying port I/O failure.
    #[error("port i/o error: {0}")]
    Io(#[from] io::Error),
}

/// A packet-level transport channel between exactly two endpoints.
pub trait Channel {
    /// Encode and transmit one packet.
    fn send(&mut self, packet: &Packet) -> Result<(), LinkError>;

    /// Pump available incoming bytes through the reassembler.
    ///
    /// Must not block; `elapsed` is the wall-clock delta supplied by the
    /// scheduler since the previous tick.
    fn tick(&mut self, elapsed: Duration) -> Result<(), LinkError>;

    /// Pop the next fully decoded packet, in arrival order.
    fn next_packet(&mut self) -> Option<Packet>;
}

/// Raw byte source/sink supplied by the embedding program.
///
/// Implementations wrap whatever moves bytes: a UART driver, a pipe, a
/// scripted test fixture. `read_available` must return immediately with
/// whatever is pending, possibly nothing.
pub trait BytePort {
    /// Queue all of `bytes` for transmission.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError>;

    /// Append all currently pending received bytes to `buf`.
    ///
    /// Returns the number of bytes appended.
    fn read_available(&mut self, buf: &mut Vec<u8>) -> Result<usize, LinkError>;
}

/// [`Channel`] adapter over any [`BytePort`].
#[derive(Debug)]
pub struct SerialChannel<P: BytePort> {
    port: P,
    reassembler: FrameReassembler,
    scratch: Vec<u8>,
}

impl<P: BytePort> SerialChannel<P> {
    /// Wrap a byte port in a packet channel.
    pub fn new(port: P) -> Self {
        Self {
            port,
            reassembler: FrameReassembler::new(),
            scratch: Vec::new(),
        }
    }

    /// Access the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }
}

impl<P: BytePort> Channel for SerialChannel<P> {
    fn send(&mut self, packet: &Packet) -> Result<(), LinkError> {
        let frame = packet.encode();
        tracing::trace!(
            packet_type = %packet.packet_type,
            value = ?packet.value,
            len = frame.len(),
            "sending frame"
        );
        self.port.write_all(&frame)
    }

    fn tick(&mut self, _elapsed: Duration) -> Result<(), LinkError> {
        self.scratch.clear();
        if self.port.read_available(&mut self.scratch)? > 0 {
            self.reassembler.push_bytes(&self.scratch);
        }
        Ok(())
    }

    fn next_packet(&mut self) -> Option<Packet> {
        self.reassembler.next_packet()
    }
}

/// Create a connected pair of in-memory serial channels.
///
/// Bytes written to one side arrive at the other on its next tick; the
/// link itself is lossless and order-preserving.
pub fn pipe_pair() -> (SerialChannel<PipePort>, SerialChannel<PipePort>) {
    let (a, b) = PipePort::pair();
    (SerialChannel::new(a), SerialChannel::new(b))
}
