//! Stateful frame-boundary scanner for the incoming byte stream.

use std::collections::VecDeque;

use crate::codec::Packet;
use crate::core::CTRL_HEADER;

/// Reassembles frames from an arbitrary byte stream.
///
/// The scanner is idle until a raw [`CTRL_HEADER`] appears; escaping
/// guarantees that byte never occurs inside a well-formed payload, so it
/// always marks a frame start. While a span is accumulating, a decode is
/// attempted after every byte:
///
/// - a successful decode delivers the packet and empties the span;
/// - an incomplete decode (truncated payload, pending escape) waits for
///   more bytes;
/// - any other decode error discards the span and the scanner goes idle
///   until the next header.
///
/// A fresh [`CTRL_HEADER`] while a span is pending discards that span: the
/// most recent unmatched header always wins. This recovers from dropped
/// bytes, inserted noise, and partial frames with no length field and no
/// terminator.
#[derive(Debug, Default)]
pub struct FrameReassembler {
    span: Vec<u8>,
    ready: VecDeque<Packet>,
}

impl FrameReassembler {
    /// Create an idle reassembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw received bytes into the scanner.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push_byte(byte);
        }
    }

    /// Pop the next decoded packet, in arrival order.
    pub fn next_packet(&mut self) -> Option<Packet> {
        self.ready.pop_front()
    }

    /// Number of bytes in the currently accumulating span.
    pub fn pending_len(&self) -> usize {
        self.span.len()
    }

    fn push_byte(&mut self, byte: u8) {
        if byte == CTRL_HEADER {
            if !self.span.is_empty() {
                tracing::trace!(
                    discarded = self.span.len(),
                    "resynchronizing on new frame header"
                );
            }
            self.span.clear();
            self.span.push(byte);
            return;
        }

        if self.span.is_empty() {
            // Noise between frames; stay idle until the next header.
            return;
        }

        self.span.push(byte);
        match Packet::decode(&self.span) {
            Ok(packet) => {
                tracing::trace!(
                    packet_type = %packet.packet_type,
                    value = ?packet.value,
                    "frame decoded"
                );
                self.span.clear();
                self.ready.push_back(packet);
            }
            Err(err) if err.is_incomplete() => {}
            Err(err) => {
                tracing::trace!(%err, discarded = self.span.len(), "malformed frame discarded");
                self.span.clear();
            }
        }
    }
}
