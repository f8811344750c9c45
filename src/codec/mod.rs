//! Packet codec: typed packets and their escaped wire frames.
//!
//! One frame carries exactly one packet:
//!
//! ```text
//! +-------------+----------------------------------------+
//! | CTRL_HEADER | escaped: type_byte (value_hi value_lo)? |
//! | 1 byte      | 1..6 bytes                              |
//! +-------------+----------------------------------------+
//! ```
//!
//! The two reserved bytes ([`CTRL_HEADER`](crate::core::CTRL_HEADER) and
//! [`CTRL_ESCAPE`](crate::core::CTRL_ESCAPE)) never appear literally inside
//! an escaped payload, so a raw header byte on the wire always marks a frame
//! start. That property is the entire resynchronization story; there is no
//! length prefix and no terminator.
//!
//! There is deliberately no checksum: a corrupted payload byte either fails
//! to decode or decodes to a different, structurally valid packet. The
//! protocol above tolerates this because every exchange is idempotent and
//! retried.

mod escape;
mod packet;

pub use escape::{escape, escape_into, unescape};
pub use packet::{FramingError, Packet, PacketType};
