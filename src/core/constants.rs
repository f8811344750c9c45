//! Protocol constants.
//!
//! These values are fixed by the wire protocol and MUST NOT be changed:
//! both peers hard-code them, and there is no version negotiation.

use std::time::Duration;

// =============================================================================
// RESERVED WIRE BYTES
// =============================================================================

/// Marks the beginning of a frame. Also the resynchronization anchor:
/// a receiver that lost track of frame boundaries scans for this byte.
pub const CTRL_HEADER: u8 = 0x10;

/// Escaped stand-in for a literal [`CTRL_HEADER`] inside a payload.
pub const HEADER_ESCAPE: u8 = 0x11;

/// Marks an escape sequence; doubled to encode a literal occurrence of itself.
pub const CTRL_ESCAPE: u8 = 0x12;

// =============================================================================
// FRAME SIZES (unescaped payload, including the type byte)
// =============================================================================

/// Payload length of a packet that carries no value.
pub const BARE_PAYLOAD_LEN: usize = 1;

/// Payload length of a packet that carries a big-endian u16 value.
pub const VALUED_PAYLOAD_LEN: usize = 3;

// =============================================================================
// TIMING DEFAULTS
// =============================================================================

/// Time before an unanswered request is considered timed out.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Nominal interval between measurement requests in the steady state.
pub const DEFAULT_MEASURE_INTERVAL: Duration = Duration::from_millis(500);

/// Retransmissions of an unanswered request before the session fails.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Sleep between runner iterations; keeps the tick loop from spinning.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);
