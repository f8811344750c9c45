//! Top-level error type for the PulseSync protocol.
//!
//! Each layer defines its own error enum next to the code it describes
//! ([`FramingError`](crate::codec::FramingError) in `codec`,
//! [`LinkError`](crate::transport::LinkError) in `transport`,
//! [`ProtocolError`](crate::protocol::ProtocolError) and
//! [`TimeoutError`](crate::protocol::TimeoutError) in `protocol`); this
//! module only aggregates them.

use thiserror::Error;

use crate::codec::FramingError;
use crate::protocol::{ProtocolError, TimeoutError};
use crate::transport::LinkError;

/// Top-level PulseSync errors.
///
/// The runner itself only ever surfaces `Timeout` and `Link`: framing
/// errors are recovered inside the reassembler and protocol violations are
/// warned about and ignored. The `Framing` and `Protocol` variants exist so
/// embedders that call the codec or machine directly can still bubble every
/// layer's error through one type with `?`.
#[derive(Debug, Error)]
pub enum PulseError {
    /// Malformed frame or escape sequence.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Structurally valid packet that violates the protocol contract.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Retry budget exhausted; fatal for the current session.
    #[error("timeout: {0}")]
    Timeout(#[from] TimeoutError),

    /// Transport channel failure.
    #[error("link error: {0}")]
    Link(#[from] LinkError),
}
