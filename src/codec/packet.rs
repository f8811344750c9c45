//! Typed packets and their encode/decode logic.

use std::fmt;

use thiserror::Error;

use crate::core::{BARE_PAYLOAD_LEN, CTRL_HEADER, VALUED_PAYLOAD_LEN};

use super::escape::{escape_into, unescape};

/// Packet type identifiers, encoded as the low two bits of the type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Request the peer's configured duty cycle; carries our own.
    RequestConfig = 0x00,
    /// Response to [`RequestConfig`](Self::RequestConfig), carries a u16.
    ResponseConfig = 0x01,
    /// Request the peer's measured duty cycle; carries no value.
    RequestMeasured = 0x02,
    /// Response to [`RequestMeasured`](Self::RequestMeasured), carries a u16.
    ResponseMeasured = 0x03,
}

impl PacketType {
    /// Parse a packet type from a type byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::RequestConfig),
            0x01 => Some(Self::ResponseConfig),
            0x02 => Some(Self::RequestMeasured),
            0x03 => Some(Self::ResponseMeasured),
            _ => None,
        }
    }

    /// Convert to the wire type byte.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Whether packets of this type carry a u16 value.
    pub fn expects_value(self) -> bool {
        !matches!(self, Self::RequestMeasured)
    }

    /// Exact unescaped payload length for this type, counting the type byte.
    pub fn payload_len(self) -> usize {
        if self.expects_value() {
            VALUED_PAYLOAD_LEN
        } else {
            BARE_PAYLOAD_LEN
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RequestConfig => "request_config",
            Self::ResponseConfig => "response_config",
            Self::RequestMeasured => "request_measured",
            Self::ResponseMeasured => "response_measured",
        };
        f.write_str(name)
    }
}

/// A decoded protocol packet.
///
/// Invariant: `value` is `Some` exactly when
/// [`packet_type.expects_value()`](PacketType::expects_value). The
/// constructors and [`decode`](Packet::decode) uphold this; a mismatched
/// combination on the wire is a [`FramingError`], not a valid packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    /// The packet type.
    pub packet_type: PacketType,
    /// The big-endian u16 payload value, if the type carries one.
    pub value: Option<u16>,
}

impl Packet {
    /// Request the peer's configured duty cycle, announcing our own.
    pub fn request_config(own_duty_cycle: u16) -> Self {
        Self {
            packet_type: PacketType::RequestConfig,
            value: Some(own_duty_cycle),
        }
    }

    /// Answer a config request with our configured duty cycle.
    pub fn response_config(duty_cycle: u16) -> Self {
        Self {
            packet_type: PacketType::ResponseConfig,
            value: Some(duty_cycle),
        }
    }

    /// Request a fresh measurement from the peer.
    pub fn request_measured() -> Self {
        Self {
            packet_type: PacketType::RequestMeasured,
            value: None,
        }
    }

    /// Answer a measurement request with the observed value.
    pub fn response_measured(measured: u16) -> Self {
        Self {
            packet_type: PacketType::ResponseMeasured,
            value: Some(measured),
        }
    }

    /// Encode to a complete wire frame: header byte plus escaped payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(1 + 2 * VALUED_PAYLOAD_LEN);
        frame.push(CTRL_HEADER);
        escape_into(&[self.packet_type.as_byte()], &mut frame);
        if let Some(value) = self.value {
            escape_into(&value.to_be_bytes(), &mut frame);
        }
        frame
    }

    /// Decode a complete frame.
    ///
    /// The frame must start with [`CTRL_HEADER`]; the remainder is
    /// unescaped, the first payload byte selects the type, and the payload
    /// length must match that type's arity exactly.
    pub fn decode(frame: &[u8]) -> Result<Self, FramingError> {
        let (&first, rest) = frame.split_first().ok_or(FramingError::Truncated {
            expected: BARE_PAYLOAD_LEN,
            actual: 0,
        })?;
        if first != CTRL_HEADER {
            return Err(FramingError::MissingHeader(first));
        }

        let payload = unescape(rest)?;
        let &type_byte = payload.first().ok_or(FramingError::Truncated {
            expected: BARE_PAYLOAD_LEN,
            actual: 0,
        })?;
        let packet_type =
            PacketType::from_byte(type_byte).ok_or(FramingError::UnknownType(type_byte))?;

        let expected = packet_type.payload_len();
        if payload.len() < expected {
            return Err(FramingError::Truncated {
                expected,
                actual: payload.len(),
            });
        }
        if payload.len() > expected {
            return Err(FramingError::Overlong {
                expected,
                actual: payload.len(),
            });
        }

        let value = packet_type
            .expects_value()
            .then(|| u16::from_be_bytes([payload[1], payload[2]]));

        Ok(Self { packet_type, value })
    }
}

/// Errors raised while decoding a frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// Frame does not begin with the control header.
    #[error("frame must start with the control header, got 0x{0:02x}")]
    MissingHeader(u8),

    /// Payload shorter than the type's arity. More bytes may still arrive.
    #[error("payload truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Unescaped payload length required by the type.
        expected: usize,
        /// Unescaped payload bytes present.
        actual: usize,
    },

    /// Payload longer than the type's arity.
    #[error("payload overlong: expected {expected} bytes, got {actual}")]
    Overlong {
        /// Unescaped payload length required by the type.
        expected: usize,
        /// Unescaped payload bytes present.
        actual: usize,
    },

    /// Type byte does not name a known packet type.
    #[error("unknown packet type byte 0x{0:02x}")]
    UnknownType(u8),

    /// Escape byte at the end of input. More bytes may still arrive.
    #[error("unterminated escape sequence")]
    UnterminatedEscape,

    /// Escape byte followed by an unrecognized marker.
    #[error("invalid escape sequence (marker 0x{0:02x})")]
    InvalidEscape(u8),
}

impl FramingError {
    /// Whether the condition could resolve itself as more bytes arrive.
    ///
    /// The frame reassembler keeps a span with an incomplete error pending
    /// and discards one with any other error.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Truncated { .. } | Self::UnterminatedEscape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CTRL_ESCAPE;

    #[test]
    fn test_packet_type_roundtrip() {
        for t in [
            PacketType::RequestConfig,
            PacketType::ResponseConfig,
            PacketType::RequestMeasured,
            PacketType::ResponseMeasured,
        ] {
            assert_eq!(PacketType::from_byte(t.as_byte()), Some(t));
        }
        assert_eq!(PacketType::from_byte(0x04), None);
        assert_eq!(PacketType::from_byte(0xFF), None);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        // Boundary values plus values whose bytes collide with the
        // reserved control bytes.
        let values = [0x0000, 0x0001, 0x1011, 0x1012, 0x1212, 0xFF10, 0xFFFF];

        for value in values {
            for packet in [
                Packet::request_config(value),
                Packet::response_config(value),
                Packet::response_measured(value),
            ] {
                let frame = packet.encode();
                assert_eq!(
                    Packet::decode(&frame).unwrap(),
                    packet,
                    "frame {}",
                    hex::encode(&frame)
                );
            }
        }

        let bare = Packet::request_measured();
        assert_eq!(Packet::decode(&bare.encode()).unwrap(), bare);
    }

    #[test]
    fn test_encoded_frame_layout() {
        // 0x0102 contains no reserved bytes, so the frame is verbatim.
        let frame = Packet::response_config(0x0102).encode();
        assert_eq!(frame, [CTRL_HEADER, 0x01, 0x01, 0x02]);

        let frame = Packet::request_measured().encode();
        assert_eq!(frame, [CTRL_HEADER, 0x02]);
    }

    #[test]
    fn test_encode_escapes_value_bytes() {
        // 0x1012: both value bytes are reserved and must be escaped.
        let frame = Packet::response_measured(0x1012).encode();
        assert_eq!(
            frame,
            [
                CTRL_HEADER,
                0x03,
                CTRL_ESCAPE,
                crate::core::HEADER_ESCAPE,
                CTRL_ESCAPE,
                CTRL_ESCAPE
            ]
        );
        // Past the frame marker there is no literal header byte.
        assert!(!frame[1..].contains(&CTRL_HEADER));
    }

    #[test]
    fn test_decode_missing_header() {
        assert!(matches!(
            Packet::decode(&[0x00, 0x01, 0x02]),
            Err(FramingError::MissingHeader(0x00))
        ));
    }

    #[test]
    fn test_decode_unknown_type() {
        assert!(matches!(
            Packet::decode(&[CTRL_HEADER, 0x07]),
            Err(FramingError::UnknownType(0x07))
        ));
    }

    #[test]
    fn test_decode_truncated_is_incomplete() {
        // Valued packet with only one value byte so far.
        let err = Packet::decode(&[CTRL_HEADER, 0x01, 0x42]).unwrap_err();
        assert!(matches!(err, FramingError::Truncated { expected: 3, actual: 2 }));
        assert!(err.is_incomplete());

        // Bare header with no payload yet.
        let err = Packet::decode(&[CTRL_HEADER]).unwrap_err();
        assert!(err.is_incomplete());

        // Pending escape sequence.
        let err = Packet::decode(&[CTRL_HEADER, 0x01, CTRL_ESCAPE]).unwrap_err();
        assert!(matches!(err, FramingError::UnterminatedEscape));
        assert!(err.is_incomplete());
    }

    #[test]
    fn test_decode_length_mismatch_is_invalid() {
        // request_measured must not carry a value.
        let err = Packet::decode(&[CTRL_HEADER, 0x02, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, FramingError::Overlong { expected: 1, actual: 3 }));
        assert!(!err.is_incomplete());
    }

    #[test]
    fn test_corrupted_payload_byte() {
        // Known gap of the checksum-free codec: flipping a payload byte
        // yields either a framing error or a different valid packet,
        // never a panic.
        let frame = Packet::response_measured(0x2030).encode();
        for pos in 1..frame.len() {
            let mut corrupted = frame.clone();
            corrupted[pos] ^= 0x04;
            match Packet::decode(&corrupted) {
                Ok(packet) => assert_ne!(packet, Packet::response_measured(0x2030)),
                Err(_) => {}
            }
        }
    }
}
