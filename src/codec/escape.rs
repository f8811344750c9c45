//! Byte-stuffing for the reserved control bytes.

use crate::core::{CTRL_ESCAPE, CTRL_HEADER, HEADER_ESCAPE};

use super::packet::FramingError;

/// Escape `data`, appending the result to `buffer`.
///
/// A literal [`CTRL_HEADER`] becomes `[CTRL_ESCAPE, HEADER_ESCAPE]` and a
/// literal [`CTRL_ESCAPE`] is doubled. All other bytes pass through.
pub fn escape_into(data: &[u8], buffer: &mut Vec<u8>) {
    for &byte in data {
        match byte {
            CTRL_HEADER => {
                buffer.push(CTRL_ESCAPE);
                buffer.push(HEADER_ESCAPE);
            }
            CTRL_ESCAPE => {
                buffer.push(CTRL_ESCAPE);
                buffer.push(CTRL_ESCAPE);
            }
            other => buffer.push(other),
        }
    }
}

/// Escape `data` into a fresh buffer.
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(data.len());
    escape_into(data, &mut buffer);
    buffer
}

/// Reverse [`escape`].
///
/// Fails on an escape byte at the end of input or an escape byte followed
/// by anything other than the two recognized markers.
pub fn unescape(data: &[u8]) -> Result<Vec<u8>, FramingError> {
    let mut output = Vec::with_capacity(data.len());
    let mut iter = data.iter();

    while let Some(&byte) = iter.next() {
        if byte != CTRL_ESCAPE {
            output.push(byte);
            continue;
        }

        match iter.next() {
            Some(&CTRL_ESCAPE) => output.push(CTRL_ESCAPE),
            Some(&HEADER_ESCAPE) => output.push(CTRL_HEADER),
            Some(&other) => return Err(FramingError::InvalidEscape(other)),
            None => return Err(FramingError::UnterminatedEscape),
        }
    }

    Ok(output)
}
