//! Newline-delimited JSON framing.
//!
//! One record per line: the compact JSON encoding of the record followed by
//! exactly one [`TERMINATOR`] byte. JSON string escaping guarantees the
//! encoded body itself never contains a raw `\n`, so the terminator is an
//! unambiguous frame boundary.

use serde::{Serialize, de::DeserializeOwned};

use crate::errors::CodecError;

/// Frame delimiter. Every record on the wire ends with exactly one.
pub const TERMINATOR: u8 = b'\n';

/// Serialize a record and append the frame terminator.
///
/// # Errors
///
/// - [`CodecError::Encode`] if JSON serialization fails.
pub fn encode_record<T: Serialize + ?Sized>(record: &T) -> Result<Vec<u8>, CodecError> {
    let mut line = serde_json::to_vec(record).map_err(|source| CodecError::Encode { source })?;

    // INVARIANT: compact JSON never emits a raw newline; string payloads
    // carry it as the two-byte escape `\n`.
    debug_assert!(!line.contains(&TERMINATOR));

    line.push(TERMINATOR);
    Ok(line)
}

/// Parse one received line into a record.
///
/// Accepts the line with or without its trailing terminator; transports that
/// read "up to and including the next `\n`" can pass the buffer through
/// unchanged.
///
/// # Errors
///
/// - [`CodecError::MalformedFrame`] if the line is not valid JSON of the
///   expected shape. Fatal for the connection; there is no resynchronization.
pub fn decode_record<T: DeserializeOwned>(line: &[u8]) -> Result<T, CodecError> {
    let body = match line.last() {
        Some(&TERMINATOR) => &line[..line.len() - 1],
        _ => line,
    };
    serde_json::from_slice(body).map_err(|source| CodecError::MalformedFrame { source })
}
