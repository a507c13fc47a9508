//! Codec error types.

use thiserror::Error;

/// Errors produced by the line codec.
///
/// `MalformedFrame` is fatal for a connection: the stream offers no way to
/// resynchronize mid-record, so callers must tear the transport down rather
/// than retry the read.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A received line was not a valid JSON record of the expected shape.
    #[error("malformed frame: {source}")]
    MalformedFrame {
        /// Underlying JSON parse failure.
        #[source]
        source: serde_json::Error,
    },

    /// An outbound record could not be serialized.
    #[error("record serialization failed: {source}")]
    Encode {
        /// Underlying JSON serialization failure.
        #[source]
        source: serde_json::Error,
    },
}
