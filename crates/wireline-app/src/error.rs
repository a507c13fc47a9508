//! Transport and runtime error types.
//!
//! The taxonomy follows the loop boundaries: everything a loop can observe
//! resolves to either a graceful peer close, a fatal framing failure, or a
//! plain I/O error, and each loop converts its own failure into one shutdown
//! call. Refused connection attempts never surface here — the connect loop
//! swallows and retries them.

use std::io;

use thiserror::Error;
use wireline_client::HandshakeError;
use wireline_proto::CodecError;

/// Failures observed at the framed-transport boundary.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote side closed or reset the stream. Treated identically to a
    /// graceful disconnect; triggers shutdown but is not reported as a
    /// failure of the session.
    #[error("peer closed the connection")]
    PeerClosed,

    /// A received line was not a valid record. Fatal for the connection; no
    /// resynchronization is attempted.
    #[error("malformed frame: {source}")]
    MalformedFrame {
        /// Underlying codec failure.
        #[source]
        source: CodecError,
    },

    /// An outbound record could not be serialized.
    #[error("record encoding failed: {source}")]
    Encode {
        /// Underlying codec failure.
        #[source]
        source: CodecError,
    },

    /// An I/O failure that is neither a peer close nor retryable at connect
    /// time.
    #[error("i/o failure: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// A send was attempted after the transport was shut down.
    #[error("transport already closed")]
    Closed,

    /// A bounded retry policy ran out of connection attempts.
    #[error("connection attempts exhausted after {attempts} tries")]
    ConnectExhausted {
        /// Failed attempts made before giving up.
        attempts: u32,
    },

    /// TLS configuration or handshake failure. Never retried.
    #[error("tls failure: {reason}")]
    Tls {
        /// Human-readable cause.
        reason: String,
    },
}

/// Top-level session failures returned by [`crate::Runtime::run`].
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Transport failure outside the loops' own recovery (connect, limits
    /// record, handshake I/O).
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The handshake observed a record it has no transition for.
    #[error("handshake failure: {0}")]
    Handshake(#[from] HandshakeError),

    /// The server denied login with `BANNED`. The connection is closed.
    #[error("login rejected: banned by server")]
    Banned,

    /// The credential collaborator stopped supplying credentials.
    #[error("credential entry aborted")]
    LoginAborted,
}
