//! Tokio runtime layer for the wireline chat client.
//!
//! This crate owns everything asynchronous: establishing the (optionally
//! TLS-wrapped) stream, moving framed records, and running the session
//! lifecycle around the pure state machines from `wireline-client`.
//!
//! Entry point is [`Runtime`]: construct it with a [`ConnectConfig`] and
//! the three collaborator implementations ([`Presenter`], [`InputSource`],
//! [`CredentialSource`]), then `run()` one session to completion.

pub mod driver;
pub mod error;
pub mod runtime;
pub mod transport;

pub use driver::{CredentialSource, InputSource, Presenter};
pub use error::{RuntimeError, TransportError};
pub use runtime::Runtime;
pub use transport::{
    BoxRead, BoxWrite, ConnectConfig, FrameReader, FrameWriter, SharedWriter, TlsConfig, connect,
};
