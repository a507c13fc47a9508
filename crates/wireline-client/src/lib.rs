//! Sans-IO protocol logic for the wireline chat client.
//!
//! Pure state machines in the action style: methods consume one decoded
//! record (plus the current wall clock where needed) and return a list of
//! actions for the driver to execute. No I/O happens here, which keeps every
//! transition unit-testable without a socket or a runtime.
//!
//! # Components
//!
//! - [`Handshake`]: server-driven login negotiation
//! - [`Dispatcher`]: post-login record classification and routing
//! - [`Session`]: shared connection flags and the one-shot shutdown latch
//! - [`RetryPolicy`]: injectable reconnect policy for the lifecycle manager

mod dispatch;
mod event;
mod handshake;
mod retry;
mod session;

pub use dispatch::{DispatchAction, DispatchError, Dispatcher};
pub use event::{ChatMessage, Notice};
pub use handshake::{Handshake, HandshakeAction, HandshakeError, HandshakeState};
pub use retry::{Backoff, RetryPolicy};
pub use session::Session;
