//! Collaborator traits the runtime is driven through.
//!
//! The session loops never touch a terminal or a UI directly; they talk to
//! these three seams. Production wires them to stdin/stdout, tests wire
//! them to channels and recorded vectors.

use wireline_client::{ChatMessage, Notice};
use wireline_proto::Credentials;

/// Receives everything the session surfaces to the user.
///
/// Called from the inbound loop and the handshake; implementations must not
/// block.
pub trait Presenter: Clone + Send + Sync + 'static {
    /// A chat message arrived and should be displayed.
    fn deliver(&self, message: &ChatMessage);

    /// The server measured our round-trip latency; `channel` is the room
    /// the session currently sits in.
    fn status(&self, latency_secs: i64, channel: &str);

    /// A login-phase or validation notice.
    fn notice(&self, notice: &Notice);
}

/// Supplies outbound chat lines.
pub trait InputSource: Send + 'static {
    /// Next line the user wants to send, or `None` when input is exhausted
    /// and the session should wind down.
    fn next_line(&mut self) -> impl Future<Output = Option<String>> + Send;
}

/// Supplies login credentials on demand.
///
/// Asked once per server `REQUEST`; a denied login leads to another ask.
pub trait CredentialSource: Send + 'static {
    /// Next credential pair, or `None` to abort the login.
    fn credentials(&mut self) -> impl Future<Output = Option<Credentials>> + Send;
}
