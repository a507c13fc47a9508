//! Presentation-facing event types.
//!
//! These are the values handed to the external presentation collaborator.
//! Rendering (colors, timestamp formatting, prompts) is explicitly out of
//! scope for this crate; the types carry everything a renderer needs and
//! nothing else.

/// A chat record ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    /// Who sent it, as reported by the server.
    pub sender: String,
    /// Message body.
    pub body: String,
    /// Unix timestamp in seconds, decoded from the wire.
    pub timestamp: f64,
    /// Whether `sender` is this session's own username.
    pub is_self: bool,
}

/// User-visible condition that is not a chat message.
///
/// Notices are surfaced to the operator and never treated as errors:
/// recoverable login denials loop the handshake, and an over-long local
/// message is simply not sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The server banned this client. The connection is being closed.
    Banned,
    /// The requested username exceeds the server's limit.
    UsernameTooLong {
        /// Negotiated maximum username length, in characters.
        max: u32,
    },
    /// The requested username is already in use.
    UsernameTaken {
        /// The name that was refused.
        name: String,
    },
    /// A locally entered message exceeds the server's limit; it was not sent.
    MessageTooLong {
        /// Negotiated maximum message length, in characters.
        max: u32,
    },
}
