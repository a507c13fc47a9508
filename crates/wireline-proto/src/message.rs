//! Record shapes exchanged with the server.
//!
//! Three shapes appear on the wire:
//!
//! - [`ServerLimits`]: the unsolicited first record after connecting.
//! - [`Credentials`]: the single client-to-server login record.
//! - [`WireMessage`]: everything else, tagged by [`MessageType`].
//!
//! Timestamps travel as string-encoded floating-point unix seconds
//! (`"1699999999.123"`); [`encode_time`]/[`decode_time`] convert at the
//! boundary.

use serde::{Deserialize, Serialize};

/// Tag carried in the `message_type` field of every [`WireMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Server asks the client to act (`message` names the request).
    Request,
    /// Server grants a prior request.
    Permit,
    /// Server refuses a prior request (`message` names the reason).
    Deny,
    /// Chat text.
    Info,
    /// Server-initiated latency probe. The client only ever answers.
    Syn,
    /// Client's answer to a [`MessageType::Syn`] probe.
    Ack,
    /// Server moved this client to another channel.
    ChannelChange,
}

/// Well-known `message` payloads used during the login handshake.
pub mod directive {
    /// Request/permit subject: the login exchange itself.
    pub const LOGIN: &str = "LOGIN";
    /// Deny reason: this client is banned. Terminal.
    pub const BANNED: &str = "BANNED";
    /// Deny reason: username exceeds the negotiated limit. Recoverable.
    pub const LENGTH: &str = "LENGTH";
    /// Deny reason: username already in use. Recoverable.
    pub const TAKEN: &str = "TAKEN";
}

/// A tagged protocol record.
///
/// Field semantics depend on `message_type`; absent fields are omitted on
/// encode and tolerated (as missing or `null`) on decode, matching the
/// server's habit of sending only what each record type needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Record tag.
    pub message_type: MessageType,

    /// Payload; chat text, deny reason, or channel name depending on the tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Originating username. Present on records intended for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    /// String-encoded float unix timestamp. Present on chat and latency
    /// records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl WireMessage {
    /// Client-to-server record carrying a payload and a send timestamp.
    ///
    /// Used for outbound chat ([`MessageType::Info`]) and latency replies
    /// ([`MessageType::Ack`]); the client never sets `sender`, the server
    /// stamps it.
    pub fn outbound(
        message_type: MessageType,
        message: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self {
            message_type,
            message: Some(message.into()),
            sender: None,
            time: Some(time.into()),
        }
    }
}

/// Limits negotiated by the server, sent as the very first record after the
/// stream is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerLimits {
    /// Maximum accepted username length, in characters.
    pub username_length: u32,
    /// Maximum accepted chat message length, in characters.
    pub message_length: u32,
}

/// Login credentials, sent exactly once per `REQUEST LOGIN`.
///
/// The password is transmitted in the clear by protocol design and must not
/// be retained anywhere after the send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Requested username.
    pub username: String,
    /// Plain-text password.
    pub password: String,
}

/// Encode unix seconds into the wire's string-float representation.
pub fn encode_time(seconds: f64) -> String {
    format!("{seconds}")
}

/// Decode the wire's string-float timestamp. `None` if unparseable.
pub fn decode_time(time: &str) -> Option<f64> {
    let seconds: f64 = time.parse().ok()?;
    seconds.is_finite().then_some(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_wire_names() {
        let json = serde_json::to_string(&MessageType::ChannelChange).unwrap();
        assert_eq!(json, "\"CHANNEL_CHANGE\"");

        let parsed: MessageType = serde_json::from_str("\"REQUEST\"").unwrap();
        assert_eq!(parsed, MessageType::Request);
    }

    #[test]
    fn outbound_omits_sender() {
        let msg = WireMessage::outbound(MessageType::Info, "hi", "12.5");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("sender"));
        assert!(json.contains("\"message_type\":\"INFO\""));
    }

    #[test]
    fn null_message_decodes_as_none() {
        let msg: WireMessage =
            serde_json::from_str(r#"{"message_type":"CHANNEL_CHANGE","message":null}"#).unwrap();
        assert_eq!(msg.message_type, MessageType::ChannelChange);
        assert_eq!(msg.message, None);
    }

    #[test]
    fn time_round_trip() {
        let encoded = encode_time(1_699_999_999.25);
        assert_eq!(decode_time(&encoded), Some(1_699_999_999.25));
    }

    #[test]
    fn time_rejects_garbage() {
        assert_eq!(decode_time("soon"), None);
        assert_eq!(decode_time("NaN"), None);
        assert_eq!(decode_time(""), None);
    }
}
