//! Post-login record dispatcher.
//!
//! Classifies each inbound record after login: protocol-control types are
//! consumed here (latency probe, channel change), everything else is routed
//! to the presentation collaborator. Pure classify-and-route; the single
//! blocking obligation — answering a probe before the next read — is
//! expressed by ordering [`DispatchAction::Reply`] first in the returned
//! actions.
//!
//! The dispatcher owns `current_channel`, which keeps the field
//! single-writer: it lives with the inbound loop that drives dispatch.

use thiserror::Error;
use wireline_proto::{MessageType, WireMessage, decode_time, encode_time};

use crate::event::ChatMessage;

/// Channel the server places every client in until it says otherwise.
pub const DEFAULT_CHANNEL: &str = "Main";

/// Actions returned by [`Dispatcher::dispatch`] for the inbound loop to
/// execute, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchAction {
    /// Send this record to the server before reading the next inbound one.
    Reply(WireMessage),

    /// Surface a latency/channel status update.
    Status {
        /// Round-trip latency in whole seconds.
        latency_secs: i64,
        /// Channel the session is currently in.
        channel: String,
    },

    /// Hand a chat record to the presentation collaborator.
    Deliver(ChatMessage),
}

/// Errors from records whose required fields are missing or unusable.
///
/// Callers treat these exactly like a malformed frame: fatal for the
/// connection, one shutdown, no resynchronization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// A record of this type requires the named field.
    #[error("{message_type:?} record missing required field `{field}`")]
    MissingField {
        /// Tag of the offending record.
        message_type: MessageType,
        /// Wire name of the absent field.
        field: &'static str,
    },

    /// The record's `time` field did not parse as float seconds.
    #[error("{message_type:?} record carries unparseable timestamp {time:?}")]
    BadTimestamp {
        /// Tag of the offending record.
        message_type: MessageType,
        /// The raw timestamp string.
        time: String,
    },
}

/// Classifies inbound records for one logged-in session.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    username: String,
    current_channel: String,
}

impl Dispatcher {
    /// Create a dispatcher for the given logged-in username, starting in
    /// [`DEFAULT_CHANNEL`].
    pub fn new(username: impl Into<String>) -> Self {
        Self { username: username.into(), current_channel: DEFAULT_CHANNEL.to_string() }
    }

    /// Channel the server last placed this session in.
    pub fn current_channel(&self) -> &str {
        &self.current_channel
    }

    /// Classify one inbound record. `now` is the current wall clock in unix
    /// seconds.
    ///
    /// - `SYN`: answers with an `ACK` (reply first, then a status update
    ///   carrying `round(now − probe time)`). The client never initiates a
    ///   probe.
    /// - `CHANNEL_CHANGE`: updates the channel, resetting to
    ///   [`DEFAULT_CHANNEL`] when the payload is absent. Consumed.
    /// - anything else: delivered for display.
    ///
    /// # Errors
    ///
    /// - [`DispatchError`] if a required field is missing or unusable.
    ///   Fatal for the connection, like a malformed frame.
    pub fn dispatch(
        &mut self,
        record: &WireMessage,
        now: f64,
    ) -> Result<Vec<DispatchAction>, DispatchError> {
        match record.message_type {
            MessageType::Syn => {
                let sent_at = require_time(record)?;
                let latency_secs = (now - sent_at).round() as i64;
                let clock = encode_time(now);

                Ok(vec![
                    DispatchAction::Reply(WireMessage::outbound(
                        MessageType::Ack,
                        clock.clone(),
                        clock,
                    )),
                    DispatchAction::Status {
                        latency_secs,
                        channel: self.current_channel.clone(),
                    },
                ])
            },

            MessageType::ChannelChange => {
                self.current_channel = match &record.message {
                    Some(channel) => channel.clone(),
                    None => DEFAULT_CHANNEL.to_string(),
                };
                Ok(vec![])
            },

            message_type => {
                let sender = record.sender.clone().ok_or(DispatchError::MissingField {
                    message_type,
                    field: "sender",
                })?;
                let body = record.message.clone().ok_or(DispatchError::MissingField {
                    message_type,
                    field: "message",
                })?;
                let timestamp = require_time(record)?;

                let is_self = sender == self.username;
                Ok(vec![DispatchAction::Deliver(ChatMessage {
                    sender,
                    body,
                    timestamp,
                    is_self,
                })])
            },
        }
    }
}

fn require_time(record: &WireMessage) -> Result<f64, DispatchError> {
    let time = record.time.as_deref().ok_or(DispatchError::MissingField {
        message_type: record.message_type,
        field: "time",
    })?;
    decode_time(time).ok_or_else(|| DispatchError::BadTimestamp {
        message_type: record.message_type,
        time: time.to_string(),
    })
}
