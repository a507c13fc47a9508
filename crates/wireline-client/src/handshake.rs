//! Login handshake state machine.
//!
//! Driven entirely by inbound records; the client never sends an unsolicited
//! handshake message, and there is deliberately no timeout — the machine
//! waits as long as the server does.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────────────────┐  REQUEST LOGIN   ┌───────────────────────┐
//! │ AwaitingLoginRequest │─────────────────>│ SubmittingCredentials │
//! └──────────────────────┘                  └───────────────────────┘
//!        ▲       ▲                            │ submit_credentials
//!        │       │ DENY LENGTH/TAKEN          ▼
//!        │       │                  ┌──────────────────┐  PERMIT LOGIN   ┌──────────┐
//!        │       └──────────────────│ AwaitingDecision │────────────────>│ LoggedIn │
//!        │                          └──────────────────┘                 └──────────┘
//!        │                               │ DENY BANNED / violation
//!        │                               ▼
//!        │                          ┌─────────┐
//!        └─ (fresh attempt)         │ Aborted │
//!                                   └─────────┘
//! ```
//!
//! Credential entry is asynchronous for the caller, so `REQUEST LOGIN`
//! yields [`HandshakeAction::PromptCredentials`]; the driver gathers the
//! pair and feeds it back through [`Handshake::submit_credentials`].

use thiserror::Error;
use wireline_proto::{Credentials, MessageType, ServerLimits, WireMessage, directive};

use crate::event::Notice;

/// Actions returned by the handshake state machine for the driver to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeAction {
    /// Ask the credential collaborator for a username/password pair, then
    /// call [`Handshake::submit_credentials`].
    PromptCredentials,

    /// Send this credentials record to the server.
    SendCredentials(Credentials),

    /// Surface a user-visible notice.
    Notice(Notice),

    /// Close the connection. Emitted only on terminal denial.
    Close,
}

/// Handshake phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Waiting for the server's `REQUEST LOGIN`.
    AwaitingLoginRequest,
    /// Prompt issued; waiting for the driver to submit credentials.
    SubmittingCredentials,
    /// Credentials sent; waiting for the server's verdict.
    AwaitingDecision,
    /// Terminal success.
    LoggedIn,
    /// Terminal failure (ban or protocol violation).
    Aborted,
}

/// Errors that end the handshake.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// The server sent a record the current state has no transition for.
    #[error("protocol violation: unexpected {message_type:?} record in state {state:?}")]
    ProtocolViolation {
        /// State when the record arrived.
        state: HandshakeState,
        /// Tag of the offending record.
        message_type: MessageType,
    },

    /// A driver call arrived in a state that does not accept it.
    #[error("invalid state: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state.
        state: HandshakeState,
        /// Operation that was attempted.
        operation: &'static str,
    },
}

/// Server-driven login negotiation.
///
/// Created fresh per connection attempt, after the limits record has been
/// received. Pure: all I/O is delegated to the caller via
/// [`HandshakeAction`]s.
#[derive(Debug, Clone)]
pub struct Handshake {
    state: HandshakeState,
    limits: ServerLimits,
    username: Option<String>,
}

impl Handshake {
    /// Create a new handshake in [`HandshakeState::AwaitingLoginRequest`].
    pub fn new(limits: ServerLimits) -> Self {
        Self { state: HandshakeState::AwaitingLoginRequest, limits, username: None }
    }

    /// Current phase.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Whether the machine has reached `LoggedIn` or `Aborted`.
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, HandshakeState::LoggedIn | HandshakeState::Aborted)
    }

    /// Username accepted (or pending a verdict). `None` before the first
    /// submission and after a recoverable denial.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Process one inbound record.
    ///
    /// # Errors
    ///
    /// - [`HandshakeError::ProtocolViolation`] for any record the table has
    ///   no transition for. The machine moves to `Aborted`; the caller is
    ///   responsible for the shutdown.
    pub fn handle_record(
        &mut self,
        record: &WireMessage,
    ) -> Result<Vec<HandshakeAction>, HandshakeError> {
        let payload = record.message.as_deref();

        match (self.state, record.message_type, payload) {
            (
                HandshakeState::AwaitingLoginRequest,
                MessageType::Request,
                Some(directive::LOGIN),
            ) => {
                self.state = HandshakeState::SubmittingCredentials;
                Ok(vec![HandshakeAction::PromptCredentials])
            },

            (HandshakeState::AwaitingDecision, MessageType::Permit, Some(directive::LOGIN)) => {
                self.state = HandshakeState::LoggedIn;
                Ok(vec![])
            },

            (HandshakeState::AwaitingDecision, MessageType::Deny, Some(directive::BANNED)) => {
                self.state = HandshakeState::Aborted;
                Ok(vec![HandshakeAction::Notice(Notice::Banned), HandshakeAction::Close])
            },

            (HandshakeState::AwaitingDecision, MessageType::Deny, Some(directive::LENGTH)) => {
                // Recoverable: wait for the server's next REQUEST LOGIN.
                self.state = HandshakeState::AwaitingLoginRequest;
                self.username = None;
                Ok(vec![HandshakeAction::Notice(Notice::UsernameTooLong {
                    max: self.limits.username_length,
                })])
            },

            (HandshakeState::AwaitingDecision, MessageType::Deny, Some(directive::TAKEN)) => {
                self.state = HandshakeState::AwaitingLoginRequest;
                let name = self.username.take().unwrap_or_default();
                Ok(vec![HandshakeAction::Notice(Notice::UsernameTaken { name })])
            },

            (state, message_type, _) => {
                self.state = HandshakeState::Aborted;
                Err(HandshakeError::ProtocolViolation { state, message_type })
            },
        }
    }

    /// Feed back the credentials gathered after
    /// [`HandshakeAction::PromptCredentials`].
    ///
    /// Retains the username for the session's is-self classification; the
    /// password leaves scope with the returned send action.
    ///
    /// # Errors
    ///
    /// - [`HandshakeError::InvalidState`] unless the machine is in
    ///   `SubmittingCredentials`.
    pub fn submit_credentials(
        &mut self,
        credentials: Credentials,
    ) -> Result<Vec<HandshakeAction>, HandshakeError> {
        if self.state != HandshakeState::SubmittingCredentials {
            return Err(HandshakeError::InvalidState {
                state: self.state,
                operation: "submit_credentials",
            });
        }

        self.state = HandshakeState::AwaitingDecision;
        self.username = Some(credentials.username.clone());
        Ok(vec![HandshakeAction::SendCredentials(credentials)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ServerLimits {
        ServerLimits { username_length: 20, message_length: 200 }
    }

    fn record(message_type: MessageType, message: &str) -> WireMessage {
        WireMessage {
            message_type,
            message: Some(message.to_string()),
            sender: None,
            time: None,
        }
    }

    fn creds(username: &str) -> Credentials {
        Credentials { username: username.to_string(), password: "x".to_string() }
    }

    #[test]
    fn permit_completes_login() {
        let mut hs = Handshake::new(limits());
        assert_eq!(hs.state(), HandshakeState::AwaitingLoginRequest);

        let actions = hs.handle_record(&record(MessageType::Request, directive::LOGIN)).unwrap();
        assert_eq!(actions, vec![HandshakeAction::PromptCredentials]);
        assert_eq!(hs.state(), HandshakeState::SubmittingCredentials);

        let actions = hs.submit_credentials(creds("bob")).unwrap();
        assert_eq!(actions, vec![HandshakeAction::SendCredentials(creds("bob"))]);
        assert_eq!(hs.state(), HandshakeState::AwaitingDecision);

        let actions = hs.handle_record(&record(MessageType::Permit, directive::LOGIN)).unwrap();
        assert!(actions.is_empty());
        assert_eq!(hs.state(), HandshakeState::LoggedIn);
        assert!(hs.is_terminal());
        assert_eq!(hs.username(), Some("bob"));
    }

    #[test]
    fn banned_is_terminal_and_closes() {
        let mut hs = Handshake::new(limits());
        hs.handle_record(&record(MessageType::Request, directive::LOGIN)).unwrap();
        hs.submit_credentials(creds("bob")).unwrap();

        let actions = hs.handle_record(&record(MessageType::Deny, directive::BANNED)).unwrap();
        assert_eq!(
            actions,
            vec![HandshakeAction::Notice(Notice::Banned), HandshakeAction::Close]
        );
        assert_eq!(hs.state(), HandshakeState::Aborted);
        assert!(hs.is_terminal());
    }

    #[test]
    fn length_denial_reports_limit_and_loops() {
        let mut hs = Handshake::new(limits());
        hs.handle_record(&record(MessageType::Request, directive::LOGIN)).unwrap();
        hs.submit_credentials(creds("a_very_long_username_indeed")).unwrap();

        let actions = hs.handle_record(&record(MessageType::Deny, directive::LENGTH)).unwrap();
        assert_eq!(actions, vec![HandshakeAction::Notice(Notice::UsernameTooLong { max: 20 })]);
        assert_eq!(hs.state(), HandshakeState::AwaitingLoginRequest);
        assert_eq!(hs.username(), None);
    }

    #[test]
    fn taken_denial_reports_name_and_loops() {
        let mut hs = Handshake::new(limits());
        hs.handle_record(&record(MessageType::Request, directive::LOGIN)).unwrap();
        hs.submit_credentials(creds("bob")).unwrap();

        let actions = hs.handle_record(&record(MessageType::Deny, directive::TAKEN)).unwrap();
        assert_eq!(
            actions,
            vec![HandshakeAction::Notice(Notice::UsernameTaken { name: "bob".to_string() })]
        );
        assert_eq!(hs.state(), HandshakeState::AwaitingLoginRequest);

        // A fresh REQUEST LOGIN prompts again.
        let actions = hs.handle_record(&record(MessageType::Request, directive::LOGIN)).unwrap();
        assert_eq!(actions, vec![HandshakeAction::PromptCredentials]);
    }

    #[test]
    fn unexpected_record_aborts() {
        let mut hs = Handshake::new(limits());
        let err = hs.handle_record(&record(MessageType::Info, "hello")).unwrap_err();
        assert_eq!(
            err,
            HandshakeError::ProtocolViolation {
                state: HandshakeState::AwaitingLoginRequest,
                message_type: MessageType::Info,
            }
        );
        assert_eq!(hs.state(), HandshakeState::Aborted);
    }

    #[test]
    fn permit_before_submission_aborts() {
        let mut hs = Handshake::new(limits());
        let err = hs.handle_record(&record(MessageType::Permit, directive::LOGIN)).unwrap_err();
        assert!(matches!(err, HandshakeError::ProtocolViolation { .. }));
        assert_eq!(hs.state(), HandshakeState::Aborted);
    }

    #[test]
    fn submit_outside_prompt_is_invalid() {
        let mut hs = Handshake::new(limits());
        let err = hs.submit_credentials(creds("bob")).unwrap_err();
        assert_eq!(
            err,
            HandshakeError::InvalidState {
                state: HandshakeState::AwaitingLoginRequest,
                operation: "submit_credentials",
            }
        );
    }
}
