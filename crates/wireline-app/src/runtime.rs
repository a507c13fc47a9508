//! Session lifecycle: connect, handshake, run the loops, shut down.
//!
//! One [`Runtime::run`] call is one complete session. The sequencing is
//! strict — limits record, then the login handshake, and only then do the
//! two loops exist:
//!
//! - the inbound loop reads records and executes dispatch actions,
//!   including `SYN`/`ACK` replies through the shared writer;
//! - the outbound loop turns input lines into `INFO` records.
//!
//! Termination is cooperative. Whichever loop observes a failure (or input
//! exhaustion) claims the shutdown through [`Session::begin_shutdown`] and
//! closes the writer; the peer tears the stream down in response, which
//! unblocks the other loop's pending read at its next iteration boundary.

use std::{
    collections::VecDeque,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use wireline_client::{
    DispatchAction, Dispatcher, Handshake, HandshakeAction, HandshakeState, Notice, RetryPolicy,
    Session,
};
use wireline_proto::{MessageType, ServerLimits, WireMessage, encode_time};

use crate::{
    driver::{CredentialSource, InputSource, Presenter},
    error::RuntimeError,
    transport::{self, BoxRead, BoxWrite, ConnectConfig, FrameReader, SharedWriter},
};

/// One chat session: owns the collaborators and drives the full lifecycle.
pub struct Runtime<P, I, C> {
    config: ConnectConfig,
    retry: RetryPolicy,
    presenter: P,
    input: I,
    credentials: C,
}

impl<P, I, C> Runtime<P, I, C>
where
    P: Presenter,
    I: InputSource,
    C: CredentialSource,
{
    /// Build a runtime with the default (immediate, unbounded) retry policy.
    pub fn new(config: ConnectConfig, presenter: P, input: I, credentials: C) -> Self {
        Self { config, retry: RetryPolicy::default(), presenter, input, credentials }
    }

    /// Replace the connect retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run one session to completion.
    ///
    /// Returns `Ok(())` when the session ends normally: input exhausted, or
    /// the server closed the stream after login.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::Transport`] if connecting, the limits record, or a
    ///   handshake send/receive fails.
    /// - [`RuntimeError::Handshake`] on a protocol violation during login.
    /// - [`RuntimeError::Banned`] if the server denies login with `BANNED`.
    /// - [`RuntimeError::LoginAborted`] if the credential source gives up.
    pub async fn run(mut self) -> Result<(), RuntimeError> {
        let (mut reader, writer) = transport::connect(&self.config, &self.retry).await?;

        // The limits record is unsolicited and always first; a close here is
        // a failed session, not a graceful end.
        let limits: ServerLimits = reader.receive().await?;
        tracing::debug!(
            username_length = limits.username_length,
            message_length = limits.message_length,
            "received server limits"
        );

        let session = Arc::new(Session::new());
        session.mark_connected();
        let writer = Arc::new(SharedWriter::new(writer));

        let username = match run_handshake(
            &mut reader,
            &writer,
            limits,
            &self.presenter,
            &mut self.credentials,
        )
        .await
        {
            Ok(username) => username,
            Err(error) => {
                shutdown(&session, &writer).await;
                return Err(error);
            },
        };

        session.mark_logged_in();
        tracing::info!(%username, "logged in");

        let dispatcher = Dispatcher::new(username);
        let inbound = tokio::spawn(inbound_loop(
            reader,
            dispatcher,
            Arc::clone(&writer),
            Arc::clone(&session),
            self.presenter.clone(),
        ));
        let outbound = tokio::spawn(outbound_loop(
            self.input,
            limits,
            Arc::clone(&writer),
            Arc::clone(&session),
            self.presenter.clone(),
        ));

        let (inbound, outbound) = tokio::join!(inbound, outbound);
        if let Err(error) = inbound {
            tracing::error!(%error, "inbound loop task failed");
        }
        if let Err(error) = outbound {
            tracing::error!(%error, "outbound loop task failed");
        }

        // Both loops are gone; make sure the close ran even if neither loop
        // got far enough to claim it.
        shutdown(&session, &writer).await;
        tracing::debug!("session ended");
        Ok(())
    }
}

/// Drive the handshake state machine until it reaches a terminal state,
/// executing its actions as they are emitted.
async fn run_handshake<P: Presenter, C: CredentialSource>(
    reader: &mut FrameReader<BoxRead>,
    writer: &SharedWriter<BoxWrite>,
    limits: ServerLimits,
    presenter: &P,
    credentials: &mut C,
) -> Result<String, RuntimeError> {
    let mut handshake = Handshake::new(limits);
    let mut pending: VecDeque<HandshakeAction> = VecDeque::new();

    while !handshake.is_terminal() {
        if pending.is_empty() {
            let record: WireMessage = reader.receive().await?;
            pending.extend(handshake.handle_record(&record)?);
        }

        while let Some(action) = pending.pop_front() {
            match action {
                HandshakeAction::PromptCredentials => {
                    let Some(pair) = credentials.credentials().await else {
                        return Err(RuntimeError::LoginAborted);
                    };
                    pending.extend(handshake.submit_credentials(pair)?);
                },
                HandshakeAction::SendCredentials(pair) => {
                    writer.send(&pair).await?;
                },
                HandshakeAction::Notice(notice) => presenter.notice(&notice),
                HandshakeAction::Close => {
                    // Terminal denial; the caller runs the actual shutdown.
                },
            }
        }
    }

    if handshake.state() != HandshakeState::LoggedIn {
        return Err(RuntimeError::Banned);
    }
    handshake.username().map(str::to_owned).ok_or(RuntimeError::LoginAborted)
}

/// Read records and execute dispatch actions until the session ends.
async fn inbound_loop<P: Presenter>(
    mut reader: FrameReader<BoxRead>,
    mut dispatcher: Dispatcher,
    writer: Arc<SharedWriter<BoxWrite>>,
    session: Arc<Session>,
    presenter: P,
) {
    while session.is_logged_in() {
        let record: WireMessage = match reader.receive().await {
            Ok(record) => record,
            Err(crate::error::TransportError::PeerClosed) => {
                tracing::debug!("server closed the connection");
                shutdown(&session, &writer).await;
                break;
            },
            Err(error) => {
                tracing::error!(%error, "inbound read failed");
                shutdown(&session, &writer).await;
                break;
            },
        };

        let actions = match dispatcher.dispatch(&record, unix_now()) {
            Ok(actions) => actions,
            Err(error) => {
                tracing::error!(%error, "unusable record");
                shutdown(&session, &writer).await;
                break;
            },
        };

        let mut failed = false;
        for action in actions {
            match action {
                DispatchAction::Reply(reply) => {
                    if let Err(error) = writer.send(&reply).await {
                        tracing::error!(%error, "reply send failed");
                        failed = true;
                        break;
                    }
                },
                DispatchAction::Status { latency_secs, channel } => {
                    presenter.status(latency_secs, &channel);
                },
                DispatchAction::Deliver(message) => presenter.deliver(&message),
            }
        }
        if failed {
            shutdown(&session, &writer).await;
            break;
        }
    }
}

/// Turn input lines into outbound chat records until input is exhausted or
/// the session ends.
async fn outbound_loop<P: Presenter, I: InputSource>(
    mut input: I,
    limits: ServerLimits,
    writer: Arc<SharedWriter<BoxWrite>>,
    session: Arc<Session>,
    presenter: P,
) {
    let message_max = limits.message_length as usize;

    while session.is_logged_in() {
        let Some(line) = input.next_line().await else {
            tracing::debug!("input exhausted");
            shutdown(&session, &writer).await;
            break;
        };

        // The wait for input may have outlived the session.
        if !session.is_logged_in() {
            break;
        }

        if line.chars().count() > message_max {
            presenter.notice(&Notice::MessageTooLong { max: limits.message_length });
            continue;
        }

        let record = WireMessage::outbound(MessageType::Info, line, encode_time(unix_now()));
        if let Err(error) = writer.send(&record).await {
            tracing::error!(%error, "chat send failed");
            shutdown(&session, &writer).await;
            break;
        }
    }
}

/// Claim the shutdown and close the writer. Safe to call from every exit
/// path; both halves are idempotent.
async fn shutdown(session: &Session, writer: &SharedWriter<BoxWrite>) {
    session.begin_shutdown();
    if writer.close().await {
        tracing::debug!("connection closed");
    }
}

/// Current wall clock as float unix seconds, the protocol's time base.
fn unix_now() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0.0, |d| d.as_secs_f64())
}
