//! End-to-end drive of the handshake and dispatcher state machines,
//! following the records a real server session produces.

use wireline_client::{
    DispatchAction, Dispatcher, Handshake, HandshakeAction, HandshakeState, Notice,
};
use wireline_proto::{Credentials, MessageType, ServerLimits, WireMessage, directive};

fn record(message_type: MessageType, message: &str) -> WireMessage {
    WireMessage { message_type, message: Some(message.to_string()), sender: None, time: None }
}

#[test]
fn full_login_then_chat_session() {
    // Server sent {username_length: 20, message_length: 200} on connect.
    let limits = ServerLimits { username_length: 20, message_length: 200 };
    let mut handshake = Handshake::new(limits);

    // REQUEST LOGIN -> prompt -> submit bob/x -> send credentials.
    let actions =
        handshake.handle_record(&record(MessageType::Request, directive::LOGIN)).unwrap();
    assert_eq!(actions, vec![HandshakeAction::PromptCredentials]);

    let credentials = Credentials { username: "bob".to_string(), password: "x".to_string() };
    let actions = handshake.submit_credentials(credentials.clone()).unwrap();
    assert_eq!(actions, vec![HandshakeAction::SendCredentials(credentials)]);

    // PERMIT LOGIN completes the handshake.
    let actions = handshake.handle_record(&record(MessageType::Permit, directive::LOGIN)).unwrap();
    assert!(actions.is_empty());
    assert_eq!(handshake.state(), HandshakeState::LoggedIn);
    assert_eq!(handshake.username(), Some("bob"));

    // The dispatcher takes over with the accepted username.
    let mut dispatcher = Dispatcher::new(handshake.username().unwrap());

    let chat = WireMessage {
        message_type: MessageType::Info,
        message: Some("welcome".to_string()),
        sender: Some("Server".to_string()),
        time: Some("1000.0".to_string()),
    };
    let actions = dispatcher.dispatch(&chat, 1001.0).unwrap();
    assert!(matches!(&actions[0], DispatchAction::Deliver(msg) if !msg.is_self));

    let own_echo = WireMessage {
        message_type: MessageType::Info,
        message: Some("hi".to_string()),
        sender: Some("bob".to_string()),
        time: Some("1002.0".to_string()),
    };
    let actions = dispatcher.dispatch(&own_echo, 1002.5).unwrap();
    assert!(matches!(&actions[0], DispatchAction::Deliver(msg) if msg.is_self));
}

#[test]
fn taken_username_loops_until_permit() {
    let limits = ServerLimits { username_length: 20, message_length: 200 };
    let mut handshake = Handshake::new(limits);

    handshake.handle_record(&record(MessageType::Request, directive::LOGIN)).unwrap();
    handshake
        .submit_credentials(Credentials { username: "bob".into(), password: "x".into() })
        .unwrap();

    let actions = handshake.handle_record(&record(MessageType::Deny, directive::TAKEN)).unwrap();
    assert_eq!(
        actions,
        vec![HandshakeAction::Notice(Notice::UsernameTaken { name: "bob".to_string() })]
    );
    assert!(!handshake.is_terminal());

    // The server repeats its REQUEST; the second identity goes through.
    handshake.handle_record(&record(MessageType::Request, directive::LOGIN)).unwrap();
    handshake
        .submit_credentials(Credentials { username: "bob2".into(), password: "x".into() })
        .unwrap();
    handshake.handle_record(&record(MessageType::Permit, directive::LOGIN)).unwrap();

    assert_eq!(handshake.state(), HandshakeState::LoggedIn);
    assert_eq!(handshake.username(), Some("bob2"));
}
