//! Fuzz target for the chat session state machine
//!
//! Feed arbitrary stream input into an established session
//!
//! # Strategy
//!
//! - Payloads: Random bytes, including invalid UTF-8 and empty reads
//! - Stream events: Peer close and stream errors at any point
//! - Local input: Submissions and disconnects interleaved with reads
//!
//! # Invariants
//!
//! - The first payload is the nickname, never chat text
//! - At most one Disconnected event, always followed by Close
//! - Nothing is sent before the handshake or after the session ended
//! - Disconnected is terminal
//! - NEVER panic on any input sequence

#![no_main]

use arbitrary::Arbitrary;
use duet_core::{ChatEvent, Endpoint, Session, SessionAction, SessionState};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum StreamOp {
    Payload(Vec<u8>),
    PeerClosed,
    StreamError(String),
    Submit(String),
    Disconnect,
}

#[derive(Debug, Clone, Arbitrary)]
struct Scenario {
    nick: String,
    as_server: bool,
    ops: Vec<StreamOp>,
}

fuzz_target!(|scenario: Scenario| {
    let Ok(mut session) = Session::new(&scenario.nick) else {
        assert!(scenario.nick.trim().is_empty());
        return;
    };

    let remote = Endpoint::loopback();
    let _ = session.begin_dial(remote);
    if scenario.as_server {
        let _ = session.begin_listen(remote.socket_addr());
    }

    let actions = session.connection_established(remote.socket_addr()).unwrap_or_default();
    assert!(matches!(actions.as_slice(), [SessionAction::Send(_)]));

    let mut disconnects = 0;

    for op in scenario.ops {
        let before = session.state();

        let actions = match op {
            StreamOp::Payload(bytes) => session.handle_payload(&bytes).unwrap_or_default(),
            StreamOp::PeerClosed => session.handle_peer_closed(),
            StreamOp::StreamError(msg) => session.handle_stream_error(&msg),
            StreamOp::Submit(text) => session.submit(&text),
            StreamOp::Disconnect => session.disconnect(),
        };

        for (i, action) in actions.iter().enumerate() {
            match action {
                SessionAction::Send(_) => assert_eq!(before, SessionState::Connected),
                SessionAction::Emit(ChatEvent::InboundMessage { .. }) => {
                    assert_eq!(before, SessionState::Connected);
                },
                SessionAction::Emit(ChatEvent::Disconnected { .. }) => {
                    disconnects += 1;
                    assert!(matches!(actions.get(i + 1), Some(SessionAction::Close)));
                },
                SessionAction::Emit(_) | SessionAction::Close => {},
            }
        }

        if before == SessionState::Disconnected {
            assert!(actions.is_empty());
        }
    }

    assert!(disconnects <= 1);
});
