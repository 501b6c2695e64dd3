//! End-to-end tests for chat sessions over loopback TCP.
//!
//! Each test reserves a free loopback port, so tests can run in parallel.

use std::{io, time::Duration};

use duet_core::{ChatEvent, ChatEventKind, DisconnectReason, Endpoint, Role, SessionState};
use duet_net::{ChatSession, EstablishError, SessionConfig};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    time::timeout,
};

const WAIT: Duration = Duration::from_secs(5);

/// Loopback endpoint on a port nobody is listening on.
async fn free_endpoint() -> Endpoint {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    Endpoint::from(listener.local_addr().unwrap())
}

async fn start(nick: &str, endpoint: Endpoint) -> ChatSession {
    ChatSession::start(SessionConfig::new(nick, endpoint, endpoint)).await.unwrap()
}

/// Skip events until one of `kind` arrives.
async fn next_of_kind(session: &mut ChatSession, kind: ChatEventKind) -> ChatEvent {
    timeout(WAIT, async {
        loop {
            match session.next_event().await {
                Some(event) if event.kind() == kind => return event,
                Some(_) => {},
                None => panic!("session ended before a {kind:?} event"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Every remaining event until the session's event stream ends.
async fn drain(session: &mut ChatSession) -> Vec<ChatEvent> {
    timeout(WAIT, async {
        let mut events = Vec::new();
        while let Some(event) = session.next_event().await {
            events.push(event);
        }
        events
    })
    .await
    .expect("timed out draining events")
}

async fn wait_connected(session: &ChatSession) {
    let status = timeout(WAIT, session.wait_for_state(SessionState::Connected)).await.unwrap();
    assert_eq!(status.state, SessionState::Connected);
}

#[tokio::test]
async fn alice_serves_bob_dials_and_they_chat() {
    let endpoint = free_endpoint().await;

    let mut alice = start("alice", endpoint).await;
    assert_eq!(alice.state(), SessionState::Listening);

    let mut bob = start("bob", endpoint).await;

    wait_connected(&bob).await;
    wait_connected(&alice).await;

    assert_eq!(alice.role(), Some(Role::Server));
    assert_eq!(bob.role(), Some(Role::Client));
    assert_eq!(alice.remote_nick().as_deref(), Some("bob"));
    assert_eq!(bob.remote_nick().as_deref(), Some("alice"));

    bob.submit_outgoing("hi");

    let echo = next_of_kind(&mut bob, ChatEventKind::OutboundEcho).await;
    assert_eq!(echo, ChatEvent::OutboundEcho { from_nick: "bob".into(), text: "hi".into() });

    let inbound = next_of_kind(&mut alice, ChatEventKind::InboundMessage).await;
    assert_eq!(inbound, ChatEvent::InboundMessage { from_nick: "bob".into(), text: "hi".into() });

    alice.request_disconnect();

    let closed = next_of_kind(&mut bob, ChatEventKind::Disconnected).await;
    assert!(matches!(closed, ChatEvent::Disconnected {
        peer: Some(_),
        reason: DisconnectReason::PeerClosed
    }));
    assert_eq!(bob.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn startup_events_describe_fallback() {
    let endpoint = free_endpoint().await;
    let mut alice = start("alice", endpoint).await;

    let mut texts = Vec::new();
    while let Some(event) = alice.try_next_event() {
        assert_eq!(event.kind(), ChatEventKind::Info);
        texts.push(event.text().into_owned());
    }

    assert_eq!(texts, vec![
        format!("Attempting connection to {endpoint}."),
        "Could not connect to a peer.".to_string(),
        "Starting server.".to_string(),
        format!("Server listening on {endpoint}."),
    ]);
}

#[tokio::test]
async fn listener_stops_after_first_peer() {
    let endpoint = free_endpoint().await;
    let alice = start("alice", endpoint).await;
    let bob = start("bob", endpoint).await;
    wait_connected(&alice).await;

    let second = TcpStream::connect(endpoint.socket_addr()).await;
    assert_eq!(second.unwrap_err().kind(), io::ErrorKind::ConnectionRefused);

    // The accepted conversation is unaffected
    assert_eq!(alice.state(), SessionState::Connected);
    drop(bob);
}

#[tokio::test]
async fn state_watch_follows_the_session() {
    let endpoint = free_endpoint().await;
    let alice = start("alice", endpoint).await;

    let mut status = alice.watch_state();
    assert_eq!(status.borrow().state, SessionState::Listening);
    assert_eq!(status.borrow().role, None);

    let bob = start("bob", endpoint).await;

    let connected = timeout(WAIT, status.wait_for(|s| s.state == SessionState::Connected))
        .await
        .unwrap()
        .unwrap()
        .clone();
    assert_eq!(connected.role, Some(Role::Server));
    assert_eq!(connected.remote_nick.as_deref(), Some("bob"));
    assert!(connected.peer.is_some());

    bob.request_disconnect();

    let ended = timeout(WAIT, status.wait_for(|s| s.state.is_terminal()))
        .await
        .unwrap()
        .unwrap()
        .clone();
    assert_eq!(ended.peer, connected.peer);
    assert_eq!(ended.remote_nick.as_deref(), Some("bob"));
}

#[tokio::test]
async fn dialing_a_listener_never_starts_a_local_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let remote = Endpoint::from(listener.local_addr().unwrap());
    let local = free_endpoint().await;

    let session = ChatSession::start(SessionConfig::new("bob", local, remote)).await.unwrap();

    // The listener never answers, so the handshake stays open
    let status =
        timeout(WAIT, session.wait_for_state(SessionState::AwaitingHandshake)).await.unwrap();
    assert_eq!(status.state, SessionState::AwaitingHandshake);
    assert_eq!(status.role, Some(Role::Client));
    assert_eq!(status.peer, Some(remote.socket_addr()));

    assert!(TcpListener::bind(local.socket_addr()).await.is_ok());
}

#[tokio::test]
async fn blank_nickname_is_rejected_before_dialing() {
    let endpoint = free_endpoint().await;

    let result = ChatSession::start(SessionConfig::new("   ", endpoint, endpoint)).await;
    assert!(matches!(result, Err(EstablishError::Session(_))));

    // Nothing was bound
    assert!(TcpListener::bind(endpoint.socket_addr()).await.is_ok());
}

#[tokio::test]
async fn listen_failure_is_returned_to_caller() {
    let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local = Endpoint::from(occupied.local_addr().unwrap());
    let remote = free_endpoint().await;

    let result = ChatSession::start(SessionConfig::new("alice", local, remote)).await;
    assert!(matches!(result, Err(EstablishError::Listen { .. })));
}

#[tokio::test]
async fn disconnect_while_listening_releases_port() {
    let endpoint = free_endpoint().await;
    let mut alice = start("alice", endpoint).await;

    alice.request_disconnect();

    let events = drain(&mut alice).await;
    assert_eq!(events.last(), Some(&ChatEvent::Disconnected {
        peer: None,
        reason: DisconnectReason::LocalRequest,
    }));
    assert_eq!(alice.state(), SessionState::Disconnected);

    assert!(TcpListener::bind(endpoint.socket_addr()).await.is_ok());
}

#[tokio::test]
async fn disconnect_twice_is_one_transition() {
    let endpoint = free_endpoint().await;
    let mut alice = start("alice", endpoint).await;
    let bob = start("bob", endpoint).await;
    wait_connected(&alice).await;

    alice.request_disconnect();
    alice.request_disconnect();

    let events = drain(&mut alice).await;
    let disconnects = events.iter().filter(|e| e.kind() == ChatEventKind::Disconnected).count();
    assert_eq!(disconnects, 1);

    // Calls after the task finished are silent no-ops
    alice.request_disconnect();
    alice.submit_outgoing("ignored");
    assert_eq!(alice.state(), SessionState::Disconnected);

    drop(bob);
}

#[tokio::test]
async fn submissions_before_handshake_are_ignored() {
    let endpoint = free_endpoint().await;
    let mut alice = start("alice", endpoint).await;

    alice.submit_outgoing("anyone there?");
    alice.request_disconnect();

    let events = drain(&mut alice).await;
    assert!(events.iter().all(|e| e.kind() != ChatEventKind::OutboundEcho));
}

#[tokio::test]
async fn nickname_is_first_raw_payload_on_the_wire() {
    let endpoint = free_endpoint().await;
    let mut alice = start("alice", endpoint).await;

    let mut raw = TcpStream::connect(endpoint.socket_addr()).await.unwrap();
    let mut buf = [0u8; 64];
    let n = timeout(WAIT, raw.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(&buf[..n], b"alice");

    raw.write_all(b"carol").await.unwrap();
    wait_connected(&alice).await;
    assert_eq!(alice.remote_nick().as_deref(), Some("carol"));

    raw.write_all("cześć".as_bytes()).await.unwrap();
    let inbound = next_of_kind(&mut alice, ChatEventKind::InboundMessage).await;
    assert_eq!(inbound, ChatEvent::InboundMessage {
        from_nick: "carol".into(),
        text: "cześć".into()
    });
}

#[tokio::test]
async fn outgoing_text_is_written_verbatim() {
    let endpoint = free_endpoint().await;
    let alice = start("alice", endpoint).await;

    let mut raw = TcpStream::connect(endpoint.socket_addr()).await.unwrap();
    let mut buf = [0u8; 64];
    let n = timeout(WAIT, raw.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(&buf[..n], b"alice");

    raw.write_all(b"dave").await.unwrap();
    wait_connected(&alice).await;

    alice.submit_outgoing("hello dave");
    let n = timeout(WAIT, raw.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(&buf[..n], b"hello dave");
}

#[tokio::test]
async fn peer_closing_before_nickname_is_handshake_incomplete() {
    let endpoint = free_endpoint().await;
    let mut alice = start("alice", endpoint).await;

    let mut raw = TcpStream::connect(endpoint.socket_addr()).await.unwrap();
    raw.shutdown().await.unwrap();

    let closed = next_of_kind(&mut alice, ChatEventKind::Disconnected).await;
    assert!(matches!(closed, ChatEvent::Disconnected {
        reason: DisconnectReason::HandshakeIncomplete,
        ..
    }));
    assert_eq!(alice.remote_nick(), None);

    // The nickname was still sent before the close was noticed
    let mut received = Vec::new();
    timeout(WAIT, raw.read_to_end(&mut received)).await.unwrap().unwrap();
    assert_eq!(received, b"alice");
}

#[tokio::test]
async fn long_payload_arrives_as_separate_chunks() {
    let endpoint = free_endpoint().await;
    let config = SessionConfig { read_chunk_size: 4, ..SessionConfig::new("alice", endpoint, endpoint) };
    let mut alice = ChatSession::start(config).await.unwrap();

    let mut raw = TcpStream::connect(endpoint.socket_addr()).await.unwrap();
    let mut buf = [0u8; 64];
    timeout(WAIT, raw.read(&mut buf)).await.unwrap().unwrap();

    raw.write_all(b"erin").await.unwrap();
    wait_connected(&alice).await;

    raw.write_all(b"abcdefgh").await.unwrap();

    let first = next_of_kind(&mut alice, ChatEventKind::InboundMessage).await;
    let second = next_of_kind(&mut alice, ChatEventKind::InboundMessage).await;
    assert_eq!(first.text(), "abcd");
    assert_eq!(second.text(), "efgh");
}

#[tokio::test]
async fn dropping_the_handle_disconnects() {
    let endpoint = free_endpoint().await;
    let alice = start("alice", endpoint).await;
    let mut bob = start("bob", endpoint).await;
    wait_connected(&bob).await;

    drop(alice);

    let closed = next_of_kind(&mut bob, ChatEventKind::Disconnected).await;
    assert!(matches!(closed, ChatEvent::Disconnected { reason: DisconnectReason::PeerClosed, .. }));
}
