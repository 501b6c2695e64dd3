//! Session layer state machine.
//!
//! Manages the lifecycle of one point-to-point chat connection: establishment
//! progress, the positional nickname handshake, the message exchange and the
//! terminal disconnect. Uses the action pattern: methods take inputs and
//! return actions for the driver to execute. The state machine performs no
//! I/O, which keeps it testable without sockets.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐ dial  ┌────────────┐ connected ┌───────────────────┐ nick ┌───────────┐
//! │ Idle │──────>│ Connecting │──────────>│ AwaitingHandshake │─────>│ Connected │
//! └──────┘       └────────────┘           └───────────────────┘      └───────────┘
//!                      │ refused                ^      │                   │
//!                      ↓                        │      │ close/error       │ close/error
//!                ┌───────────┐    accepted      │      ↓                   ↓
//!                │ Listening │──────────────────┘  ┌──────────────┐<──────┘
//!                └───────────┘                     │ Disconnected │
//!                      └──────────────────────────>└──────────────┘
//! ```
//!
//! `Disconnected` is terminal: every operation on a disconnected session is a
//! no-op that returns no actions.
//!
//! # Handshake
//!
//! Both sides send their nickname as the first payload. The first non-empty
//! payload received is the peer's nickname; every later payload is chat text.
//! There is no marker distinguishing the two, so a nickname and a first
//! message coalesced by TCP into one read are taken together as the nickname.

use std::net::SocketAddr;

use bytes::Bytes;

use crate::{
    endpoint::Endpoint,
    error::SessionError,
    event::{ChatEvent, DisconnectReason},
    wire,
};

/// Actions returned by the session state machine.
///
/// The driver executes these actions:
/// - `Send`: Write the bytes to the connection in one logical write
/// - `Emit`: Publish the event to the presentation layer
/// - `Close`: Close the connection and stop any listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Write this payload to the peer
    Send(Bytes),

    /// Publish this event
    Emit(ChatEvent),

    /// Release the connection handle (and listener, if any)
    Close,
}

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, nothing attempted yet
    Idle,
    /// Dialing the remote endpoint
    Connecting,
    /// Dial found no peer; waiting for one inbound connection
    Listening,
    /// Connection exists, peer nickname not yet received
    AwaitingHandshake,
    /// Handshake done, messages flow both ways
    Connected,
    /// Terminal state
    Disconnected,
}

impl SessionState {
    /// True once no further transition can happen.
    pub fn is_terminal(self) -> bool {
        self == Self::Disconnected
    }

    /// True while outgoing messages are accepted.
    pub fn can_send(self) -> bool {
        self == Self::Connected
    }

    /// True while a connection handle exists.
    pub fn has_connection(self) -> bool {
        matches!(self, Self::AwaitingHandshake | Self::Connected)
    }
}

/// Which side of the connection this session ended up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Dialed the peer
    Client,
    /// Accepted the peer on the fallback listener
    Server,
}

/// Session state machine
///
/// Tracks state, identities and the peer address for a single chat session.
///
/// This is a pure state machine - no sockets, no clocks, no channels.
#[derive(Debug, Clone)]
pub struct Session {
    /// Current state
    state: SessionState,
    /// Trimmed local nickname
    local_nick: String,
    /// Peer nickname, set once by the handshake
    remote_nick: Option<String>,
    /// Known after a connection exists
    role: Option<Role>,
    /// Remote address of the established connection
    peer: Option<SocketAddr>,
}

impl Session {
    /// Create a new session in [`SessionState::Idle`].
    ///
    /// # Errors
    ///
    /// - `SessionError::EmptyNickname` if `local_nick` is blank
    pub fn new(local_nick: &str) -> Result<Self, SessionError> {
        let local_nick = local_nick.trim();
        if local_nick.is_empty() {
            return Err(SessionError::EmptyNickname);
        }

        Ok(Self {
            state: SessionState::Idle,
            local_nick: local_nick.to_string(),
            remote_nick: None,
            role: None,
            peer: None,
        })
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Local nickname as sent in the handshake.
    pub fn local_nick(&self) -> &str {
        &self.local_nick
    }

    /// Peer nickname. `None` until the handshake completes.
    pub fn remote_nick(&self) -> Option<&str> {
        self.remote_nick.as_deref()
    }

    /// Connection role. `None` until a connection exists.
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Remote address. `None` until a connection exists.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Start dialing `remote`.
    ///
    /// Transitions to Connecting and emits a progress line.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if not in Idle state
    pub fn begin_dial(&mut self, remote: Endpoint) -> Result<Vec<SessionAction>, SessionError> {
        self.require(&[SessionState::Idle], "begin_dial")?;

        self.state = SessionState::Connecting;

        Ok(vec![SessionAction::Emit(ChatEvent::info(format!(
            "Attempting connection to {remote}."
        )))])
    }

    /// Dial found no peer; a listener is now bound on `local`.
    ///
    /// Transitions to Listening.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if not in Connecting state
    pub fn begin_listen(&mut self, local: SocketAddr) -> Result<Vec<SessionAction>, SessionError> {
        self.require(&[SessionState::Connecting], "begin_listen")?;

        self.state = SessionState::Listening;

        Ok(vec![
            SessionAction::Emit(ChatEvent::info("Could not connect to a peer.")),
            SessionAction::Emit(ChatEvent::info("Starting server.")),
            SessionAction::Emit(ChatEvent::info(format!("Server listening on {local}."))),
        ])
    }

    /// A connection to `peer` exists (dialed or accepted).
    ///
    /// Transitions to AwaitingHandshake and returns the nickname payload. The
    /// role follows from the previous state: Connecting means we dialed,
    /// Listening means we accepted.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if neither Connecting nor Listening
    pub fn connection_established(
        &mut self,
        peer: SocketAddr,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let role = match self.state {
            SessionState::Connecting => Role::Client,
            SessionState::Listening => Role::Server,
            state => {
                return Err(SessionError::InvalidState { state, operation: "connection_established" });
            },
        };

        self.role = Some(role);
        self.peer = Some(peer);
        self.state = SessionState::AwaitingHandshake;

        Ok(vec![SessionAction::Send(wire::encode_text(&self.local_nick))])
    }

    /// Process one payload read from the connection.
    ///
    /// An empty payload is a zero-byte read and is handled as a peer close.
    /// The first non-empty payload completes the handshake; later ones become
    /// [`ChatEvent::InboundMessage`]. Payloads arriving after disconnect are
    /// dropped.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if no connection exists yet
    pub fn handle_payload(&mut self, payload: &[u8]) -> Result<Vec<SessionAction>, SessionError> {
        if payload.is_empty() {
            return Ok(self.handle_peer_closed());
        }

        match self.state {
            SessionState::AwaitingHandshake => {
                let nick = wire::decode_text(payload);
                let peer = self.peer.map(|addr| addr.ip().to_string()).unwrap_or_default();
                let line = format!("Connected with {nick} ({peer})");

                self.remote_nick = Some(nick);
                self.state = SessionState::Connected;

                Ok(vec![SessionAction::Emit(ChatEvent::info(line))])
            },
            SessionState::Connected => {
                let from_nick = self.remote_nick.clone().unwrap_or_default();
                let text = wire::decode_text(payload);

                Ok(vec![SessionAction::Emit(ChatEvent::InboundMessage { from_nick, text })])
            },
            SessionState::Disconnected => Ok(vec![]),
            state => Err(SessionError::InvalidState { state, operation: "handle_payload" }),
        }
    }

    /// The peer closed the stream.
    ///
    /// Closing before the nickname arrived is reported as
    /// [`DisconnectReason::HandshakeIncomplete`]; otherwise as
    /// [`DisconnectReason::PeerClosed`].
    pub fn handle_peer_closed(&mut self) -> Vec<SessionAction> {
        let reason = match self.state {
            SessionState::Disconnected => return vec![],
            SessionState::AwaitingHandshake => DisconnectReason::HandshakeIncomplete,
            _ => DisconnectReason::PeerClosed,
        };

        self.terminate(reason)
    }

    /// A read or write on the connection failed.
    ///
    /// Errors after the session is already disconnected are the tail of a
    /// normal close and produce nothing.
    pub fn handle_stream_error(&mut self, error: &str) -> Vec<SessionAction> {
        if self.state.is_terminal() {
            return vec![];
        }

        self.terminate(DisconnectReason::StreamError(error.to_string()))
    }

    /// Submit outgoing text.
    ///
    /// Returns the local echo followed by the payload to write. Submissions
    /// while not Connected, and blank text, are ignored.
    pub fn submit(&mut self, text: &str) -> Vec<SessionAction> {
        if !self.state.can_send() || text.trim().is_empty() {
            return vec![];
        }

        vec![
            SessionAction::Emit(ChatEvent::OutboundEcho {
                from_nick: self.local_nick.clone(),
                text: text.to_string(),
            }),
            SessionAction::Send(wire::encode_text(text)),
        ]
    }

    /// Explicit stop.
    ///
    /// Idempotent: only the first call transitions and returns actions.
    pub fn disconnect(&mut self) -> Vec<SessionAction> {
        if self.state.is_terminal() {
            return vec![];
        }

        self.terminate(DisconnectReason::LocalRequest)
    }

    /// Single path into the terminal state.
    fn terminate(&mut self, reason: DisconnectReason) -> Vec<SessionAction> {
        self.state = SessionState::Disconnected;

        vec![
            SessionAction::Emit(ChatEvent::Disconnected { peer: self.peer, reason }),
            SessionAction::Close,
        ]
    }

    fn require(
        &self,
        allowed: &[SessionState],
        operation: &'static str,
    ) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidState { state: self.state, operation })
        }
    }
}
