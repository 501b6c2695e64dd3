//! Chat events.
//!
//! [`ChatEvent`] is everything a front-end needs to render the conversation:
//! informational lines, messages in both directions, and the final
//! disconnect. Events are produced in order of occurrence and never revised.

use std::{borrow::Cow, fmt, net::SocketAddr};

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Peer closed the stream (zero-byte read).
    PeerClosed,
    /// Stream closed before the peer sent its nickname.
    HandshakeIncomplete,
    /// Local side asked to disconnect.
    LocalRequest,
    /// Read or write failed while the connection was open.
    StreamError(String),
}

impl DisconnectReason {
    /// True unless the stream failed.
    pub fn is_graceful(&self) -> bool {
        matches!(self, Self::PeerClosed | Self::LocalRequest | Self::HandshakeIncomplete)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "peer closed the connection"),
            Self::HandshakeIncomplete => write!(f, "connection closed before handshake"),
            Self::LocalRequest => write!(f, "disconnected locally"),
            Self::StreamError(msg) => write!(f, "stream error: {msg}"),
        }
    }
}

/// Tag of a [`ChatEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatEventKind {
    /// Informational line.
    Info,
    /// Message from the peer.
    InboundMessage,
    /// Local echo of a submitted message.
    OutboundEcho,
    /// Session ended.
    Disconnected,
}

/// Events surfaced to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Informational line (connection progress, peer identity).
    Info {
        /// Human-readable text.
        text: String,
    },

    /// Chat text received from the peer.
    InboundMessage {
        /// Peer nickname captured during the handshake.
        from_nick: String,
        /// Decoded message text.
        text: String,
    },

    /// Chat text submitted locally, echoed into the log on submission.
    OutboundEcho {
        /// Local nickname.
        from_nick: String,
        /// Submitted text.
        text: String,
    },

    /// Session reached its terminal state.
    Disconnected {
        /// Remote address, if a connection existed.
        peer: Option<SocketAddr>,
        /// Why the session ended.
        reason: DisconnectReason,
    },
}

impl ChatEvent {
    /// Informational event.
    pub fn info(text: impl Into<String>) -> Self {
        Self::Info { text: text.into() }
    }

    /// Event tag.
    pub fn kind(&self) -> ChatEventKind {
        match self {
            Self::Info { .. } => ChatEventKind::Info,
            Self::InboundMessage { .. } => ChatEventKind::InboundMessage,
            Self::OutboundEcho { .. } => ChatEventKind::OutboundEcho,
            Self::Disconnected { .. } => ChatEventKind::Disconnected,
        }
    }

    /// Author of the line, if it has one.
    pub fn from_nick(&self) -> Option<&str> {
        match self {
            Self::InboundMessage { from_nick, .. } | Self::OutboundEcho { from_nick, .. } => {
                Some(from_nick)
            },
            Self::Info { .. } | Self::Disconnected { .. } => None,
        }
    }

    /// Display text of the line.
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Self::Info { text }
            | Self::InboundMessage { text, .. }
            | Self::OutboundEcho { text, .. } => Cow::Borrowed(text),
            Self::Disconnected { peer: Some(peer), reason: DisconnectReason::StreamError(msg) } => {
                Cow::Owned(format!("Connection to {} lost: {msg}", peer.ip()))
            },
            Self::Disconnected { peer: Some(peer), .. } => {
                Cow::Owned(format!("Disconnected from {}", peer.ip()))
            },
            Self::Disconnected { peer: None, reason } => Cow::Owned(format!("Disconnected: {reason}")),
        }
    }
}
