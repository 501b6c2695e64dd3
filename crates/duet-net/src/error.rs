//! Establishment error types.

use std::{io, net::SocketAddr};

use duet_core::SessionError;
use thiserror::Error;

/// Errors that end a session attempt before it is handed to the caller, or
/// that end a pending accept.
///
/// A dial that finds no listener is not an error: it triggers the fallback
/// to listening and is only logged.
#[derive(Debug, Error)]
pub enum EstablishError {
    /// Session parameters were rejected (blank nickname, bad transition).
    #[error("session rejected: {0}")]
    Session(#[from] SessionError),

    /// Dial failed for a reason other than "no listener at the target".
    ///
    /// Fatal for this attempt; no fallback to listening.
    #[error("failed to connect to {addr}: {source}")]
    Dial {
        /// Target address
        addr: SocketAddr,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },

    /// Fallback listener could not be bound (port in use, permission).
    #[error("failed to listen on {addr}: {source}")]
    Listen {
        /// Local bind address
        addr: SocketAddr,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },

    /// Listener failed while waiting for the peer.
    #[error("failed to accept a connection on {addr}: {source}")]
    Accept {
        /// Local bind address
        addr: SocketAddr,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },
}

/// True if a dial error means nobody is listening at the target.
///
/// These errors send the establisher to the server fallback. A timeout only
/// appears when a connect timeout is configured and counts as unreachable.
pub fn is_no_listener(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::TimedOut
    )
}
