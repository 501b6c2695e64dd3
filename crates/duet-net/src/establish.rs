//! Connection establishment.
//!
//! Decides whether this process is the client or the server of a session:
//! dial the remote endpoint first, and only when nobody is listening there
//! bind the local endpoint and wait for exactly one peer.
//!
//! Establishment is split in two so the caller never blocks on the accept:
//! [`ConnectionEstablisher::start`] returns as soon as the dial succeeded or
//! the listener is bound, and [`PendingAccept::accept_one`] is awaited
//! separately (typically on a background task).

use std::{io, net::SocketAddr, time::Duration};

use duet_core::{Endpoint, Role};
use tokio::net::{TcpListener, TcpStream};

use crate::{
    error::{EstablishError, is_no_listener},
    transport::Transport,
};

/// Outcome of the first establishment phase.
pub enum Establishment {
    /// Dial succeeded; we are the client.
    Dialed(Transport),
    /// Nobody was listening at the target; we are listening instead.
    Listening(PendingAccept),
}

impl Establishment {
    /// Role this establishment leads to.
    pub fn role(&self) -> Role {
        match self {
            Self::Dialed(_) => Role::Client,
            Self::Listening(_) => Role::Server,
        }
    }
}

/// A bound listener waiting for its single peer.
///
/// Dropping it closes the listener and releases the port immediately.
pub struct PendingAccept {
    listener: TcpListener,
    local: SocketAddr,
}

impl PendingAccept {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Accept exactly one inbound connection.
    ///
    /// Consumes the listener: it is closed as soon as the peer is accepted,
    /// so a second peer is refused by the OS.
    pub async fn accept_one(self) -> Result<Transport, EstablishError> {
        let local = self.local;
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|source| EstablishError::Accept { addr: local, source })?;

        drop(self.listener);
        tracing::info!("Accepted connection from {} on {}", peer, local);

        Transport::from_tcp(stream).map_err(|source| EstablishError::Accept { addr: local, source })
    }
}

/// Resolves one active connection for a session.
#[derive(Debug, Clone, Default)]
pub struct ConnectionEstablisher {
    connect_timeout: Option<Duration>,
}

impl ConnectionEstablisher {
    /// Establisher without a connect timeout (OS defaults apply).
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the dial attempt. A dial that times out counts as "no listener".
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Dial `remote`, falling back to listening on `local`.
    ///
    /// Only one of dialing and listening is ever active: the listener is
    /// bound after the dial has failed, never speculatively.
    ///
    /// # Errors
    ///
    /// - `EstablishError::Dial` if the dial failed for a reason other than
    ///   "nobody listening"
    /// - `EstablishError::Listen` if the fallback listener cannot be bound
    pub async fn start(
        &self,
        local: Endpoint,
        remote: Endpoint,
    ) -> Result<Establishment, EstablishError> {
        let remote_addr = remote.socket_addr();

        tracing::info!("Dialing {}", remote_addr);

        match self.dial(remote_addr).await {
            Ok(stream) => {
                let transport = Transport::from_tcp(stream)
                    .map_err(|source| EstablishError::Dial { addr: remote_addr, source })?;
                tracing::info!(
                    local = ?transport.local_addr().ok(),
                    "Connected to {} as client",
                    transport.peer_addr()
                );
                Ok(Establishment::Dialed(transport))
            },
            Err(e) if is_no_listener(&e) => {
                tracing::info!("No peer at {} ({}), falling back to server", remote_addr, e);
                let pending = self.listen(local).await?;
                Ok(Establishment::Listening(pending))
            },
            Err(source) => Err(EstablishError::Dial { addr: remote_addr, source }),
        }
    }

    /// Resolve a connection completely, waiting for the peer if we end up
    /// listening.
    ///
    /// # Errors
    ///
    /// Everything [`start`](Self::start) returns, plus
    /// `EstablishError::Accept` if the listener fails.
    pub async fn establish(
        &self,
        local: Endpoint,
        remote: Endpoint,
    ) -> Result<(Role, Transport), EstablishError> {
        match self.start(local, remote).await? {
            Establishment::Dialed(transport) => Ok((Role::Client, transport)),
            Establishment::Listening(pending) => Ok((Role::Server, pending.accept_one().await?)),
        }
    }

    async fn dial(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        match self.connect_timeout {
            None => TcpStream::connect(addr).await,
            Some(limit) => tokio::time::timeout(limit, TcpStream::connect(addr))
                .await
                .map_err(|_| {
                    io::Error::new(io::ErrorKind::TimedOut, format!("connect timed out after {limit:?}"))
                })?,
        }
    }

    async fn listen(&self, local: Endpoint) -> Result<PendingAccept, EstablishError> {
        let addr = local.socket_addr();
        let listener =
            TcpListener::bind(addr).await.map_err(|source| EstablishError::Listen { addr, source })?;
        let local = listener.local_addr().map_err(|source| EstablishError::Listen { addr, source })?;

        tracing::info!("Listening on {}", local);

        Ok(PendingAccept { listener, local })
    }
}
