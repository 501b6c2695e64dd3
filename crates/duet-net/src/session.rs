//! Chat session runtime.
//!
//! Wraps the Sans-IO [`duet_core::Session`] with real I/O. One task per
//! session drives establishment and the receive loop; a second task owns the
//! write half so reads and writes never wait on each other. Every state
//! transition goes through the core state machine and is published on a
//! watch channel; events go out on an unbounded mpsc channel created before
//! the first dial, so nothing emitted during establishment is lost.
//!
//! # Cancellation
//!
//! A disconnect request races the pending accept or read. Whichever wins, the
//! listener or read half is dropped, which closes the handle and releases the
//! port. The writer drains what was already queued and then shuts down the
//! write side, so the peer observes a clean end-of-stream.
//!
//! The drain is bounded by [`WRITER_DRAIN_TIMEOUT`]. The session reports
//! Disconnected immediately; only the final release of the socket waits for
//! the queue, and a writer stuck behind a stalled peer is aborted when the
//! bound expires.

use std::{io, net::SocketAddr, time::Duration};

use bytes::Bytes;
use duet_core::{
    ChatEvent, DEFAULT_READ_CHUNK_SIZE, Endpoint, Role, Session, SessionAction, SessionState,
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::{mpsc, watch},
    task::JoinHandle,
};

use crate::{
    error::EstablishError,
    establish::{ConnectionEstablisher, Establishment, PendingAccept},
    transport::{Transport, TransportWriter},
};

/// Time the writer gets to flush queued payloads after a disconnect.
pub const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Parameters for [`ChatSession::start`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Nickname sent in the handshake. Trimmed; must not be blank.
    pub local_nick: String,
    /// Where the fallback listener binds
    pub local: Endpoint,
    /// Where to dial first
    pub remote: Endpoint,
    /// Bound on the dial attempt. `None` leaves it to the OS.
    pub connect_timeout: Option<Duration>,
    /// Maximum bytes taken per read
    pub read_chunk_size: usize,
}

impl SessionConfig {
    /// Configuration with default timeout and chunk size.
    pub fn new(local_nick: impl Into<String>, local: Endpoint, remote: Endpoint) -> Self {
        Self {
            local_nick: local_nick.into(),
            local,
            remote,
            connect_timeout: None,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

/// Observable snapshot of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Current state
    pub state: SessionState,
    /// Role, once a connection exists
    pub role: Option<Role>,
    /// Peer nickname, once the handshake is done
    pub remote_nick: Option<String>,
    /// Remote address, once a connection exists
    pub peer: Option<SocketAddr>,
}

impl From<&Session> for SessionStatus {
    fn from(session: &Session) -> Self {
        Self {
            state: session.state(),
            role: session.role(),
            remote_nick: session.remote_nick().map(str::to_string),
            peer: session.peer_addr(),
        }
    }
}

/// Requests from the handle to the session task.
#[derive(Debug)]
enum Command {
    Submit(String),
    Disconnect,
}

/// Handle to a running chat session.
///
/// Dropping the handle disconnects the session.
pub struct ChatSession {
    commands: mpsc::UnboundedSender<Command>,
    events: mpsc::UnboundedReceiver<ChatEvent>,
    status: watch::Receiver<SessionStatus>,
    task: JoinHandle<()>,
}

impl ChatSession {
    /// Start a session: dial, or fall back to listening.
    ///
    /// Returns once the session is connected as a client or is listening as
    /// a server; accepting the peer, the handshake and the message loop run
    /// in the background.
    ///
    /// # Errors
    ///
    /// - `EstablishError::Session` if the nickname is blank
    /// - `EstablishError::Dial` if the target is invalid or unusable
    /// - `EstablishError::Listen` if the fallback listener cannot be bound
    pub async fn start(config: SessionConfig) -> Result<Self, EstablishError> {
        let session = Session::new(&config.local_nick)?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SessionStatus::from(&session));
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let mut driver = SessionDriver { session, events: event_tx, status: status_tx, outgoing: None };

        let actions = driver.session.begin_dial(config.remote)?;
        driver.execute(actions);

        let establisher = ConnectionEstablisher::new().with_connect_timeout(config.connect_timeout);
        let establishment = establisher.start(config.local, config.remote).await?;

        if let Establishment::Listening(pending) = &establishment {
            let actions = driver.session.begin_listen(pending.local_addr())?;
            driver.execute(actions);
        }

        let task = tokio::spawn(run_session(driver, establishment, command_rx, config.read_chunk_size));

        Ok(Self { commands: command_tx, events: event_rx, status: status_rx, task })
    }

    /// Submit outgoing text.
    ///
    /// Ignored unless the session is Connected. The local echo is emitted as
    /// soon as the session task sees the submission, before the write
    /// completes.
    pub fn submit_outgoing(&self, text: impl Into<String>) {
        if self.commands.send(Command::Submit(text.into())).is_err() {
            tracing::debug!("Session finished, dropping submission");
        }
    }

    /// Close the connection (or stop listening). Idempotent.
    pub fn request_disconnect(&self) {
        if self.commands.send(Command::Disconnect).is_err() {
            tracing::debug!("Session already finished");
        }
    }

    /// Next chat event. `None` once the session has ended and every event
    /// was delivered.
    pub async fn next_event(&mut self) -> Option<ChatEvent> {
        self.events.recv().await
    }

    /// Next chat event if one is already queued.
    pub fn try_next_event(&mut self) -> Option<ChatEvent> {
        self.events.try_recv().ok()
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.status.borrow().state
    }

    /// Current snapshot.
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every status change.
    pub fn watch_state(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Role, once a connection exists.
    pub fn role(&self) -> Option<Role> {
        self.status.borrow().role
    }

    /// Peer nickname, once the handshake is done.
    pub fn remote_nick(&self) -> Option<String> {
        self.status.borrow().remote_nick.clone()
    }

    /// Wait until the session reaches `state` or ends.
    ///
    /// Returns the status at that point.
    pub async fn wait_for_state(&self, state: SessionState) -> SessionStatus {
        let mut status = self.status.clone();
        if status.wait_for(|s| s.state == state || s.state.is_terminal()).await.is_err() {
            tracing::debug!("Session task finished while waiting for {:?}", state);
        }

        status.borrow().clone()
    }

    /// Wait for the session task to finish.
    pub async fn closed(self) {
        let Self { commands, task, .. } = self;
        drop(commands);

        if let Err(e) = task.await {
            tracing::warn!("Session task failed: {}", e);
        }
    }
}

/// Owns the state machine and executes its actions.
struct SessionDriver {
    session: Session,
    events: mpsc::UnboundedSender<ChatEvent>,
    status: watch::Sender<SessionStatus>,
    outgoing: Option<mpsc::UnboundedSender<Bytes>>,
}

impl SessionDriver {
    /// Execute session actions and publish the resulting status.
    fn execute(&mut self, actions: Vec<SessionAction>) {
        for action in actions {
            match action {
                SessionAction::Send(payload) => match &self.outgoing {
                    Some(outgoing) => {
                        tracing::debug!("Queueing {} byte payload", payload.len());
                        if outgoing.send(payload).is_err() {
                            tracing::debug!("Writer finished, payload dropped");
                        }
                    },
                    None => tracing::warn!("Send action without an open connection"),
                },

                SessionAction::Emit(event) => {
                    if self.events.send(event).is_err() {
                        tracing::debug!("Event receiver dropped");
                    }
                },

                SessionAction::Close => {
                    // Writer drains its queue, then shuts down the stream
                    self.outgoing = None;
                },
            }
        }

        self.publish();
    }

    fn publish(&self) {
        let next = SessionStatus::from(&self.session);
        self.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }

            if current.state != next.state {
                tracing::info!(from = ?current.state, to = ?next.state, "Session state changed");
            }
            *current = next;
            true
        });
    }

    fn stream_failed(&mut self, error: &str) {
        let actions = self.session.handle_stream_error(error);
        self.execute(actions);
    }
}

/// Session task: accept (if listening), then run the message loop.
async fn run_session(
    mut driver: SessionDriver,
    establishment: Establishment,
    mut commands: mpsc::UnboundedReceiver<Command>,
    read_chunk_size: usize,
) {
    let transport = match establishment {
        Establishment::Dialed(transport) => transport,
        Establishment::Listening(pending) => {
            match accept_or_cancel(&mut driver, pending, &mut commands).await {
                Some(transport) => transport,
                None => return,
            }
        },
    };

    run_connected(driver, transport.with_read_chunk_size(read_chunk_size), commands).await;
}

/// Wait for the single peer while still honouring commands.
///
/// Returns `None` if the session ended before a peer arrived.
async fn accept_or_cancel(
    driver: &mut SessionDriver,
    pending: PendingAccept,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> Option<Transport> {
    let local = pending.local_addr();
    let accept = pending.accept_one();
    tokio::pin!(accept);

    loop {
        tokio::select! {
            accepted = &mut accept => match accepted {
                Ok(transport) => return Some(transport),
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    driver.stream_failed(&e.to_string());
                    return None;
                },
            },

            command = commands.recv() => match command {
                Some(Command::Submit(text)) => {
                    let actions = driver.session.submit(&text);
                    driver.execute(actions);
                },
                Some(Command::Disconnect) | None => {
                    tracing::info!("Stopped listening on {}", local);
                    let actions = driver.session.disconnect();
                    driver.execute(actions);
                    return None;
                },
            },
        }
    }
}

/// Handshake and message loop over an established connection.
async fn run_connected<S>(
    mut driver: SessionDriver,
    transport: Transport<S>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let peer = transport.peer_addr();
    let (mut reader, writer) = transport.split();

    let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
    let mut writer_task = tokio::spawn(write_loop(writer, outgoing_rx));
    let mut writer_done = false;
    driver.outgoing = Some(outgoing_tx);

    match driver.session.connection_established(peer) {
        Ok(actions) => driver.execute(actions),
        Err(e) => {
            tracing::error!("Connection to {} rejected by session: {}", peer, e);
            driver.stream_failed(&e.to_string());
        },
    }

    while !driver.session.state().is_terminal() {
        tokio::select! {
            read = reader.read_chunk() => {
                let actions = match read {
                    Ok(payload) => {
                        tracing::debug!("Received {} bytes from {}", payload.len(), peer);
                        match driver.session.handle_payload(&payload) {
                            Ok(actions) => actions,
                            Err(e) => driver.session.handle_stream_error(&e.to_string()),
                        }
                    },
                    Err(e) => {
                        tracing::warn!("Read from {} failed: {}", peer, e);
                        driver.session.handle_stream_error(&e.to_string())
                    },
                };
                driver.execute(actions);
            },

            command = commands.recv() => {
                let actions = match command {
                    Some(Command::Submit(text)) => driver.session.submit(&text),
                    Some(Command::Disconnect) | None => driver.session.disconnect(),
                };
                driver.execute(actions);
            },

            written = &mut writer_task, if !writer_done => {
                writer_done = true;
                match written {
                    Ok(Ok(())) => {},
                    Ok(Err(e)) => {
                        tracing::warn!("Write to {} failed: {}", peer, e);
                        driver.stream_failed(&e.to_string());
                    },
                    Err(e) => driver.stream_failed(&format!("writer task failed: {e}")),
                }
            },
        }
    }

    drop(reader);
    driver.outgoing = None;

    if !writer_done {
        let abort = writer_task.abort_handle();
        match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer_task).await {
            Ok(Ok(Ok(()))) => {},
            Ok(Ok(Err(e))) => tracing::debug!("Writer closed with error after disconnect: {}", e),
            Ok(Err(e)) => tracing::debug!("Writer task ended abnormally: {}", e),
            Err(_) => {
                tracing::warn!("Writer did not drain within {:?}, aborting", WRITER_DRAIN_TIMEOUT);
                abort.abort();
            },
        }
    }

    tracing::info!("Session with {} closed", peer);
}

/// Write queued payloads in order, one write per payload.
async fn write_loop<W>(
    mut writer: TransportWriter<W>,
    mut outgoing: mpsc::UnboundedReceiver<Bytes>,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(payload) = outgoing.recv().await {
        writer.write_payload(&payload).await?;
    }

    writer.shutdown().await
}
