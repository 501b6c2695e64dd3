//! Byte-stream transport over an established connection.
//!
//! [`Transport`] is a thin wrapper: it reads bounded chunks and writes whole
//! payloads. Protocol logic (what a payload means) stays in
//! [`duet_core::Session`].
//!
//! The wrapper is generic over the stream so the same code runs over tokio
//! TCP in production and over simulated or in-memory streams in tests.

use std::{io, net::SocketAddr};

use bytes::{Bytes, BytesMut};
use duet_core::DEFAULT_READ_CHUNK_SIZE;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
    net::TcpStream,
};

/// One established duplex connection.
pub struct Transport<S = TcpStream> {
    stream: S,
    peer: SocketAddr,
    read_chunk_size: usize,
}

impl Transport<TcpStream> {
    /// Wrap an established TCP connection.
    ///
    /// Disables Nagle so each chat message leaves as soon as it is written.
    pub fn from_tcp(stream: TcpStream) -> io::Result<Self> {
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream, peer))
    }

    /// Local address of the connection.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite,
{
    /// Wrap any duplex stream connected to `peer`.
    pub fn new(stream: S, peer: SocketAddr) -> Self {
        Self { stream, peer, read_chunk_size: DEFAULT_READ_CHUNK_SIZE }
    }

    /// Change the maximum number of bytes taken per read.
    ///
    /// Zero is raised to one so a read can never be mistaken for a close.
    #[must_use]
    pub fn with_read_chunk_size(mut self, read_chunk_size: usize) -> Self {
        self.read_chunk_size = read_chunk_size.max(1);
        self
    }

    /// Remote address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Split into independently owned read and write halves.
    ///
    /// The halves can be used from different tasks so reads and writes never
    /// wait on each other. The connection closes once both are dropped.
    pub fn split(self) -> (TransportReader<ReadHalf<S>>, TransportWriter<WriteHalf<S>>) {
        let (read, write) = tokio::io::split(self.stream);
        let reader = TransportReader {
            inner: read,
            buffer: BytesMut::with_capacity(self.read_chunk_size),
            chunk_size: self.read_chunk_size,
        };
        (reader, TransportWriter { inner: write })
    }
}

/// Read half of a [`Transport`].
pub struct TransportReader<R> {
    inner: R,
    buffer: BytesMut,
    chunk_size: usize,
}

impl<R> TransportReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Read the next chunk of at most the configured chunk size.
    ///
    /// Returns only the bytes actually received. An empty chunk means the
    /// peer closed the stream.
    ///
    /// Cancel safe: if the future is dropped before completion no data has
    /// been consumed from the stream.
    pub async fn read_chunk(&mut self) -> io::Result<Bytes> {
        self.buffer.clear();
        self.buffer.resize(self.chunk_size, 0);

        let received = self.inner.read(&mut self.buffer[..]).await?;
        self.buffer.truncate(received);

        Ok(self.buffer.split().freeze())
    }
}

/// Write half of a [`Transport`].
pub struct TransportWriter<W> {
    inner: W,
}

impl<W> TransportWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Write the whole payload and flush it.
    pub async fn write_payload(&mut self, payload: &[u8]) -> io::Result<()> {
        self.inner.write_all(payload).await?;
        self.inner.flush().await
    }

    /// Send end-of-stream to the peer.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }
}
