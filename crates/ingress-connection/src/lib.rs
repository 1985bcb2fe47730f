//! Public connection handling for the ingress dispatcher
//!
//! A [`PublicConnection`] owns one accepted byte stream from the internet
//! (plain TCP or already TLS-terminated). It carries a short id tagged with
//! its direction (`pub:1a2b3c4d`) so every log line about it can be
//! correlated. Bytes consumed while inspecting the request can be pushed back
//! with [`PublicConnection::unread`], so whoever takes ownership next reads
//! the stream from its first byte.
//!
//! The underlying socket is released exactly once: when the connection is
//! dropped, whichever task owns it at that point.

pub mod stream;

pub use bytes::Bytes;
pub use stream::{AsyncStream, BoxedStream, PrefixedStream};

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tracing::debug;

/// Direction tag for connections accepted from the public internet
pub const PUBLIC_TAG: &str = "pub";

/// Short, log-friendly connection identifier (`<tag>:<8 hex digits>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(tag: &str) -> Self {
        Self(format!("{}:{:08x}", tag, rand::random::<u32>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Direction tag this id was created with
    pub fn tag(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One inbound connection from the public internet
pub struct PublicConnection {
    id: ConnectionId,
    peer_addr: Option<SocketAddr>,
    stream: PrefixedStream<BoxedStream>,
}

impl PublicConnection {
    /// Wrap an accepted stream
    pub fn new<S>(stream: S, peer_addr: Option<SocketAddr>) -> Self
    where
        S: AsyncStream + 'static,
    {
        let id = ConnectionId::new(PUBLIC_TAG);
        debug!(conn = %id, peer = ?peer_addr, "New connection");
        Self {
            id,
            peer_addr,
            stream: PrefixedStream::new(Box::new(stream)),
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Push already-consumed bytes back so they are read again first
    pub fn unread(&mut self, data: Bytes) {
        self.stream.unread(data);
    }

    /// Bytes pending replay before the socket is read again
    pub fn buffered(&self) -> &[u8] {
        self.stream.pending()
    }

    /// Flush and shut down the write side, then release the connection
    pub async fn close(mut self) {
        if let Err(e) = self.stream.flush().await {
            debug!(conn = %self.id, "Flush on close failed: {}", e);
        }
        if let Err(e) = self.stream.shutdown().await {
            debug!(conn = %self.id, "Shutdown on close failed: {}", e);
        }
    }
}

impl Drop for PublicConnection {
    fn drop(&mut self) {
        debug!(conn = %self.id, "Closing");
    }
}

impl fmt::Debug for PublicConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicConnection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("buffered", &self.stream.pending().len())
            .finish()
    }
}

impl AsyncRead for PublicConnection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for PublicConnection {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, data)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_connection_id_format() {
        let id = ConnectionId::new(PUBLIC_TAG);
        assert_eq!(id.tag(), "pub");
        assert_eq!(id.as_str().len(), "pub:".len() + 8);
        assert!(id.as_str()[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_public_connection_replays_unread_bytes() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut conn = PublicConnection::new(server, None);
        assert_eq!(conn.id().tag(), "pub");

        conn.unread(Bytes::from_static(b"GET / HTTP/1.1\r\n"));
        assert_eq!(conn.buffered().len(), 16);

        client.write_all(b"Host: a\r\n\r\n").await.unwrap();
        drop(client);

        let mut out = Vec::new();
        conn.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"GET / HTTP/1.1\r\nHost: a\r\n\r\n");
    }

    #[tokio::test]
    async fn test_close_signals_eof_to_peer() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut conn = PublicConnection::new(server, None);
        conn.write_all(b"bye").await.unwrap();
        conn.close().await;

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"bye");
    }
}
