//! Byte stream that replays a buffered prefix before reading from its inner stream

use bytes::{Buf, Bytes, BytesMut};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Any bidirectional byte stream that can be owned by a connection task
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Type-erased stream (plain TCP, TLS, in-memory duplex in tests)
pub type BoxedStream = Box<dyn AsyncStream>;

/// Stream wrapper that yields `prefix` before any bytes from `inner`.
///
/// Writes always go straight to `inner`.
pub struct PrefixedStream<S> {
    inner: S,
    prefix: Bytes,
}

impl<S> PrefixedStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            prefix: Bytes::new(),
        }
    }

    /// Push bytes back in front of whatever is still pending.
    pub fn unread(&mut self, data: Bytes) {
        if data.is_empty() {
            return;
        }
        if self.prefix.is_empty() {
            self.prefix = data;
            return;
        }
        let mut joined = BytesMut::with_capacity(data.len() + self.prefix.len());
        joined.extend_from_slice(&data);
        joined.extend_from_slice(&self.prefix);
        self.prefix = joined.freeze();
    }

    /// Bytes that will be returned by the next reads before touching `inner`
    pub fn pending(&self) -> &[u8] {
        &self.prefix
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for PrefixedStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if !self.prefix.is_empty() {
            let n = self.prefix.len().min(buf.remaining());
            buf.put_slice(&self.prefix[..n]);
            self.prefix.advance(n);
            return Poll::Ready(Ok(()));
        }

        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for PrefixedStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, data)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
