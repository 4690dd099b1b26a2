use crate::trace::collector::ClientTrace;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Wraps the application-level stream of a connection and reports the first
/// read that yields response bytes.
///
/// It must sit above TLS so handshake records are never mistaken for
/// response data.
pub struct FirstByteStream<S> {
    inner: S,
    trace: Arc<dyn ClientTrace>,
    seen_first_byte: bool,
}

impl<S> FirstByteStream<S> {
    pub fn new(inner: S, trace: Arc<dyn ClientTrace>) -> Self {
        Self {
            inner,
            trace,
            seen_first_byte: false,
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for FirstByteStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = poll
            && !self.seen_first_byte
            && buf.filled().len() > before
        {
            self.seen_first_byte = true;
            self.trace.got_first_response_byte();
        }
        poll
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for FirstByteStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::collector::TraceCollector;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_first_byte_recorded_on_first_data() {
        let collector = Arc::new(TraceCollector::new());
        let (client, mut server) = tokio::io::duplex(64);
        let mut stream = FirstByteStream::new(client, collector.clone());

        stream.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        assert_eq!(collector.snapshot().first_response_byte, None);

        let mut request = [0u8; 18];
        server.read_exact(&mut request).await.unwrap();
        server.write_all(b"HTTP/1.1 200 OK\r\n").await.unwrap();

        let mut buf = [0u8; 8];
        stream.read_exact(&mut buf).await.unwrap();
        assert!(collector.snapshot().first_response_byte.is_some());
    }
}
