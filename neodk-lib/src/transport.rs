//! Byte transport seam between the protocol engine and a serial link.

use crate::error::NeoError;
use bytes::{Bytes, BytesMut};
use std::future::Future;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const READ_CHUNK: usize = 256;

/// Receiving half of a transport.
pub trait TransportReader: Send {
    /// Next chunk of bytes, or `None` once the stream has ended.
    fn read(&mut self) -> impl Future<Output = Result<Option<Bytes>, NeoError>> + Send;
}

/// Sending half of a transport. Owned by exactly one writer task.
pub trait TransportWriter: Send {
    fn write(&mut self, frame: Bytes) -> impl Future<Output = Result<(), NeoError>> + Send;
}

/// Adapts a tokio `AsyncRead` into a [`TransportReader`].
pub struct IoReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R> IoReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }
}

impl<R: AsyncRead + Unpin + Send> TransportReader for IoReader<R> {
    async fn read(&mut self) -> Result<Option<Bytes>, NeoError> {
        self.buf.reserve(READ_CHUNK);
        let n = self.inner.read_buf(&mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(self.buf.split().freeze()))
    }
}

/// Adapts a tokio `AsyncWrite` into a [`TransportWriter`].
pub struct IoWriter<W> {
    inner: W,
}

impl<W> IoWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: AsyncWrite + Unpin + Send> TransportWriter for IoWriter<W> {
    async fn write(&mut self, frame: Bytes) -> Result<(), NeoError> {
        self.inner.write_all(&frame).await?;
        self.inner.flush().await?;
        Ok(())
    }
}
