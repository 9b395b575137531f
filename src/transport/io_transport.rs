//! Transport over any tokio byte stream.

use std::{
    io,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
    sync::Mutex,
};

use super::{TransportReceiver, TransportSender};

/// Adapts an `AsyncRead + AsyncWrite` value (a `TcpStream`, a
/// `tokio::io::DuplexStream`, a named pipe) to both transport traits.
///
/// # Examples
///
/// ```
/// use streamwire::transport::{IoTransport, TransportSender};
///
/// # async fn demo() {
/// let (local, _remote) = tokio::io::duplex(1024);
/// let transport = IoTransport::new(local);
/// assert!(TransportSender::is_connected(&transport));
/// # }
/// ```
pub struct IoTransport<S> {
    reader: Mutex<ReadHalf<S>>,
    writer: Mutex<WriteHalf<S>>,
    connected: AtomicBool,
}

impl<S> IoTransport<S>
where
    S: AsyncRead + AsyncWrite,
{
    /// Split `stream` into independently locked halves.
    #[must_use]
    pub fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            connected: AtomicBool::new(true),
        }
    }

    fn connected(&self) -> bool { self.connected.load(Ordering::Acquire) }

    async fn shutdown(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.shutdown().await {
                log::debug!("error shutting down transport writer: {e}");
            }
        }
    }
}

#[async_trait]
impl<S> TransportSender for IoTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    fn is_connected(&self) -> bool { self.connected() }

    async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        if !self.connected() {
            return Err(io::ErrorKind::NotConnected.into());
        }
        let mut writer = self.writer.lock().await;
        writer.write_all(buf).await?;
        writer.flush().await?;
        Ok(buf.len())
    }

    async fn close(&self) { self.shutdown().await; }
}

#[async_trait]
impl<S> TransportReceiver for IoTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    fn is_connected(&self) -> bool { self.connected() }

    async fn receive(&self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.connected() {
            return Ok(0);
        }
        let mut reader = self.reader.lock().await;
        reader.read(buf).await
    }

    async fn close(&self) { self.shutdown().await; }
}
