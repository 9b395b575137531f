//! Byte transports and the frame-level sender and receiver built on them.
//!
//! A connection talks to its peer through a [`TransportSender`] and a
//! [`TransportReceiver`]. Concrete channels (TCP sockets, named pipes,
//! WebSocket adapters) implement these traits; [`IoTransport`] covers any
//! tokio `AsyncRead + AsyncWrite` value.

use std::{io, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::header::HeaderError;

pub mod io_transport;
pub mod receiver;
pub mod sender;

pub use io_transport::IoTransport;
pub use receiver::{PayloadReceiver, ReceiveSubscription};
pub use sender::{PayloadSender, SentCallback};

/// Outbound half of a byte channel.
#[async_trait]
pub trait TransportSender: Send + Sync + 'static {
    /// Whether the channel can still accept writes.
    fn is_connected(&self) -> bool;

    /// Write some bytes from `buf`, returning how many were written.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised by the underlying channel.
    async fn send(&self, buf: &[u8]) -> io::Result<usize>;

    /// Close the channel. Further sends fail.
    async fn close(&self);
}

/// Inbound half of a byte channel.
#[async_trait]
pub trait TransportReceiver: Send + Sync + 'static {
    /// Whether the channel can still deliver bytes.
    fn is_connected(&self) -> bool;

    /// Read some bytes into `buf`, returning how many were read. Zero
    /// signals the peer closed the channel.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised by the underlying channel.
    async fn receive(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Close the channel. Further receives return zero or fail.
    async fn close(&self);
}

/// Details passed to a disconnection hook.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DisconnectedEvent {
    /// Human readable cause, when one is known.
    pub reason: Option<String>,
}

impl DisconnectedEvent {
    /// Build an event carrying `reason`.
    #[must_use]
    pub fn new(reason: Option<String>) -> Self { Self { reason } }
}

/// Callback fired once when a sender or receiver disconnects.
pub type DisconnectedHook = Arc<dyn Fn(DisconnectedEvent) + Send + Sync>;

/// Errors surfaced to code queueing outbound frames.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SendError {
    /// The sender was disconnected before the frame was written.
    #[error("payload sender disconnected")]
    Disconnected,
    /// The outbound queue no longer accepts packets.
    #[error("send queue closed")]
    QueueClosed,
    /// The payload exceeds what one frame may carry.
    #[error("payload of {0} bytes exceeds the frame limit")]
    PayloadTooLarge(usize),
    /// A JSON header payload could not be serialized.
    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors raised by the frame sender and receiver.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TransportError {
    /// A transport is already bound.
    #[error("transport already connected")]
    AlreadyConnected,
    /// The peer closed the channel in the middle of a frame.
    #[error("transport closed after {received} of {expected} bytes")]
    Truncated {
        /// Bytes the frame required.
        expected: usize,
        /// Bytes actually read before the channel closed.
        received: usize,
    },
    /// A frame declared a payload longer than one frame may carry.
    #[error("payload length {0} exceeds the frame limit")]
    PayloadTooLarge(usize),
    /// The header bytes were malformed.
    #[error("invalid header: {0}")]
    Header(#[from] HeaderError),
    /// The underlying channel failed.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
}
