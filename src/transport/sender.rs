//! Outbound frame queue and drain task.
//!
//! [`PayloadSender`] serializes every outbound frame through one bounded
//! queue. A single drain task writes each packet's header and payload
//! back-to-back before taking the next packet, so frames from concurrent
//! producers never interleave on the wire.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info};

use super::{DisconnectedEvent, DisconnectedHook, SendError, TransportError, TransportSender};
use crate::{
    header::{Header, MAX_HEADER_LENGTH, MAX_PAYLOAD_LENGTH},
    lock,
    metrics::{self, Direction},
};

/// Callback invoked with the header once its frame has been written.
pub type SentCallback = Box<dyn FnOnce(Header) + Send>;

struct Packet {
    header: Header,
    payload: Bytes,
    sent: Option<SentCallback>,
}

struct Inner {
    queue: mpsc::Sender<Packet>,
    pending: Mutex<Option<mpsc::Receiver<Packet>>>,
    transport: Mutex<Option<Arc<dyn TransportSender>>>,
    on_disconnected: Mutex<Option<DisconnectedHook>>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

/// Cloneable handle to the outbound frame queue of one connection.
#[derive(Clone)]
pub struct PayloadSender {
    inner: Arc<Inner>,
}

impl PayloadSender {
    /// Create a sender whose queue holds at most `capacity` packets.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (queue, rx) = mpsc::channel(capacity);
        Self {
            inner: Arc::new(Inner {
                queue,
                pending: Mutex::new(Some(rx)),
                transport: Mutex::new(None),
                on_disconnected: Mutex::new(None),
                shutdown: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// Register the hook fired once when this sender disconnects.
    pub fn set_on_disconnected(&self, hook: DisconnectedHook) {
        *lock(&self.inner.on_disconnected) = Some(hook);
    }

    /// Whether a transport is bound and still reports itself connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        lock(&self.inner.transport)
            .as_ref()
            .is_some_and(|t| t.is_connected())
    }

    /// Bind `transport` and start draining the queue.
    ///
    /// Packets queued before this call are written once the drain task
    /// starts.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AlreadyConnected`] if a transport was bound
    /// before, including one that has since disconnected.
    pub fn connect(&self, transport: Arc<dyn TransportSender>) -> Result<(), TransportError> {
        let rx = lock(&self.inner.pending)
            .take()
            .ok_or(TransportError::AlreadyConnected)?;
        *lock(&self.inner.transport) = Some(transport.clone());
        let inner = self.inner.clone();
        self.inner.tracker.spawn(drain(inner, transport, rx));
        self.inner.tracker.close();
        debug!("payload sender connected");
        Ok(())
    }

    /// Queue one frame.
    ///
    /// `header.payload_length` is taken from `payload`. When
    /// `is_length_known` is false the end flag is derived from the payload
    /// being empty. `sent` runs after the frame is written; it is dropped
    /// without running if the sender disconnects first.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::PayloadTooLarge`] for payloads longer than one
    /// frame, [`SendError::Disconnected`] once the sender has disconnected,
    /// and [`SendError::QueueClosed`] if the drain task is gone.
    pub async fn send_payload(
        &self,
        mut header: Header,
        payload: impl Into<Bytes>,
        is_length_known: bool,
        sent: Option<SentCallback>,
    ) -> Result<(), SendError> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_LENGTH {
            return Err(SendError::PayloadTooLarge(payload.len()));
        }
        if self.inner.shutdown.is_cancelled() {
            return Err(SendError::Disconnected);
        }
        header.payload_length = payload.len();
        if !is_length_known {
            header.end = payload.is_empty();
        }
        let packet = Packet {
            header,
            payload,
            sent,
        };
        self.inner.queue.send(packet).await.map_err(|_| {
            if self.inner.shutdown.is_cancelled() {
                SendError::Disconnected
            } else {
                SendError::QueueClosed
            }
        })
    }

    /// Close the transport and stop the drain task.
    ///
    /// Idempotent: only the first call closes the transport and fires the
    /// disconnection hook.
    pub async fn disconnect(&self, reason: Option<String>) { self.inner.disconnect(reason).await; }

    /// Wait until the drain task has exited.
    pub async fn wait_closed(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
    }
}

impl Inner {
    async fn disconnect(&self, reason: Option<String>) {
        self.shutdown.cancel();
        // Packets queued before connect are released with the receiver.
        drop(lock(&self.pending).take());
        let transport = lock(&self.transport).take();
        let Some(transport) = transport else {
            return;
        };
        transport.close().await;
        info!(reason = reason.as_deref().unwrap_or("none"), "payload sender disconnected");
        let hook = lock(&self.on_disconnected).clone();
        if let Some(hook) = hook {
            hook(DisconnectedEvent::new(reason));
        }
    }
}

async fn drain(inner: Arc<Inner>, transport: Arc<dyn TransportSender>, mut rx: mpsc::Receiver<Packet>) {
    loop {
        let packet = tokio::select! {
            biased;
            () = inner.shutdown.cancelled() => break,
            packet = rx.recv() => match packet {
                Some(packet) => packet,
                None => break,
            },
        };
        if let Err(e) = write_frame(transport.as_ref(), &packet.header, &packet.payload).await {
            error!(
                error = %e,
                id = %packet.header.id,
                payload_type = %packet.header.payload_type,
                "failed to write frame"
            );
            metrics::inc_errors(Direction::Outbound);
            inner.disconnect(Some(e.to_string())).await;
            break;
        }
        metrics::inc_frames(Direction::Outbound);
        if let Some(sent) = packet.sent {
            sent(packet.header);
        }
    }
    rx.close();
    let mut dropped = 0usize;
    while rx.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        debug!(dropped, "dropped queued frames after disconnect");
    }
}

/// Write one header and its payload.
///
/// Borrows the parts, never the whole [`Packet`]: its sent callback is not
/// `Sync`.
async fn write_frame(
    transport: &dyn TransportSender,
    header: &Header,
    payload: &Bytes,
) -> std::io::Result<()> {
    let mut buf = [0u8; MAX_HEADER_LENGTH];
    header.encode(&mut buf).map_err(std::io::Error::other)?;
    write_all(transport, &buf).await?;
    if !payload.is_empty() {
        write_all(transport, payload).await?;
    }
    Ok(())
}

async fn write_all(transport: &dyn TransportSender, mut buf: &[u8]) -> std::io::Result<()> {
    while !buf.is_empty() {
        match transport.send(buf).await? {
            0 => return Err(std::io::ErrorKind::WriteZero.into()),
            n => buf = &buf[n..],
        }
    }
    Ok(())
}
