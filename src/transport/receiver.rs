//! Inbound frame read loop.

use std::sync::{
    Arc,
    Mutex,
    atomic::{AtomicBool, Ordering},
};

use bytes::{Bytes, BytesMut};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info, warn};

use super::{DisconnectedEvent, DisconnectedHook, TransportError, TransportReceiver};
use crate::{
    header::{Header, MAX_HEADER_LENGTH, MAX_PAYLOAD_LENGTH},
    lock,
    metrics::{self, Direction},
    payload::PayloadStream,
};

/// Looks up the stream a frame's payload belongs to.
pub type GetStream = Box<dyn Fn(&Header) -> Option<PayloadStream> + Send + Sync>;
/// Consumes one decoded frame.
pub type ReceiveAction = Box<dyn Fn(&Header, Option<&PayloadStream>, Bytes) + Send + Sync>;

/// Callbacks a [`PayloadReceiver`] hands each frame to.
///
/// Both run once a whole frame has been read: `get_stream` first, then
/// `receive_action` with the stream it returned. Zero-length frames are
/// delivered too.
pub struct ReceiveSubscription {
    /// Resolve the destination stream for a header.
    pub get_stream: GetStream,
    /// Deliver the header, its stream and the payload bytes.
    pub receive_action: ReceiveAction,
}

struct Inner {
    subscription: Mutex<Option<Arc<ReceiveSubscription>>>,
    transport: Mutex<Option<Arc<dyn TransportReceiver>>>,
    on_disconnected: Mutex<Option<DisconnectedHook>>,
    bound: AtomicBool,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

/// Reads frames from a transport and dispatches them to a subscription.
#[derive(Clone)]
pub struct PayloadReceiver {
    inner: Arc<Inner>,
}

impl Default for PayloadReceiver {
    fn default() -> Self { Self::new() }
}

impl PayloadReceiver {
    /// Create an unbound receiver.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                subscription: Mutex::new(None),
                transport: Mutex::new(None),
                on_disconnected: Mutex::new(None),
                bound: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// Install the callbacks frames are dispatched to, replacing any earlier
    /// subscription.
    pub fn subscribe(&self, subscription: ReceiveSubscription) {
        *lock(&self.inner.subscription) = Some(Arc::new(subscription));
    }

    /// Register the hook fired once when this receiver disconnects.
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

    /// Bind `transport` and start the read loop.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AlreadyConnected`] if a transport was bound
    /// before.
    pub fn connect(&self, transport: Arc<dyn TransportReceiver>) -> Result<(), TransportError> {
        if self.inner.bound.swap(true, Ordering::AcqRel) {
            return Err(TransportError::AlreadyConnected);
        }
        *lock(&self.inner.transport) = Some(transport.clone());
        self.inner
            .tracker
            .spawn(read_loop(self.inner.clone(), transport));
        self.inner.tracker.close();
        debug!("payload receiver connected");
        Ok(())
    }

    /// Close the transport and stop the read loop.
    ///
    /// Idempotent: only the first call closes the transport and fires the
    /// disconnection hook.
    pub async fn disconnect(&self, reason: Option<String>) { self.inner.disconnect(reason).await; }

    /// Wait until the read loop has exited.
    pub async fn wait_closed(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
    }
}

impl Inner {
    async fn disconnect(&self, reason: Option<String>) {
        self.shutdown.cancel();
        let transport = lock(&self.transport).take();
        let Some(transport) = transport else {
            return;
        };
        transport.close().await;
        info!(reason = reason.as_deref().unwrap_or("none"), "payload receiver disconnected");
        let hook = lock(&self.on_disconnected).clone();
        if let Some(hook) = hook {
            hook(DisconnectedEvent::new(reason));
        }
    }
}

async fn read_loop(inner: Arc<Inner>, transport: Arc<dyn TransportReceiver>) {
    let reason = loop {
        let frame = tokio::select! {
            biased;
            () = inner.shutdown.cancelled() => return,
            frame = read_frame(transport.as_ref()) => frame,
        };
        match frame {
            Ok(Some((header, payload))) => {
                metrics::inc_frames(Direction::Inbound);
                dispatch(&inner, &header, payload);
            }
            Ok(None) => break "transport closed by peer".to_owned(),
            Err(e) => {
                warn!(error = %e, "failed to read frame");
                metrics::inc_errors(Direction::Inbound);
                break e.to_string();
            }
        }
    };
    inner.disconnect(Some(reason)).await;
}

fn dispatch(inner: &Inner, header: &Header, payload: Bytes) {
    let subscription = lock(&inner.subscription).clone();
    let Some(subscription) = subscription else {
        debug!(id = %header.id, "no subscription; dropping frame");
        return;
    };
    let stream = (subscription.get_stream)(header);
    (subscription.receive_action)(header, stream.as_ref(), payload);
}

/// Read one header and its payload. `Ok(None)` means the peer closed the
/// channel cleanly between frames.
async fn read_frame(
    transport: &dyn TransportReceiver,
) -> Result<Option<(Header, Bytes)>, TransportError> {
    let mut header_buf = [0u8; MAX_HEADER_LENGTH];
    let read = read_exact(transport, &mut header_buf).await?;
    if read == 0 {
        return Ok(None);
    }
    if read < MAX_HEADER_LENGTH {
        return Err(TransportError::Truncated {
            expected: MAX_HEADER_LENGTH,
            received: read,
        });
    }
    let header = Header::decode(&header_buf)?;
    if header.payload_length > MAX_PAYLOAD_LENGTH {
        return Err(TransportError::PayloadTooLarge(header.payload_length));
    }
    if header.payload_length == 0 {
        return Ok(Some((header, Bytes::new())));
    }
    let mut payload = BytesMut::zeroed(header.payload_length);
    let read = read_exact(transport, &mut payload).await?;
    if read < header.payload_length {
        return Err(TransportError::Truncated {
            expected: header.payload_length,
            received: read,
        });
    }
    Ok(Some((header, payload.freeze())))
}

/// Fill `buf`, returning fewer bytes only if the channel closes first.
async fn read_exact(
    transport: &dyn TransportReceiver,
    buf: &mut [u8],
) -> Result<usize, TransportError> {
    let mut filled = 0;
    while filled < buf.len() {
        match transport.receive(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
