//! A streaming connection over one duplex transport.
//!
//! [`StreamingConnection`] owns a [`PayloadSender`], a [`PayloadReceiver`]
//! and a [`ProtocolAdapter`]. Both sides of a conversation use the same
//! type: each can send requests and each answers the requests it receives
//! through its [`RequestHandler`].

use std::{
    sync::{
        Arc,
        Mutex,
        Weak,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::StreamingConfig,
    error::ConnectionError,
    lock,
    message::{ReceiveResponse, StreamingRequest},
    metrics,
    protocol::{ProtocolAdapter, RequestHandler},
    transport::{
        DisconnectedEvent,
        DisconnectedHook,
        IoTransport,
        PayloadReceiver,
        PayloadSender,
        TransportReceiver,
        TransportSender,
    },
};

type Transports = (Arc<dyn TransportSender>, Arc<dyn TransportReceiver>);

struct Inner {
    sender: PayloadSender,
    receiver: PayloadReceiver,
    adapter: ProtocolAdapter,
    config: StreamingConfig,
    transports: Mutex<Option<Transports>>,
    on_disconnected: Mutex<Option<DisconnectedHook>>,
    started: AtomicBool,
    finished: AtomicBool,
    closed: CancellationToken,
}

/// One end of a streaming conversation.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use async_trait::async_trait;
/// use streamwire::{
///     config::StreamingConfig,
///     connection::StreamingConnection,
///     message::{ReceiveRequest, StreamingRequest, StreamingResponse},
///     protocol::RequestHandler,
/// };
///
/// struct NoContent;
///
/// #[async_trait]
/// impl RequestHandler for NoContent {
///     async fn process_request(&self, _: ReceiveRequest) -> Option<StreamingResponse> {
///         Some(StreamingResponse::new(204))
///     }
/// }
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let socket = tokio::net::TcpStream::connect("127.0.0.1:9000").await?;
/// let connection =
///     StreamingConnection::from_io(socket, Arc::new(NoContent), StreamingConfig::default());
/// connection.start()?;
/// let response = connection.send(&StreamingRequest::get("/status")).await?;
/// println!("{}", response.status_code);
/// connection.disconnect().await;
/// # Ok(())
/// # }
/// ```
pub struct StreamingConnection {
    inner: Arc<Inner>,
}

impl StreamingConnection {
    /// Build a connection over a transport implementing both directions.
    #[must_use]
    pub fn new<T>(transport: Arc<T>, handler: Arc<dyn RequestHandler>, config: StreamingConfig) -> Self
    where
        T: TransportSender + TransportReceiver,
    {
        let sender: Arc<dyn TransportSender> = transport.clone();
        let receiver: Arc<dyn TransportReceiver> = transport;
        Self::with_transports(sender, receiver, handler, config)
    }

    /// Build a connection over a tokio byte stream.
    #[must_use]
    pub fn from_io<S>(stream: S, handler: Arc<dyn RequestHandler>, config: StreamingConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::new(Arc::new(IoTransport::new(stream)), handler, config)
    }

    /// Build a connection over separate outbound and inbound transports.
    #[must_use]
    pub fn with_transports(
        sender_transport: Arc<dyn TransportSender>,
        receiver_transport: Arc<dyn TransportReceiver>,
        handler: Arc<dyn RequestHandler>,
        config: StreamingConfig,
    ) -> Self {
        let sender = PayloadSender::new(config.send_queue_capacity());
        let receiver = PayloadReceiver::new();
        let adapter = ProtocolAdapter::new(handler, sender.clone());
        receiver.subscribe(adapter.subscription());

        let inner = Arc::new(Inner {
            sender,
            receiver,
            adapter,
            config,
            transports: Mutex::new(Some((sender_transport, receiver_transport))),
            on_disconnected: Mutex::new(None),
            started: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            closed: CancellationToken::new(),
        });

        let weak = Arc::downgrade(&inner);
        inner
            .sender
            .set_on_disconnected(Arc::new(move |event| on_half_closed(&weak, event)));
        let weak = Arc::downgrade(&inner);
        inner
            .receiver
            .set_on_disconnected(Arc::new(move |event| on_half_closed(&weak, event)));

        Self { inner }
    }

    /// Register a hook fired once when the connection closes, whichever
    /// side initiated it.
    pub fn on_disconnected<F>(&self, hook: F)
    where
        F: Fn(DisconnectedEvent) + Send + Sync + 'static,
    {
        *lock(&self.inner.on_disconnected) = Some(Arc::new(hook));
    }

    /// Start the send and receive loops.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Transport`] if the connection was already
    /// started, or [`ConnectionError::NotConnected`] once it has closed.
    pub fn start(&self) -> Result<(), ConnectionError> {
        if self.inner.closed.is_cancelled() {
            return Err(ConnectionError::NotConnected);
        }
        let (sender, receiver) = lock(&self.inner.transports)
            .take()
            .ok_or(crate::transport::TransportError::AlreadyConnected)?;
        self.inner.sender.connect(sender)?;
        self.inner.receiver.connect(receiver)?;
        self.inner.started.store(true, Ordering::Release);
        metrics::inc_connections();
        info!("streaming connection started");
        Ok(())
    }

    /// Whether the connection is started and both halves are open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
            && !self.inner.closed.is_cancelled()
            && self.inner.sender.is_connected()
            && self.inner.receiver.is_connected()
    }

    /// Send `request` and wait for the peer's response.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::NotConnected`] when called on a closed or
    ///   unstarted connection.
    /// - [`ConnectionError::Timeout`] when the configured response timeout
    ///   elapses; the pending entry is discarded.
    /// - [`ConnectionError::NoResponse`] when the request is abandoned,
    ///   typically because the connection closed.
    /// - [`ConnectionError::Send`] when the request could not be written.
    pub async fn send(&self, request: &StreamingRequest) -> Result<ReceiveResponse, ConnectionError> {
        if !self.is_connected() {
            return Err(ConnectionError::NotConnected);
        }
        let id = Uuid::new_v4();
        let exchange = self.inner.adapter.send_request_with_id(id, request);
        let response = match self.inner.config.response_timeout() {
            Some(limit) => self.with_timeout(id, limit, exchange).await?,
            None => exchange.await?,
        };
        response.ok_or(ConnectionError::NoResponse)
    }

    async fn with_timeout<F>(
        &self,
        id: Uuid,
        limit: Duration,
        exchange: F,
    ) -> Result<Option<ReceiveResponse>, ConnectionError>
    where
        F: Future<Output = Result<Option<ReceiveResponse>, crate::transport::SendError>>,
    {
        if let Ok(result) = tokio::time::timeout(limit, exchange).await {
            return Ok(result?);
        }
        self.inner.adapter.request_manager().signal_response(id, None);
        debug!(%id, ?limit, "request timed out");
        Err(ConnectionError::Timeout(limit))
    }

    /// Ask the peer to cancel every stream it is sending.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Send`] if the frame cannot be written.
    pub async fn cancel_all(&self) -> Result<(), ConnectionError> {
        self.inner
            .adapter
            .send_operations()
            .send_cancel_all(Uuid::new_v4())
            .await?;
        Ok(())
    }

    /// Close both halves and wait for their loops and in-flight handlers to
    /// exit.
    pub async fn disconnect(&self) {
        let reason = Some("disconnect requested".to_owned());
        self.inner.sender.disconnect(reason.clone()).await;
        self.inner.receiver.disconnect(reason.clone()).await;
        self.inner.sender.wait_closed().await;
        self.inner.receiver.wait_closed().await;
        self.inner.adapter.shutdown().await;
        lock(&self.inner.transports).take();
        self.inner.finish(DisconnectedEvent::new(reason));
    }

    /// Resolve once the connection has closed.
    pub async fn closed(&self) { self.inner.closed.cancelled().await; }

    /// Protocol state, for inspecting pending requests and streams.
    #[must_use]
    pub fn protocol(&self) -> &ProtocolAdapter { &self.inner.adapter }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &StreamingConfig { &self.inner.config }
}

impl Inner {
    fn finish(&self, event: DisconnectedEvent) {
        if self.finished.swap(true, Ordering::AcqRel) {
            return;
        }
        self.adapter.request_manager().cancel_all();
        self.adapter.stream_manager().abandon_all();
        if self.started.load(Ordering::Acquire) {
            metrics::dec_connections();
        }
        info!(reason = event.reason.as_deref().unwrap_or("none"), "streaming connection closed");
        let hook = lock(&self.on_disconnected).clone();
        if let Some(hook) = hook {
            hook(event);
        }
        self.closed.cancel();
    }
}

/// Either half closing tears down the other and finishes the connection.
fn on_half_closed(inner: &Weak<Inner>, event: DisconnectedEvent) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    inner.finish(event.clone());
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(async move {
            inner.sender.disconnect(event.reason.clone()).await;
            inner.receiver.disconnect(event.reason).await;
            inner.adapter.shutdown().await;
        });
    }
}
