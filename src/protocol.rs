//! Request/response protocol over the payload layer.
//!
//! [`ProtocolAdapter`] joins the pieces one connection needs: inbound
//! requests go to a [`RequestHandler`] and its answer is sent back under the
//! request id; inbound responses complete the matching outbound request;
//! locally cancelled streams are reported to the peer.

use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    message::{ReceiveRequest, ReceiveResponse, StreamingRequest, StreamingResponse},
    payload::{
        PayloadAssemblerManager,
        PayloadStreamAssembler,
        RequestCallback,
        RequestManager,
        ResponseCallback,
        SendOperations,
        StreamManager,
    },
    transport::{PayloadSender, ReceiveSubscription, SendError},
};

/// Application logic answering inbound requests.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use streamwire::{
///     message::{ReceiveRequest, StreamingResponse},
///     protocol::RequestHandler,
/// };
///
/// struct Echo;
///
/// #[async_trait]
/// impl RequestHandler for Echo {
///     async fn process_request(&self, request: ReceiveRequest) -> Option<StreamingResponse> {
///         let body = request.read_body_as_string().await.ok()?;
///         let mut response = StreamingResponse::ok();
///         response.set_body(&body).ok()?;
///         Some(response)
///     }
/// }
/// ```
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Handle `request`. Returning `None` sends no response.
    async fn process_request(&self, request: ReceiveRequest) -> Option<StreamingResponse>;
}

/// Per-connection protocol state.
pub struct ProtocolAdapter {
    request_manager: Arc<RequestManager>,
    send_operations: SendOperations,
    stream_manager: StreamManager,
    assembler_manager: Arc<PayloadAssemblerManager>,
    tasks: Tasks,
}

/// Handler and cancellation tasks spawned on behalf of one connection.
#[derive(Clone)]
struct Tasks {
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl Tasks {
    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(handle) = Handle::try_current() else {
            warn!("no tokio runtime; dropping protocol task");
            return;
        };
        let shutdown = self.shutdown.clone();
        self.tracker.spawn_on(
            async move {
                tokio::select! {
                    () = shutdown.cancelled() => {}
                    () = task => {}
                }
            },
            &handle,
        );
    }
}

impl ProtocolAdapter {
    /// Wire `handler` to frames sent through `sender`.
    #[must_use]
    pub fn new(handler: Arc<dyn RequestHandler>, sender: PayloadSender) -> Self {
        let request_manager = Arc::new(RequestManager::new());
        let send_operations = SendOperations::new(sender);
        let stream_manager = StreamManager::new();
        let tasks = Tasks {
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        };

        let ops = send_operations.clone();
        let cancel_tasks = tasks.clone();
        stream_manager.set_on_cancel(Arc::new(move |assembler: &Arc<PayloadStreamAssembler>| {
            let ops = ops.clone();
            let id = assembler.id();
            cancel_tasks.spawn(async move {
                if let Err(e) = ops.send_cancel_stream(id).await {
                    debug!(%id, error = %e, "failed to send stream cancellation");
                }
            });
        }));

        let ops = send_operations.clone();
        let request_tasks = tasks.clone();
        let on_request: RequestCallback = Arc::new(move |id, request| {
            let handler = handler.clone();
            let ops = ops.clone();
            request_tasks.spawn(respond(handler, ops, id, request));
        });

        let responses = request_manager.clone();
        let on_response: ResponseCallback = Arc::new(move |id, response| {
            if !responses.signal_response(id, Some(response)) {
                debug!(%id, "dropping response with no pending request");
            }
        });

        let assembler_manager = Arc::new(PayloadAssemblerManager::new(
            stream_manager.clone(),
            on_request,
            on_response,
        ));

        Self {
            request_manager,
            send_operations,
            stream_manager,
            assembler_manager,
            tasks,
        }
    }

    /// Abort in-flight handler and cancellation tasks and wait for them to
    /// exit. Tasks spawned afterwards stop immediately.
    pub async fn shutdown(&self) {
        self.tasks.shutdown.cancel();
        self.tasks.tracker.close();
        self.tasks.tracker.wait().await;
    }

    /// Number of handler and cancellation tasks still running.
    #[must_use]
    pub fn task_count(&self) -> usize { self.tasks.tracker.len() }

    /// Subscription to install on the connection's
    /// [`PayloadReceiver`](crate::transport::PayloadReceiver).
    #[must_use]
    pub fn subscription(&self) -> ReceiveSubscription { self.assembler_manager.subscription() }

    /// Send `request` under a fresh id and wait for its response.
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`] if the request could not be written.
    pub async fn send_request(
        &self,
        request: &StreamingRequest,
    ) -> Result<Option<ReceiveResponse>, SendError> {
        self.send_request_with_id(Uuid::new_v4(), request).await
    }

    /// Send `request` under `id` and wait for its response.
    ///
    /// The response is registered before the first frame is queued. `None`
    /// means the request was abandoned, for example by
    /// [`RequestManager::cancel_all`].
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`] if the request could not be written; the
    /// pending entry is removed first.
    pub async fn send_request_with_id(
        &self,
        id: Uuid,
        request: &StreamingRequest,
    ) -> Result<Option<ReceiveResponse>, SendError> {
        let response = self.request_manager.get_response(id);
        if let Err(e) = self.send_operations.send_request(id, request).await {
            self.request_manager.signal_response(id, None);
            return Err(e);
        }
        Ok(response.await)
    }

    /// Pending-response table.
    #[must_use]
    pub fn request_manager(&self) -> &Arc<RequestManager> { &self.request_manager }

    /// Inbound content stream registry.
    #[must_use]
    pub fn stream_manager(&self) -> &StreamManager { &self.stream_manager }

    /// Outbound message facade.
    #[must_use]
    pub fn send_operations(&self) -> &SendOperations { &self.send_operations }
}

async fn respond(
    handler: Arc<dyn RequestHandler>,
    ops: SendOperations,
    id: Uuid,
    request: ReceiveRequest,
) {
    let Some(response) = handler.process_request(request).await else {
        debug!(%id, "handler produced no response");
        return;
    };
    if let Err(e) = ops.send_response(id, &response).await {
        warn!(%id, error = %e, "failed to send response");
    }
}
