//! Correlates outbound requests with their responses.

use dashmap::{DashMap, mapref::entry::Entry};
use futures::{FutureExt, future::BoxFuture};
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use crate::message::ReceiveResponse;

/// Pending-response table keyed by request id.
///
/// # Examples
///
/// ```
/// use streamwire::payload::RequestManager;
/// use uuid::Uuid;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let manager = RequestManager::new();
/// let id = Uuid::new_v4();
/// let response = manager.get_response(id);
/// assert!(manager.signal_response(id, None));
/// assert!(response.await.is_none());
/// assert!(!manager.signal_response(id, None));
/// # }
/// ```
#[derive(Debug, Default)]
pub struct RequestManager {
    pending: DashMap<Uuid, oneshot::Sender<Option<ReceiveResponse>>>,
}

impl RequestManager {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register interest in the response to `id`.
    ///
    /// Registration happens immediately, so a response signalled before the
    /// returned future is polled is not lost. If `id` is already pending the
    /// future resolves to `None` and the existing registration is kept.
    pub fn get_response(&self, id: Uuid) -> BoxFuture<'static, Option<ReceiveResponse>> {
        match self.pending.entry(id) {
            Entry::Occupied(_) => {
                debug!(%id, "duplicate response registration");
                futures::future::ready(None).boxed()
            }
            Entry::Vacant(slot) => {
                let (tx, rx) = oneshot::channel();
                slot.insert(tx);
                rx.map(Result::ok).map(Option::flatten).boxed()
            }
        }
    }

    /// Complete the pending entry for `id` with `response`.
    ///
    /// Returns `false` if nothing was waiting for `id`.
    pub fn signal_response(&self, id: Uuid, response: Option<ReceiveResponse>) -> bool {
        let Some((_, tx)) = self.pending.remove(&id) else {
            return false;
        };
        if tx.send(response).is_err() {
            debug!(%id, "response waiter went away");
        }
        true
    }

    /// Number of requests awaiting a response.
    #[must_use]
    pub fn pending_len(&self) -> usize { self.pending.len() }

    /// Resolve every pending entry with `None`.
    pub fn cancel_all(&self) {
        let ids: Vec<Uuid> = self.pending.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.signal_response(id, None);
        }
    }
}
