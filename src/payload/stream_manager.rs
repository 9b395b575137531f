//! Registry of inbound content streams for one connection.

use std::{fmt, sync::Arc};

use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use tracing::debug;
use uuid::Uuid;

use super::{PayloadStream, PayloadStreamAssembler};
use crate::{header::Header, lock};

/// Hook invoked when a locally closed stream had not finished; the
/// connection answers it with a `CancelStream` frame.
pub type CancelStreamHook = Arc<dyn Fn(&Arc<PayloadStreamAssembler>) + Send + Sync>;

pub(crate) struct StreamManagerInner {
    assemblers: DashMap<Uuid, Arc<PayloadStreamAssembler>>,
    closed: DashSet<Uuid>,
    on_cancel: std::sync::Mutex<Option<CancelStreamHook>>,
}

impl fmt::Debug for StreamManagerInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamManager")
            .field("active", &self.assemblers.len())
            .field("closed", &self.closed.len())
            .finish_non_exhaustive()
    }
}

impl StreamManagerInner {
    pub(crate) fn close_stream(&self, id: Uuid) {
        let Some((_, assembler)) = self.assemblers.remove(&id) else {
            return;
        };
        if assembler.is_end() && !assembler.is_short() {
            return;
        }
        assembler.cancel();
        if !assembler.is_end() {
            // Frames still in flight for this id are discarded on arrival.
            self.closed.insert(id);
        }
        debug!(%id, "closed unfinished stream");
        let hook = lock(&self.on_cancel).clone();
        if let Some(hook) = hook {
            hook(&assembler);
        }
    }
}

/// Creates, looks up and retires [`PayloadStreamAssembler`]s by stream id.
///
/// Cloning yields another handle to the same registry.
///
/// # Examples
///
/// ```
/// use streamwire::payload::StreamManager;
/// use uuid::Uuid;
///
/// let manager = StreamManager::new();
/// let id = Uuid::new_v4();
/// let first = manager.get_payload_assembler(id);
/// let second = manager.get_payload_assembler(id);
/// assert!(std::sync::Arc::ptr_eq(&first, &second));
/// ```
#[derive(Clone, Debug)]
pub struct StreamManager {
    inner: Arc<StreamManagerInner>,
}

impl Default for StreamManager {
    fn default() -> Self { Self::new() }
}

impl StreamManager {
    /// Create an empty registry with no cancellation hook.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StreamManagerInner {
                assemblers: DashMap::new(),
                closed: DashSet::new(),
                on_cancel: std::sync::Mutex::new(None),
            }),
        }
    }

    /// Install the hook run when an unfinished stream is closed locally.
    pub fn set_on_cancel(&self, hook: CancelStreamHook) { *lock(&self.inner.on_cancel) = Some(hook); }

    /// Return the assembler for `id`, creating it on first use.
    #[must_use]
    pub fn get_payload_assembler(&self, id: Uuid) -> Arc<PayloadStreamAssembler> {
        self.inner
            .assemblers
            .entry(id)
            .or_insert_with(|| {
                Arc::new(PayloadStreamAssembler::new(
                    id,
                    Arc::downgrade(&self.inner),
                ))
            })
            .clone()
    }

    /// Return the stream a frame should be written to, creating the
    /// assembler when needed. Streams closed locally yield `None`.
    #[must_use]
    pub fn get_payload_stream(&self, header: &Header) -> Option<PayloadStream> {
        if self.inner.closed.contains(&header.id) {
            return None;
        }
        Some(self.get_payload_assembler(header.id).stream().clone())
    }

    /// Route a content frame to its assembler.
    ///
    /// Frames for ids without an assembler are dropped.
    pub fn on_receive(&self, header: &Header, payload: Bytes) {
        let assembler = self
            .inner
            .assemblers
            .get(&header.id)
            .map(|entry| entry.value().clone());
        match assembler {
            Some(assembler) => assembler.on_receive(header, payload),
            None => {
                if header.end {
                    self.inner.closed.remove(&header.id);
                }
                debug!(id = %header.id, len = payload.len(), "dropping frame for unknown stream");
            }
        }
    }

    /// Retire `id` after local consumption ends.
    ///
    /// If the stream had not reached its end (or carried fewer bytes than
    /// declared) it is cancelled and the cancellation hook runs exactly
    /// once. Unknown or finished ids are removed silently.
    pub fn close_stream(&self, id: Uuid) { self.inner.close_stream(id); }

    /// Drop `id` because the peer cancelled it. The hook does not run and
    /// trailing frames for an unfinished stream are discarded.
    pub fn abandon_stream(&self, id: Uuid) {
        if let Some((_, assembler)) = self.inner.assemblers.remove(&id) {
            assembler.cancel();
            if !assembler.is_end() {
                self.inner.closed.insert(id);
            }
            debug!(%id, "peer cancelled stream");
        }
    }

    /// Drop every stream because the peer cancelled all of them.
    pub fn abandon_all(&self) {
        let ids: Vec<Uuid> = self.inner.assemblers.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.abandon_stream(id);
        }
    }

    /// Number of tracked assemblers.
    #[must_use]
    pub fn len(&self) -> usize { self.inner.assemblers.len() }

    /// Whether no assemblers are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.inner.assemblers.is_empty() }
}
