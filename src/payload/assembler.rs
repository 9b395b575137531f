//! Per-stream assembler feeding inbound content frames into a
//! [`PayloadStream`].

use std::sync::{
    Mutex,
    Weak,
    atomic::{AtomicBool, Ordering},
};

use bytes::Bytes;
use uuid::Uuid;

use super::{PayloadStream, stream_manager::StreamManagerInner};
use crate::{header::Header, lock};

#[derive(Debug, Default)]
struct Metadata {
    content_type: Option<String>,
    content_length: Option<usize>,
}

/// Accumulates the frames of one content stream.
///
/// Frames are applied in arrival order. The frame carrying `end` finishes
/// the stream; anything arriving afterwards is ignored.
#[derive(Debug)]
pub struct PayloadStreamAssembler {
    id: Uuid,
    stream: PayloadStream,
    end: AtomicBool,
    metadata: Mutex<Metadata>,
    manager: Weak<StreamManagerInner>,
}

impl PayloadStreamAssembler {
    pub(crate) fn new(id: Uuid, manager: Weak<StreamManagerInner>) -> Self {
        Self {
            id,
            stream: PayloadStream::new(),
            end: AtomicBool::new(false),
            metadata: Mutex::new(Metadata::default()),
            manager,
        }
    }

    /// Create an assembler not tracked by any stream manager.
    #[must_use]
    pub fn detached(id: Uuid) -> Self { Self::new(id, Weak::new()) }

    /// Stream identifier.
    #[must_use]
    pub fn id(&self) -> Uuid { self.id }

    /// Handle to the assembled bytes.
    #[must_use]
    pub fn stream(&self) -> &PayloadStream { &self.stream }

    /// Whether the final frame has been applied.
    #[must_use]
    pub fn is_end(&self) -> bool { self.end.load(Ordering::Acquire) }

    /// Declared content type, if a descriptor supplied one.
    #[must_use]
    pub fn content_type(&self) -> Option<String> { lock(&self.metadata).content_type.clone() }

    /// Declared content length, if a descriptor supplied one.
    #[must_use]
    pub fn content_length(&self) -> Option<usize> { lock(&self.metadata).content_length }

    /// Record descriptor metadata for this stream.
    pub fn set_metadata(&self, content_type: Option<String>, content_length: Option<usize>) {
        let mut metadata = lock(&self.metadata);
        metadata.content_type = content_type;
        metadata.content_length = content_length;
    }

    /// Whether fewer bytes arrived than the descriptor declared.
    #[must_use]
    pub fn is_short(&self) -> bool {
        self.content_length()
            .is_some_and(|declared| self.stream.len() < declared)
    }

    /// Apply one frame.
    pub fn on_receive(&self, header: &Header, payload: Bytes) {
        if self.is_end() {
            return;
        }
        self.stream.write(payload);
        if header.end {
            self.end.store(true, Ordering::Release);
            self.stream.done_producing();
        }
    }

    /// Stop consuming this stream.
    ///
    /// Hands the id back to the owning stream manager, which cancels the
    /// stream and notifies the peer if the data was incomplete. A detached
    /// assembler just cancels its stream.
    pub fn close(&self) {
        match self.manager.upgrade() {
            Some(manager) => manager.close_stream(self.id),
            None => self.cancel(),
        }
    }

    /// Cancel the underlying stream without touching the manager.
    pub fn cancel(&self) { self.stream.cancel(); }
}
