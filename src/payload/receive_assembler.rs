//! Buffers the JSON descriptor of an inbound request or response.

use bytes::Bytes;
use uuid::Uuid;

use super::PayloadStream;
use crate::header::{Header, PayloadType};

/// Collects the `Request` or `Response` frames sharing one id until the
/// frame carrying `end` arrives.
#[derive(Debug)]
pub struct ReceiveAssembler {
    id: Uuid,
    payload_type: PayloadType,
    buffer: PayloadStream,
}

impl ReceiveAssembler {
    /// Start assembling the descriptor of `payload_type` for `id`.
    #[must_use]
    pub fn new(id: Uuid, payload_type: PayloadType) -> Self {
        Self {
            id,
            payload_type,
            buffer: PayloadStream::new(),
        }
    }

    /// Id shared by the descriptor frames.
    #[must_use]
    pub fn id(&self) -> Uuid { self.id }

    /// Whether this assembles a request or a response.
    #[must_use]
    pub fn payload_type(&self) -> PayloadType { self.payload_type }

    /// Buffer the descriptor bytes are written to.
    #[must_use]
    pub fn stream(&self) -> &PayloadStream { &self.buffer }

    /// Append one frame. Returns the complete descriptor once `header.end`
    /// is seen.
    pub fn on_receive(&self, header: &Header, payload: Bytes) -> Option<Bytes> {
        self.buffer.write(payload);
        if !header.end {
            return None;
        }
        self.buffer.done_producing();
        Some(self.buffer.drain_buffered())
    }
}
