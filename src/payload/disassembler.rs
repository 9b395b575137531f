//! Splits outbound payloads into frames.
//!
//! Each disassembler yields the full payload for one id; the provided
//! [`PayloadDisassembler::disassemble`] cuts it into frames of at most
//! [`MAX_PAYLOAD_LENGTH`] bytes and queues them one at a time, waiting for
//! each frame to be written before queueing the next.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::oneshot;
use tracing::trace;
use uuid::Uuid;

use crate::{
    header::{Header, MAX_PAYLOAD_LENGTH, PayloadType},
    message::{ResponseMessageStream, StreamingRequest, StreamingResponse},
    transport::{PayloadSender, SendError},
};

/// Source of the frames for one outbound id.
#[async_trait]
pub trait PayloadDisassembler: Send + Sync {
    /// Frame type every chunk is sent as.
    fn payload_type(&self) -> PayloadType;

    /// Id shared by every chunk.
    fn identifier(&self) -> Uuid;

    /// Produce the complete payload.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Serialize`] if a JSON body cannot be encoded.
    async fn get_stream(&self) -> Result<Bytes, SendError>;

    /// Queue the payload as a run of frames, the last carrying `end`.
    ///
    /// An empty payload is sent as a single zero-length frame with `end`
    /// set. Returns once the final frame has been written.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Disconnected`] if the sender disconnects before
    /// every frame is written.
    async fn disassemble(&self, sender: &PayloadSender) -> Result<(), SendError> {
        let payload = self.get_stream().await?;
        let payload_type = self.payload_type();
        let id = self.identifier();
        let total = payload.len();
        let mut offset = 0;
        loop {
            let len = (total - offset).min(MAX_PAYLOAD_LENGTH);
            let end = offset + len >= total;
            let chunk = payload.slice(offset..offset + len);
            let header = Header::new(payload_type, id, len, end);
            let (tx, rx) = oneshot::channel();
            sender
                .send_payload(
                    header,
                    chunk,
                    true,
                    Some(Box::new(move |header| {
                        let _ = tx.send(header);
                    })),
                )
                .await?;
            rx.await.map_err(|_| SendError::Disconnected)?;
            trace!(%id, %payload_type, offset, len, end, "frame written");
            offset += len;
            if end {
                return Ok(());
            }
        }
    }
}

/// Sends a request's JSON descriptor.
#[derive(Debug)]
pub struct RequestDisassembler<'a> {
    id: Uuid,
    request: &'a StreamingRequest,
}

impl<'a> RequestDisassembler<'a> {
    /// Disassemble `request` under `id`.
    #[must_use]
    pub fn new(id: Uuid, request: &'a StreamingRequest) -> Self { Self { id, request } }
}

#[async_trait]
impl PayloadDisassembler for RequestDisassembler<'_> {
    fn payload_type(&self) -> PayloadType { PayloadType::Request }

    fn identifier(&self) -> Uuid { self.id }

    async fn get_stream(&self) -> Result<Bytes, SendError> {
        Ok(serde_json::to_vec(&self.request.payload())?.into())
    }
}

/// Sends a response's JSON descriptor.
#[derive(Debug)]
pub struct ResponseDisassembler<'a> {
    id: Uuid,
    response: &'a StreamingResponse,
}

impl<'a> ResponseDisassembler<'a> {
    /// Disassemble `response` under `id`.
    #[must_use]
    pub fn new(id: Uuid, response: &'a StreamingResponse) -> Self { Self { id, response } }
}

#[async_trait]
impl PayloadDisassembler for ResponseDisassembler<'_> {
    fn payload_type(&self) -> PayloadType { PayloadType::Response }

    fn identifier(&self) -> Uuid { self.id }

    async fn get_stream(&self) -> Result<Bytes, SendError> {
        Ok(serde_json::to_vec(&self.response.payload())?.into())
    }
}

/// Sends the bytes of one attached content stream under the stream's id.
#[derive(Debug)]
pub struct ResponseMessageStreamDisassembler<'a> {
    stream: &'a ResponseMessageStream,
}

impl<'a> ResponseMessageStreamDisassembler<'a> {
    /// Disassemble `stream`.
    #[must_use]
    pub fn new(stream: &'a ResponseMessageStream) -> Self { Self { stream } }
}

#[async_trait]
impl PayloadDisassembler for ResponseMessageStreamDisassembler<'_> {
    fn payload_type(&self) -> PayloadType { PayloadType::Stream }

    fn identifier(&self) -> Uuid { self.stream.id() }

    async fn get_stream(&self) -> Result<Bytes, SendError> { Ok(self.stream.content().clone()) }
}

/// Sends a single empty `CancelAll` or `CancelStream` frame.
#[derive(Clone, Copy, Debug)]
pub struct CancelDisassembler {
    id: Uuid,
    payload_type: PayloadType,
}

impl CancelDisassembler {
    /// Cancel every stream; `id` names the cancellation itself.
    #[must_use]
    pub fn cancel_all(id: Uuid) -> Self {
        Self {
            id,
            payload_type: PayloadType::CancelAll,
        }
    }

    /// Cancel the stream `id`.
    #[must_use]
    pub fn cancel_stream(id: Uuid) -> Self {
        Self {
            id,
            payload_type: PayloadType::CancelStream,
        }
    }
}

#[async_trait]
impl PayloadDisassembler for CancelDisassembler {
    fn payload_type(&self) -> PayloadType { self.payload_type }

    fn identifier(&self) -> Uuid { self.id }

    async fn get_stream(&self) -> Result<Bytes, SendError> { Ok(Bytes::new()) }
}
