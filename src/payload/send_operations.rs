//! High-level send entry points used by the protocol adapter.

use futures::future::try_join_all;
use uuid::Uuid;

use super::disassembler::{
    CancelDisassembler,
    PayloadDisassembler,
    RequestDisassembler,
    ResponseDisassembler,
    ResponseMessageStreamDisassembler,
};
use crate::{
    message::{ResponseMessageStream, StreamingRequest, StreamingResponse},
    transport::{PayloadSender, SendError},
};

/// Sends whole messages through a [`PayloadSender`].
#[derive(Clone)]
pub struct SendOperations {
    sender: PayloadSender,
}

impl SendOperations {
    /// Wrap `sender`.
    #[must_use]
    pub fn new(sender: PayloadSender) -> Self { Self { sender } }

    /// Send `request` under `id`: the JSON descriptor first, then every
    /// attached stream concurrently.
    ///
    /// # Errors
    ///
    /// Returns the first [`SendError`] raised by any frame.
    pub async fn send_request(&self, id: Uuid, request: &StreamingRequest) -> Result<(), SendError> {
        RequestDisassembler::new(id, request)
            .disassemble(&self.sender)
            .await?;
        self.send_streams(&request.streams).await
    }

    /// Send `response` under the id of the request it answers.
    ///
    /// # Errors
    ///
    /// Returns the first [`SendError`] raised by any frame.
    pub async fn send_response(&self, id: Uuid, response: &StreamingResponse) -> Result<(), SendError> {
        ResponseDisassembler::new(id, response)
            .disassemble(&self.sender)
            .await?;
        self.send_streams(&response.streams).await
    }

    /// Tell the peer to cancel every stream.
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`] if the frame cannot be written.
    pub async fn send_cancel_all(&self, id: Uuid) -> Result<(), SendError> {
        CancelDisassembler::cancel_all(id)
            .disassemble(&self.sender)
            .await
    }

    /// Tell the peer to stop sending stream `id`.
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`] if the frame cannot be written.
    pub async fn send_cancel_stream(&self, id: Uuid) -> Result<(), SendError> {
        CancelDisassembler::cancel_stream(id)
            .disassemble(&self.sender)
            .await
    }

    async fn send_streams(&self, streams: &[ResponseMessageStream]) -> Result<(), SendError> {
        try_join_all(streams.iter().map(|stream| async move {
            ResponseMessageStreamDisassembler::new(stream)
                .disassemble(&self.sender)
                .await
        }))
        .await?;
        Ok(())
    }
}
