//! Outbound and inbound content streams.

use std::{fmt, sync::Arc};

use bytes::Bytes;
use serde::de::IgnoredAny;
use uuid::Uuid;

use super::{APPLICATION_JSON, TEXT_PLAIN};
use crate::payload::{PayloadStream, PayloadStreamAssembler, StreamDescription};

/// Guess a content type: JSON if `content` parses as JSON, plain text
/// otherwise.
#[must_use]
pub fn infer_content_type(content: &[u8]) -> &'static str {
    if serde_json::from_slice::<IgnoredAny>(content).is_ok() {
        APPLICATION_JSON
    } else {
        TEXT_PLAIN
    }
}

/// Content attached to an outbound request or response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseMessageStream {
    id: Uuid,
    content: Bytes,
    content_type: Option<String>,
}

impl ResponseMessageStream {
    /// Wrap `content` under a fresh stream id.
    #[must_use]
    pub fn new(content: impl Into<Bytes>) -> Self { Self::with_id(Uuid::new_v4(), content) }

    /// Wrap `content` under a caller-chosen stream id.
    #[must_use]
    pub fn with_id(id: Uuid, content: impl Into<Bytes>) -> Self {
        Self {
            id,
            content: content.into(),
            content_type: None,
        }
    }

    /// Set an explicit content type instead of inferring one.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Stream id.
    #[must_use]
    pub fn id(&self) -> Uuid { self.id }

    /// Raw content bytes.
    #[must_use]
    pub fn content(&self) -> &Bytes { &self.content }

    /// Explicit content type, or the inferred one.
    #[must_use]
    pub fn content_type(&self) -> String {
        self.content_type
            .clone()
            .unwrap_or_else(|| infer_content_type(&self.content).to_owned())
    }

    /// Descriptor advertised in the request or response JSON.
    #[must_use]
    pub fn description(&self) -> StreamDescription {
        StreamDescription {
            id: self.id.hyphenated().to_string(),
            content_type: Some(self.content_type()),
            length: Some(self.content.len()),
        }
    }
}

/// Inbound content stream of a received request or response.
///
/// Dropping the last clone closes the stream, so a message discarded unread
/// releases its registry entry and an unfinished stream is cancelled.
#[derive(Clone)]
pub struct ContentStream {
    id: Uuid,
    content_type: Option<String>,
    length: Option<usize>,
    assembler: Arc<Release>,
}

/// Closes its assembler when dropped.
struct Release(Arc<PayloadStreamAssembler>);

impl Drop for Release {
    fn drop(&mut self) { self.0.close(); }
}

impl fmt::Debug for ContentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentStream")
            .field("id", &self.id)
            .field("content_type", &self.content_type)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

impl ContentStream {
    pub(crate) fn new(assembler: Arc<PayloadStreamAssembler>) -> Self {
        Self {
            id: assembler.id(),
            content_type: assembler.content_type(),
            length: assembler.content_length(),
            assembler: Arc::new(Release(assembler)),
        }
    }

    /// Stream id.
    #[must_use]
    pub fn id(&self) -> Uuid { self.id }

    /// Content type declared by the sender.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> { self.content_type.as_deref() }

    /// Length declared by the sender.
    #[must_use]
    pub fn length(&self) -> Option<usize> { self.length }

    /// Live handle to the incoming bytes.
    #[must_use]
    pub fn stream(&self) -> &PayloadStream { self.assembler.0.stream() }

    /// Wait for the whole stream and release its registry entry.
    pub async fn read_to_end(&self) -> Bytes {
        let body = self.assembler.0.stream().read_until_end().await;
        self.assembler.0.close();
        body
    }

    /// Stop receiving this stream. If it had not finished the peer is told
    /// to cancel it.
    pub fn cancel(&self) { self.assembler.0.close(); }
}
