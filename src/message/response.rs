//! Response messages.

use serde::{Serialize, de::DeserializeOwned};

use super::{APPLICATION_JSON, BodyError, ContentStream, ResponseMessageStream};
use crate::payload::ResponsePayload;

/// Response to send to the peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamingResponse {
    /// HTTP-style status code.
    pub status_code: u16,
    /// Attached content.
    pub streams: Vec<ResponseMessageStream>,
}

impl StreamingResponse {
    /// Create a response without content.
    #[must_use]
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            streams: Vec::new(),
        }
    }

    /// `200 OK`.
    #[must_use]
    pub fn ok() -> Self { Self::new(200) }

    /// `403 Forbidden`.
    #[must_use]
    pub fn forbidden() -> Self { Self::new(403) }

    /// `404 Not Found`.
    #[must_use]
    pub fn not_found() -> Self { Self::new(404) }

    /// `500 Internal Server Error`.
    #[must_use]
    pub fn internal_server_error() -> Self { Self::new(500) }

    /// Attach a content stream.
    pub fn add_stream(&mut self, stream: ResponseMessageStream) { self.streams.push(stream); }

    /// Serialize `body` as JSON and attach it as a content stream.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if `body` cannot be encoded.
    pub fn set_body<T: Serialize + ?Sized>(&mut self, body: &T) -> Result<(), serde_json::Error> {
        let bytes = serde_json::to_vec(body)?;
        self.add_stream(ResponseMessageStream::new(bytes).with_content_type(APPLICATION_JSON));
        Ok(())
    }

    pub(crate) fn payload(&self) -> ResponsePayload {
        ResponsePayload {
            status_code: self.status_code,
            streams: self.streams.iter().map(ResponseMessageStream::description).collect(),
        }
    }
}

/// Response received from the peer.
#[derive(Clone, Debug)]
pub struct ReceiveResponse {
    /// HTTP-style status code.
    pub status_code: u16,
    /// Incoming content streams.
    pub streams: Vec<ContentStream>,
}

impl ReceiveResponse {
    /// Whether the status code is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool { (200..300).contains(&self.status_code) }

    /// Read the first content stream as UTF-8. A response without content
    /// yields an empty string.
    ///
    /// # Errors
    ///
    /// Returns [`BodyError::Utf8`] if the body is not valid UTF-8.
    pub async fn read_body_as_string(&self) -> Result<String, BodyError> {
        super::body_as_string(&self.streams).await
    }

    /// Read the first content stream as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`BodyError::NoBody`] without content and
    /// [`BodyError::Json`] if the body does not decode into `T`.
    pub async fn read_body_as_json<T: DeserializeOwned>(&self) -> Result<T, BodyError> {
        super::body_as_json(&self.streams).await
    }
}
