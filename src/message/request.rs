//! Request messages.

use serde::{Serialize, de::DeserializeOwned};

use super::{APPLICATION_JSON, BodyError, ContentStream, ResponseMessageStream};
use crate::payload::RequestPayload;

/// Request to send to the peer.
///
/// # Examples
///
/// ```
/// use streamwire::message::StreamingRequest;
///
/// let mut request = StreamingRequest::post("/api/messages");
/// request
///     .set_body(&serde_json::json!({"text": "hi"}))
///     .expect("json body");
/// assert_eq!(request.verb, "POST");
/// assert_eq!(request.streams.len(), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamingRequest {
    /// Method such as `GET`.
    pub verb: String,
    /// Target path.
    pub path: String,
    /// Attached content.
    pub streams: Vec<ResponseMessageStream>,
}

impl StreamingRequest {
    /// Create a request without content.
    #[must_use]
    pub fn new(verb: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            path: path.into(),
            streams: Vec::new(),
        }
    }

    /// `GET` request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self { Self::new("GET", path) }

    /// `POST` request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self { Self::new("POST", path) }

    /// `PUT` request.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self { Self::new("PUT", path) }

    /// `DELETE` request.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self { Self::new("DELETE", path) }

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

    pub(crate) fn payload(&self) -> RequestPayload {
        RequestPayload {
            verb: self.verb.clone(),
            path: self.path.clone(),
            streams: self.streams.iter().map(ResponseMessageStream::description).collect(),
        }
    }
}

/// Request received from the peer.
#[derive(Clone, Debug)]
pub struct ReceiveRequest {
    /// Method such as `GET`.
    pub verb: String,
    /// Target path.
    pub path: String,
    /// Incoming content streams.
    pub streams: Vec<ContentStream>,
}

impl ReceiveRequest {
    /// Read the first content stream as UTF-8. A request without content
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
