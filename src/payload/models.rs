//! JSON bodies carried by request and response header frames.

use serde::{Deserialize, Serialize};

/// Describes one content stream attached to a request or response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescription {
    /// Stream id in hyphenated UUID form.
    pub id: String,
    /// MIME type of the stream content.
    #[serde(rename = "contentType", alias = "type", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Total bytes the stream will carry, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
}

/// Body of a `Request` frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
    /// Method such as `GET` or `POST`.
    pub verb: String,
    /// Target path.
    pub path: String,
    /// Attached content streams.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub streams: Vec<StreamDescription>,
}

/// Body of a `Response` frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    /// HTTP-style status code.
    pub status_code: u16,
    /// Attached content streams.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub streams: Vec<StreamDescription>,
}
