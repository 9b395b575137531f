//! Request and response types exchanged over a streaming connection.
//!
//! Outbound messages ([`StreamingRequest`], [`StreamingResponse`]) own their
//! content as [`ResponseMessageStream`]s. Inbound messages
//! ([`ReceiveRequest`], [`ReceiveResponse`]) expose [`ContentStream`]s that
//! fill as content frames arrive.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use thiserror::Error;

mod content;
mod request;
mod response;

pub use content::{ContentStream, ResponseMessageStream, infer_content_type};
pub use request::{ReceiveRequest, StreamingRequest};
pub use response::{ReceiveResponse, StreamingResponse};

/// MIME type used for JSON bodies.
pub const APPLICATION_JSON: &str = "application/json";
/// MIME type used for anything that is not JSON.
pub const TEXT_PLAIN: &str = "text/plain";

/// Errors raised while reading an inbound body.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BodyError {
    /// The message carried no content stream.
    #[error("message has no body stream")]
    NoBody,
    /// The body was not valid UTF-8.
    #[error("body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    /// The body did not match the requested JSON shape.
    #[error("body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

async fn first_body(streams: &[ContentStream]) -> Option<Bytes> {
    match streams.first() {
        Some(stream) => Some(stream.read_to_end().await),
        None => None,
    }
}

async fn body_as_string(streams: &[ContentStream]) -> Result<String, BodyError> {
    let Some(body) = first_body(streams).await else {
        return Ok(String::new());
    };
    Ok(String::from_utf8(body.to_vec())?)
}

async fn body_as_json<T: DeserializeOwned>(streams: &[ContentStream]) -> Result<T, BodyError> {
    let body = first_body(streams).await.ok_or(BodyError::NoBody)?;
    Ok(serde_json::from_slice(&body)?)
}
