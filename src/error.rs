//! Top-level error type for connection operations.
//!
//! Lower layers keep their own errors ([`HeaderError`](crate::header::HeaderError),
//! [`SendError`], [`TransportError`],
//! [`BodyError`](crate::message::BodyError)); [`ConnectionError`] wraps the
//! ones a [`StreamingConnection`](crate::connection::StreamingConnection)
//! caller can observe.

use std::time::Duration;

use thiserror::Error;

use crate::transport::{SendError, TransportError};

/// Errors returned by [`StreamingConnection`](crate::connection::StreamingConnection).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The connection has not been started or has disconnected.
    #[error("connection is not connected")]
    NotConnected,
    /// No response arrived within the configured timeout.
    #[error("no response within {0:?}")]
    Timeout(Duration),
    /// The request was abandoned without a response, typically because the
    /// connection dropped.
    #[error("request completed without a response")]
    NoResponse,
    /// Queueing or writing the request failed.
    #[error(transparent)]
    Send(#[from] SendError),
    /// Binding the transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ConnectionError {
    /// Whether retrying on a fresh connection might succeed.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::NoResponse | Self::Send(SendError::Disconnected)
        )
    }
}
