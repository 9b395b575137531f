#![doc(html_root_url = "https://docs.rs/streamwire/latest")]
//! Public API for the `streamwire` library.
//!
//! This crate implements a multiplexed streaming protocol: requests,
//! responses and content streams are cut into length-prefixed frames and
//! interleaved over one persistent duplex byte channel.
//!
//! The layers, from the wire up:
//!
//! - [`header`]: the fixed 48-byte frame header.
//! - [`transport`]: byte channel traits, the outbound frame queue and the
//!   inbound read loop.
//! - [`payload`]: frame disassembly, stream reassembly and response
//!   correlation.
//! - [`message`]: request and response types.
//! - [`protocol`] and [`connection`]: one ready-to-use connection.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod config;
pub mod connection;
pub mod error;
pub mod header;
pub mod message;
pub mod metrics;
pub mod payload;
pub mod protocol;
pub mod transport;

pub use config::{ConfigError, StreamingConfig};
pub use connection::StreamingConnection;
pub use error::ConnectionError;
pub use header::{Header, HeaderError, MAX_HEADER_LENGTH, MAX_PAYLOAD_LENGTH, PayloadType};
pub use message::{
    BodyError,
    ContentStream,
    ReceiveRequest,
    ReceiveResponse,
    ResponseMessageStream,
    StreamingRequest,
    StreamingResponse,
};
pub use metrics::{CONNECTIONS_ACTIVE, Direction, ERRORS_TOTAL, FRAMES_PROCESSED};
pub use protocol::{ProtocolAdapter, RequestHandler};
pub use transport::{
    DisconnectedEvent,
    IoTransport,
    SendError,
    TransportError,
    TransportReceiver,
    TransportSender,
};

/// Lock `mutex`, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
