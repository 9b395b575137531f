//! Test doubles and helpers for exercising `streamwire` without sockets.
//!
//! [`RecordingTransport`] captures every outbound write, [`ScriptedTransport`]
//! replays inbound bytes pushed by the test, and the [`frames`] helpers
//! encode and split raw frame bytes for assertions.
//!
//! ```rust
//! use streamwire::{Header, PayloadType};
//! use streamwire_testing::{decode_frames, encode_frame};
//!
//! let id = uuid::Uuid::nil();
//! let bytes = encode_frame(Header::new(PayloadType::Stream, id, 2, true), b"hi");
//! let frames = decode_frames(&bytes);
//! assert_eq!(&frames[0].1[..], b"hi");
//! ```

pub mod frames;
pub mod logging;
pub mod metrics;
pub mod transport;

pub use frames::{decode_frames, encode_frame};
pub use logging::{LoggerHandle, logger};
pub use metrics::{counter_for, debugging_recorder};
pub use transport::{RecordingTransport, ScriptedTransport};

/// Result type for tests that propagate errors with `?`.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
