//! Metric helpers for `streamwire`.
//!
//! This module defines metric names and simple helper functions
//! wrapping the [`metrics`](https://docs.rs/metrics) crate. With the
//! `metrics` feature disabled the helpers compile to no-ops.

/// Name of the gauge tracking live streaming connections.
pub const CONNECTIONS_ACTIVE: &str = "streamwire_connections_active";
/// Name of the counter tracking frames written or read.
pub const FRAMES_PROCESSED: &str = "streamwire_frames_processed_total";
/// Name of the counter tracking transport and framing errors.
pub const ERRORS_TOTAL: &str = "streamwire_errors_total";

/// Direction of frame processing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Frames read from the transport.
    Inbound,
    /// Frames written to the transport.
    Outbound,
}

impl Direction {
    #[cfg_attr(
        not(feature = "metrics"),
        expect(dead_code, reason = "only used to label metrics")
    )]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Increment the active connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    ::metrics::gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    ::metrics::gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a processed frame for the given direction.
pub fn inc_frames(direction: Direction) {
    #[cfg(feature = "metrics")]
    ::metrics::counter!(FRAMES_PROCESSED, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record an error on the given direction.
pub fn inc_errors(direction: Direction) {
    #[cfg(feature = "metrics")]
    ::metrics::counter!(ERRORS_TOTAL, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}
