//! Connection configuration.
//!
//! [`StreamingConfig`] holds the tunables of a
//! [`StreamingConnection`](crate::connection::StreamingConnection). Build one
//! through [`StreamingConfig::builder`] so values are validated up front.

use std::time::Duration;

use thiserror::Error;

/// Default capacity of the outbound packet queue.
pub const DEFAULT_SEND_QUEUE_CAPACITY: usize = 64;

/// Errors returned when validating a [`StreamingConfig`].
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The send queue capacity was zero.
    #[error("invalid send queue capacity {0}; must be >= 1")]
    InvalidCapacity(usize),
    /// A zero response timeout would fail every request immediately.
    #[error("response timeout must be greater than zero")]
    ZeroTimeout,
}

/// Tunables for one streaming connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamingConfig {
    send_queue_capacity: usize,
    response_timeout: Option<Duration>,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
            response_timeout: None,
        }
    }
}

impl StreamingConfig {
    /// Start building a configuration from the defaults.
    #[must_use]
    pub fn builder() -> StreamingConfigBuilder { StreamingConfigBuilder::default() }

    /// Capacity of the bounded outbound packet queue.
    #[must_use]
    pub const fn send_queue_capacity(&self) -> usize { self.send_queue_capacity }

    /// How long [`send`](crate::connection::StreamingConnection::send) waits
    /// for a response, or `None` to wait indefinitely.
    #[must_use]
    pub const fn response_timeout(&self) -> Option<Duration> { self.response_timeout }
}

/// Builder for [`StreamingConfig`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use streamwire::config::StreamingConfig;
///
/// let config = StreamingConfig::builder()
///     .send_queue_capacity(16)
///     .response_timeout(Some(Duration::from_secs(5)))
///     .build()
///     .expect("valid config");
/// assert_eq!(config.send_queue_capacity(), 16);
/// ```
#[derive(Debug, Default)]
pub struct StreamingConfigBuilder {
    inner: StreamingConfig,
}

impl StreamingConfigBuilder {
    /// Set the capacity of the outbound packet queue.
    #[must_use]
    pub fn send_queue_capacity(mut self, capacity: usize) -> Self {
        self.inner.send_queue_capacity = capacity;
        self
    }

    /// Set the response timeout. `None` waits indefinitely.
    #[must_use]
    pub fn response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.inner.response_timeout = timeout;
        self
    }

    /// Validate and return the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCapacity`] if the queue capacity is zero
    /// and [`ConfigError::ZeroTimeout`] if the timeout is zero.
    pub fn build(self) -> Result<StreamingConfig, ConfigError> {
        let config = self.inner;
        if config.send_queue_capacity == 0 {
            return Err(ConfigError::InvalidCapacity(0));
        }
        if config.response_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = StreamingConfig::builder().build().expect("defaults build");
        assert_eq!(config, StreamingConfig::default());
        assert_eq!(config.send_queue_capacity(), DEFAULT_SEND_QUEUE_CAPACITY);
        assert_eq!(config.response_timeout(), None);
    }

    #[rstest]
    #[case(StreamingConfig::builder().send_queue_capacity(0), ConfigError::InvalidCapacity(0))]
    #[case(
        StreamingConfig::builder().response_timeout(Some(Duration::ZERO)),
        ConfigError::ZeroTimeout
    )]
    fn rejects_invalid_values(#[case] builder: StreamingConfigBuilder, #[case] expected: ConfigError) {
        assert_eq!(builder.build(), Err(expected));
    }
}
