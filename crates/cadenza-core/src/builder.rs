//! Builder for configuring and constructing a [`Session`].

use crate::config::{SessionConfig, StoppedPolicy};
use crate::{Result, Session};

/// Builder over [`SessionConfig`]; unset fields keep their defaults.
///
/// # Example
///
/// ```ignore
/// use cadenza_core::{Session, StoppedPolicy};
///
/// let session = Session::builder()
///     .max_event_size(32)
///     .inbound_chunks(128, 256)
///     .stopped_policy(StoppedPolicy::Flush)
///     .build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
}

impl SessionBuilder {
    pub fn from_config(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Default: 64
    pub fn max_event_size(mut self, bytes: usize) -> Self {
        self.config.max_event_size = bytes;
        self
    }

    /// Default: 256 / 512
    pub fn inbound_chunks(mut self, min: usize, max: usize) -> Self {
        self.config.inbound_min_chunks = min;
        self.config.inbound_max_chunks = max;
        self
    }

    /// Default: 1024
    pub fn inbound_capacity(mut self, events: usize) -> Self {
        self.config.inbound_capacity = events;
        self
    }

    /// Default: 255
    pub fn outbound_max_size(mut self, bytes: usize) -> Self {
        self.config.outbound_max_size = bytes;
        self
    }

    /// Default: 32 / 128 per size class
    pub fn outbound_chunks(mut self, min: usize, max: usize) -> Self {
        self.config.outbound_min_chunks = min;
        self.config.outbound_max_chunks = max;
        self
    }

    /// Default: [`StoppedPolicy::Hold`]
    pub fn stopped_policy(mut self, policy: StoppedPolicy) -> Self {
        self.config.stopped_policy = policy;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn build(self) -> Result<Session> {
        Session::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_builder_sets_fields() {
        let builder = Session::builder()
            .max_event_size(32)
            .inbound_chunks(8, 16)
            .inbound_capacity(64)
            .outbound_max_size(128)
            .outbound_chunks(2, 4)
            .stopped_policy(StoppedPolicy::Flush);

        let config = builder.config().clone();
        assert_eq!(config.max_event_size, 32);
        assert_eq!(config.inbound_capacity, 64);
        assert_eq!(config.outbound_min_chunks, 2);
        assert_eq!(config.stopped_policy, StoppedPolicy::Flush);

        let session = builder.build().unwrap();
        assert_eq!(session.config(), &config);
        assert_eq!(session.inbound_pool().unused_count(), 8);
        assert_eq!(session.inbound_pool().chunk_size(), 32 + 9);
    }

    #[test]
    fn test_builder_validates() {
        let result = Session::builder().inbound_chunks(16, 8).build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
