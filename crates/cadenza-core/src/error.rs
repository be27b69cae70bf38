//! Error types for cadenza-core.

use cadenza_pool::PoolError;
use thiserror::Error;

/// Error type for session control operations.
///
/// Only non-realtime calls return these. Problems on the audio thread are
/// absorbed and counted in [`crate::SessionMetrics`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Event of {size} bytes exceeds the {max} byte limit")]
    EventTooLarge { size: usize, max: usize },

    #[error("Empty MIDI event")]
    EmptyEvent,
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
