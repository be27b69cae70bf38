//! Error types for cadenza-pool.

use thiserror::Error;

/// Error type for pool operations.
///
/// Only non-realtime calls return these. The realtime paths
/// (`allocate`/`deallocate`) report exhaustion through `Option`.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Invalid pool config: {0}")]
    InvalidConfig(String),

    #[error("Failed to allocate {size} bytes of backing memory")]
    BackingAllocation { size: usize },

    #[error("Request of {size} bytes exceeds pool maximum of {max}")]
    RequestTooLarge { size: usize, max: usize },

    #[error("Chunk pool slot table exhausted at {slots} slots")]
    Exhausted { slots: usize },

    #[error("Pool maintainer thread is not running")]
    MaintainerStopped,

    #[error("Failed to spawn pool maintainer thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, PoolError>;
