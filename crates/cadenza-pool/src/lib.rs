//! Realtime-safe memory pools for the audio thread.
//!
//! - [`FixedChunkPool`]: equal-size chunks, lock-free O(1) allocate/deallocate
//! - [`MultiSizePool`]: fixed pools at doubling sizes for variable-size requests
//! - [`PoolMaintainer`]: background thread running the blocking refill/trim pass
//!
//! # Example
//!
//! ```ignore
//! use cadenza_pool::{FixedChunkPool, PoolMaintainer};
//!
//! let pool = FixedChunkPool::new(16, 64, 256)?;
//! let maintainer = PoolMaintainer::start()?;
//! maintainer.register(pool.clone())?;
//!
//! // Audio thread
//! if let Some(mut chunk) = pool.allocate() {
//!     pool.bytes_mut(&mut chunk)[0] = 0x90;
//!     pool.deallocate(chunk);
//! }
//! ```

pub mod error;
pub use error::{PoolError, Result};

mod config;
pub use config::{MaintainerConfig, PoolConfig, DEFAULT_SLOT_FACTOR};

mod fixed;
pub use fixed::{Chunk, FixedChunkPool, SleepyReport, MAX_SEGMENTS};

mod multi;
pub use multi::{MultiSizePool, SizedChunk, BASE_CHUNK_SIZE, MAX_REQUEST_SIZE};

mod maintainer;
pub use maintainer::{PoolMaintainer, Sleepy};
