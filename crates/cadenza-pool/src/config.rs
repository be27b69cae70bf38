//! Pool configuration.

use crate::error::{PoolError, Result};
use std::time::Duration;

/// Initial slot table multiplier used when no explicit `initial_slots` is given.
pub const DEFAULT_SLOT_FACTOR: usize = 4;

/// Configuration for a [`FixedChunkPool`](crate::FixedChunkPool).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Size of every chunk in bytes.
    pub chunk_size: usize,
    /// Free chunks kept available after a refill (and created up front).
    pub min_preallocated: usize,
    /// Free chunks above this count are released by a trim.
    pub max_preallocated: usize,
    /// Slots in the first arena segment.
    pub initial_slots: usize,
    /// Whether non-RT allocation may add slot segments past `initial_slots`.
    /// When false, `initial_slots` is a hard ceiling on chunks alive at once.
    pub growable: bool,
}

impl PoolConfig {
    pub fn new(chunk_size: usize, min_preallocated: usize, max_preallocated: usize) -> Self {
        Self {
            chunk_size,
            min_preallocated,
            max_preallocated,
            initial_slots: max_preallocated.max(min_preallocated).max(1) * DEFAULT_SLOT_FACTOR,
            growable: true,
        }
    }

    pub fn with_initial_slots(mut self, initial_slots: usize) -> Self {
        self.initial_slots = initial_slots;
        self
    }

    /// Fix the slot table at `initial_slots`.
    pub fn fixed(mut self) -> Self {
        self.growable = false;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(PoolError::InvalidConfig("chunk_size must be non-zero".into()));
        }
        if self.initial_slots == 0 || self.initial_slots > u32::MAX as usize {
            return Err(PoolError::InvalidConfig(format!(
                "initial_slots {} out of range (1-{})",
                self.initial_slots,
                u32::MAX
            )));
        }
        if self.min_preallocated > self.max_preallocated {
            return Err(PoolError::InvalidConfig(format!(
                "min_preallocated {} exceeds max_preallocated {}",
                self.min_preallocated, self.max_preallocated
            )));
        }
        if !self.growable && self.min_preallocated > self.initial_slots {
            return Err(PoolError::InvalidConfig(format!(
                "min_preallocated {} exceeds fixed slot count {}",
                self.min_preallocated, self.initial_slots
            )));
        }
        Ok(())
    }
}

/// Configuration for the [`PoolMaintainer`](crate::PoolMaintainer) thread.
#[derive(Debug, Clone, Copy)]
pub struct MaintainerConfig {
    /// Time between periodic refill/trim passes (default: 10ms)
    pub interval: Duration,
    /// Command channel capacity (default: 16)
    pub command_capacity: usize,
}

impl Default for MaintainerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(10),
            command_capacity: 16,
        }
    }
}
