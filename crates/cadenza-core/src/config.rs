//! Session configuration.

use crate::{Error, Result};
use cadenza_midi::{record_size, MAX_RECORD_PAYLOAD};
use cadenza_pool::PoolConfig;
use serde::{Deserialize, Serialize};

/// Longest channel voice message; every payload limit must fit one.
const MIN_EVENT_SIZE: usize = 3;

/// What outbound delivery does while the transport is stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoppedPolicy {
    /// Emit nothing and keep every queued event.
    #[default]
    Hold,
    /// Write all queued events at offset 0, oldest first.
    Flush,
}

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Largest captured input payload in bytes (default: 64).
    pub max_event_size: usize,
    /// Free inbound chunks kept ready for the audio thread (default: 256).
    pub inbound_min_chunks: usize,
    /// Free inbound chunks above this count are released (default: 512).
    pub inbound_max_chunks: usize,
    /// Most captured events alive at once, queued or not yet handed off
    /// (default: 1024).
    pub inbound_capacity: usize,
    /// Largest outbound payload in bytes (default: 255).
    pub outbound_max_size: usize,
    /// Free outbound chunks kept per size class (default: 32).
    pub outbound_min_chunks: usize,
    /// Free outbound chunks per size class above this count are released
    /// (default: 128).
    pub outbound_max_chunks: usize,
    pub stopped_policy: StoppedPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_event_size: 64,
            inbound_min_chunks: 256,
            inbound_max_chunks: 512,
            inbound_capacity: 1024,
            outbound_max_size: MAX_RECORD_PAYLOAD,
            outbound_min_chunks: 32,
            outbound_max_chunks: 128,
            stopped_policy: StoppedPolicy::Hold,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        check_payload_limit("max_event_size", self.max_event_size)?;
        check_payload_limit("outbound_max_size", self.outbound_max_size)?;

        if self.inbound_capacity == 0 || self.inbound_capacity > u32::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "inbound_capacity {} out of range (1-{})",
                self.inbound_capacity,
                u32::MAX
            )));
        }
        if self.inbound_min_chunks > self.inbound_capacity {
            return Err(Error::InvalidConfig(format!(
                "inbound_min_chunks {} exceeds inbound_capacity {}",
                self.inbound_min_chunks, self.inbound_capacity
            )));
        }
        if self.inbound_min_chunks > self.inbound_max_chunks {
            return Err(Error::InvalidConfig(format!(
                "inbound_min_chunks {} exceeds inbound_max_chunks {}",
                self.inbound_min_chunks, self.inbound_max_chunks
            )));
        }
        if self.outbound_min_chunks > self.outbound_max_chunks {
            return Err(Error::InvalidConfig(format!(
                "outbound_min_chunks {} exceeds outbound_max_chunks {}",
                self.outbound_min_chunks, self.outbound_max_chunks
            )));
        }
        Ok(())
    }

    /// Pool layout for captured input records.
    ///
    /// The slot table is fixed at `inbound_capacity`, so the audio thread's
    /// pending list and the consumer queue can both be sized once up front.
    pub fn inbound_pool_config(&self) -> PoolConfig {
        PoolConfig::new(
            record_size(self.max_event_size),
            self.inbound_min_chunks,
            self.inbound_max_chunks,
        )
        .with_initial_slots(self.inbound_capacity)
        .fixed()
    }

    /// Largest outbound allocation, header included.
    pub fn outbound_record_size(&self) -> usize {
        record_size(self.outbound_max_size)
    }
}

fn check_payload_limit(name: &str, value: usize) -> Result<()> {
    if !(MIN_EVENT_SIZE..=MAX_RECORD_PAYLOAD).contains(&value) {
        return Err(Error::InvalidConfig(format!(
            "{} {} out of range ({}-{})",
            name, value, MIN_EVENT_SIZE, MAX_RECORD_PAYLOAD
        )));
    }
    Ok(())
}
