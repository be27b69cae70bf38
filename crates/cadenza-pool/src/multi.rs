//! Multi-size pool: fixed-chunk pools at doubling sizes.
//!
//! A request is served by the smallest size class whose chunk fits it. The
//! class travels with the returned handle, so `deallocate` needs no size.
//!
//! Size classes for `max_size = 100`:
//!
//! ```text
//! class 0: 16 B   class 1: 32 B   class 2: 64 B   class 3: 128 B
//! ```

use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::fixed::{Chunk, FixedChunkPool, SleepyReport};

/// Chunk size of the smallest class.
pub const BASE_CHUNK_SIZE: usize = 16;

/// Largest `max_size` a multi-size pool accepts.
pub const MAX_REQUEST_SIZE: usize = 1 << 31;

/// Handle to a chunk allocated from a [`MultiSizePool`].
#[must_use = "chunks must be returned to their pool with `deallocate`"]
#[derive(Debug, PartialEq, Eq)]
pub struct SizedChunk {
    class: u8,
    chunk: Chunk,
}

impl SizedChunk {
    /// Index of the size class that served this allocation.
    #[inline]
    pub fn class(&self) -> usize {
        self.class as usize
    }
}

/// Array of [`FixedChunkPool`]s at doubling chunk sizes.
///
/// Clone is cheap; clones share the underlying pools.
#[derive(Clone, Debug)]
pub struct MultiSizePool {
    classes: Vec<FixedChunkPool>,
    max_size: usize,
}

impl MultiSizePool {
    /// Build size classes from [`BASE_CHUNK_SIZE`] up to the first size
    /// covering `max_size`, each preallocating `min_preallocated` chunks.
    pub fn new(max_size: usize, min_preallocated: usize, max_preallocated: usize) -> Result<Self> {
        if max_size == 0 || max_size > MAX_REQUEST_SIZE {
            return Err(PoolError::InvalidConfig(format!(
                "max_size {} out of range (1-{})",
                max_size, MAX_REQUEST_SIZE
            )));
        }

        let class_count = class_count(max_size);

        let classes = (0..class_count)
            .map(|i| {
                FixedChunkPool::with_config(PoolConfig::new(
                    BASE_CHUNK_SIZE << i,
                    min_preallocated,
                    max_preallocated,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            "Created multi-size pool: max_size={}, classes={}",
            max_size,
            class_count
        );
        Ok(Self { classes, max_size })
    }

    /// Size class index serving `size`, or `None` above `max_size`.
    #[inline]
    pub fn class_index(&self, size: usize) -> Option<usize> {
        if size > self.max_size {
            return None;
        }
        if size <= BASE_CHUNK_SIZE {
            return Some(0);
        }
        let index = (size.next_power_of_two() / BASE_CHUNK_SIZE).trailing_zeros() as usize;
        (index < self.classes.len()).then_some(index)
    }

    // ==================== RT Thread Methods ====================

    /// Allocate a chunk of at least `size` bytes. RT-safe.
    ///
    /// Returns `None` when `size` exceeds `max_size` or the class is exhausted.
    #[inline]
    pub fn allocate(&self, size: usize) -> Option<SizedChunk> {
        let class = self.class_index(size)?;
        let chunk = self.classes[class].allocate()?;
        Some(SizedChunk {
            class: class as u8,
            chunk,
        })
    }

    /// Return a chunk to the class it came from. RT-safe.
    #[inline]
    pub fn deallocate(&self, chunk: SizedChunk) {
        self.classes[chunk.class()].deallocate(chunk.chunk);
    }

    #[inline]
    pub fn bytes<'a>(&'a self, chunk: &'a SizedChunk) -> &'a [u8] {
        self.classes[chunk.class()].bytes(&chunk.chunk)
    }

    #[inline]
    pub fn bytes_mut<'a>(&'a self, chunk: &'a mut SizedChunk) -> &'a mut [u8] {
        self.classes[chunk.class()].bytes_mut(&mut chunk.chunk)
    }

    // ==================== Non-RT Methods ====================

    /// Allocate, refilling and waiting as needed. Never call from the audio thread.
    pub fn allocate_or_wait(&self, size: usize) -> Result<SizedChunk> {
        let class = self.class_index(size).ok_or(PoolError::RequestTooLarge {
            size,
            max: self.max_size,
        })?;
        let chunk = self.classes[class].allocate_or_wait()?;
        Ok(SizedChunk {
            class: class as u8,
            chunk,
        })
    }

    /// Run [`FixedChunkPool::sleepy`] on every size class.
    pub fn sleepy(&self) -> Result<SleepyReport> {
        let mut report = SleepyReport::default();
        for class in &self.classes {
            report = report.merge(class.sleepy()?);
        }
        Ok(report)
    }

    /// Release all backing memory.
    ///
    /// # Panics
    ///
    /// Panics if any chunk is still allocated.
    pub fn destroy(self) {
        for class in self.classes {
            class.destroy();
        }
    }

    // ==================== Accessors ====================

    #[inline]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn classes(&self) -> &[FixedChunkPool] {
        &self.classes
    }

    pub fn used_count(&self) -> usize {
        self.classes.iter().map(FixedChunkPool::used_count).sum()
    }

    pub fn unused_count(&self) -> usize {
        self.classes.iter().map(FixedChunkPool::unused_count).sum()
    }
}

fn class_count(max_size: usize) -> usize {
    let mut count = 1;
    while (BASE_CHUNK_SIZE << (count - 1)) < max_size {
        count += 1;
    }
    count
}
