//! Fixed-size chunk pool with lock-free allocate/deallocate.
//!
//! Chunks live in an index-based arena: a table of slot segments plus a
//! lock-free list of free slot indices per segment. Segment `k` holds
//! `initial_slots << k` slots. Growable pools add segments on the non-RT
//! path; a segment never moves once published, so RT readers never see a
//! reallocation.
//!
//! ```text
//! Control thread (sleepy)            Audio thread
//!     │                                   │
//!     ▼                                   ▼
//! ┌──────────────┐   push index   ┌───────────────┐   pop index
//! │ vacant slots │ ─────────────▶ │  free indices │ ◀──────────── allocate()
//! │ (Mutex, Vec) │ ◀───────────── │ (ArrayQueue)  │ ────────────▶ deallocate()
//! └──────────────┘   trim         └───────────────┘
//!        │ grow (new segment)
//!        ▼
//! ```
//!
//! # RT Safety
//!
//! - `allocate()` / `deallocate()`: lock-free queue operations over at most
//!   [`MAX_SEGMENTS`] segments plus an atomic counter update. No heap
//!   allocation, no locks.
//! - `sleepy()` / `allocate_or_wait()`: allocate or free backing memory and
//!   take the vacant-list mutex. Never call these on the audio thread.

use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crossbeam_queue::ArrayQueue;
use parking_lot::Mutex;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Back-off between attempts when `allocate_or_wait` hits a fixed pool's ceiling.
const WAIT_BACKOFF: Duration = Duration::from_micros(200);

/// Most segments an arena can have. Segment sizes double, so this covers
/// the whole `u32` index space for any `initial_slots`.
pub const MAX_SEGMENTS: usize = 32;

/// Handle to an allocated chunk.
///
/// Move-only: holding the handle is what grants access to the chunk's bytes.
/// Give it back with [`FixedChunkPool::deallocate`]; dropping it leaks the
/// slot until the pool itself is dropped.
#[must_use = "chunks must be returned to their pool with `deallocate`"]
#[derive(Debug, PartialEq, Eq)]
pub struct Chunk {
    index: u32,
    owner: usize,
}

impl Chunk {
    /// Slot index inside the owning pool.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// Result of a refill/trim pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SleepyReport {
    /// Chunks whose backing memory was allocated.
    pub created: usize,
    /// Chunks whose backing memory was released.
    pub freed: usize,
}

impl SleepyReport {
    pub fn merge(self, other: SleepyReport) -> Self {
        Self {
            created: self.created + other.created,
            freed: self.freed + other.freed,
        }
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.created == 0 && self.freed == 0
    }
}

struct Slot {
    data: UnsafeCell<Option<Box<[u8]>>>,
}

// SAFETY: a slot's contents are only touched by whoever currently owns its
// index: the vacant list (under its mutex), a free queue (nobody touches
// the data while the index sits there), or a `Chunk` handle. Ownership moves
// through the queue, whose push/pop pair provides the happens-before edge.
unsafe impl Sync for Slot {}

struct Segment {
    /// Index of the first slot in this segment.
    start: u32,
    slots: Box<[Slot]>,
    /// Sized to the segment, so pushing one of its own indices never fails.
    free: ArrayQueue<u32>,
}

impl Segment {
    fn new(start: u32, len: usize) -> Self {
        Self {
            start,
            slots: (0..len)
                .map(|_| Slot {
                    data: UnsafeCell::new(None),
                })
                .collect(),
            free: ArrayQueue::new(len),
        }
    }

    #[inline]
    fn slot(&self, index: u32) -> Option<&Slot> {
        self.slots.get(index.checked_sub(self.start)? as usize)
    }
}

struct PoolInner {
    config: PoolConfig,
    /// Published in order under the vacant mutex, never replaced.
    segments: [OnceLock<Segment>; MAX_SEGMENTS],
    vacant: Mutex<Vec<u32>>,
    used: AtomicUsize,
}

/// Pool of equal-size chunks.
///
/// Clone is cheap (Arc internally); every clone refers to the same pool, so
/// the audio thread and the refill thread can each hold one.
#[derive(Clone)]
pub struct FixedChunkPool {
    inner: Arc<PoolInner>,
}

impl FixedChunkPool {
    /// Create a growable pool and preallocate `min_preallocated` chunks.
    ///
    /// May allocate and therefore block. Never call from the audio thread.
    pub fn new(chunk_size: usize, min_preallocated: usize, max_preallocated: usize) -> Result<Self> {
        Self::with_config(PoolConfig::new(chunk_size, min_preallocated, max_preallocated))
    }

    pub fn with_config(config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let first = config.initial_slots;
        let segments: [OnceLock<Segment>; MAX_SEGMENTS] = std::array::from_fn(|_| OnceLock::new());
        let _ = segments[0].set(Segment::new(0, first));
        // Reversed so the lowest indices are handed out first.
        let vacant: Vec<u32> = (0..first as u32).rev().collect();

        let pool = Self {
            inner: Arc::new(PoolInner {
                config,
                segments,
                vacant: Mutex::new(vacant),
                used: AtomicUsize::new(0),
            }),
        };

        let created = pool.refill(config.min_preallocated)?;
        tracing::debug!(
            "Created chunk pool: chunk_size={}, preallocated={}, initial_slots={}, growable={}",
            config.chunk_size,
            created,
            first,
            config.growable
        );
        Ok(pool)
    }

    // ==================== RT Thread Methods ====================

    /// Take a free chunk. RT-safe (lock-free, no allocation).
    ///
    /// Returns `None` when every free list is empty.
    #[inline]
    pub fn allocate(&self) -> Option<Chunk> {
        let index = self.segments().find_map(|segment| segment.free.pop())?;
        self.inner.used.fetch_add(1, Ordering::AcqRel);
        Some(Chunk {
            index,
            owner: self.owner_tag(),
        })
    }

    /// Return a chunk to the free list. RT-safe (lock-free, never frees memory).
    ///
    /// # Panics
    ///
    /// Panics if the chunk was allocated by a different pool.
    #[inline]
    pub fn deallocate(&self, chunk: Chunk) {
        self.check_owner(&chunk);
        if let Some(segment) = self.segment_of(chunk.index) {
            let _ = segment.free.push(chunk.index);
        }
        self.inner.used.fetch_sub(1, Ordering::AcqRel);
    }

    /// Read access to an allocated chunk. RT-safe.
    #[inline]
    pub fn bytes<'a>(&'a self, chunk: &'a Chunk) -> &'a [u8] {
        self.check_owner(chunk);
        let Some(slot) = self.slot(chunk.index) else {
            return &[];
        };
        // SAFETY: the slot belongs to `chunk`, and the shared borrow of the
        // handle excludes a concurrent `bytes_mut`.
        let data = unsafe { &*slot.data.get() };
        data.as_deref().unwrap_or(&[])
    }

    /// Write access to an allocated chunk. RT-safe.
    #[inline]
    pub fn bytes_mut<'a>(&'a self, chunk: &'a mut Chunk) -> &'a mut [u8] {
        self.check_owner(chunk);
        let Some(slot) = self.slot(chunk.index) else {
            return &mut [];
        };
        // SAFETY: the slot belongs to `chunk`, and the unique borrow of the
        // handle makes this the only live reference to it.
        let data = unsafe { &mut *slot.data.get() };
        data.as_deref_mut().unwrap_or(&mut [])
    }

    // ==================== Non-RT Methods ====================

    /// Allocate, refilling as needed until a chunk is available.
    ///
    /// A growable pool adds a slot segment when every slot is in use and
    /// fails only once the slot index space is exhausted. A fixed pool
    /// waits at its ceiling until another thread deallocates. Never call
    /// from the audio thread.
    pub fn allocate_or_wait(&self) -> Result<Chunk> {
        let target = self.inner.config.min_preallocated.max(1);
        loop {
            if let Some(chunk) = self.allocate() {
                return Ok(chunk);
            }
            if self.refill(target)? == 0 {
                std::thread::sleep(WAIT_BACKOFF);
            }
        }
    }

    /// Refill the free list toward `min_preallocated` or trim it toward
    /// `max_preallocated`.
    ///
    /// Allocates or frees backing memory, so it may block. Never call from
    /// the audio thread.
    pub fn sleepy(&self) -> Result<SleepyReport> {
        let config = &self.inner.config;
        let mut vacant = self.inner.vacant.lock();
        let free = self.unused_count();

        let report = if free < config.min_preallocated {
            SleepyReport {
                created: self.refill_locked(&mut vacant, config.min_preallocated)?,
                freed: 0,
            }
        } else if free > config.max_preallocated {
            SleepyReport {
                created: 0,
                freed: self.trim_locked(&mut vacant, config.max_preallocated),
            }
        } else {
            SleepyReport::default()
        };

        if !report.is_idle() {
            tracing::debug!(
                "Chunk pool ({} bytes): created {}, freed {}, used {}, unused {}",
                config.chunk_size,
                report.created,
                report.freed,
                self.used_count(),
                self.unused_count()
            );
        }
        Ok(report)
    }

    /// Release all backing memory.
    ///
    /// # Panics
    ///
    /// Panics if any chunk is still allocated.
    pub fn destroy(self) {
        let used = self.used_count();
        assert_eq!(
            used, 0,
            "chunk pool destroyed with {} chunks still allocated",
            used
        );
        let mut vacant = self.inner.vacant.lock();
        let freed = self.trim_locked(&mut vacant, 0);
        tracing::debug!(
            "Destroyed chunk pool ({} bytes): freed {}",
            self.inner.config.chunk_size,
            freed
        );
    }

    fn refill(&self, target: usize) -> Result<usize> {
        let mut vacant = self.inner.vacant.lock();
        self.refill_locked(&mut vacant, target)
    }

    fn refill_locked(&self, vacant: &mut Vec<u32>, target: usize) -> Result<usize> {
        let mut created = 0;
        while self.unused_count() < target {
            let index = match vacant.pop() {
                Some(index) => index,
                None if self.inner.config.growable => {
                    self.grow_locked(vacant)?;
                    continue;
                }
                None => break,
            };
            let Some(segment) = self.segment_of(index) else {
                continue;
            };
            let Some(slot) = segment.slot(index) else {
                continue;
            };
            let data = match alloc_backing(self.inner.config.chunk_size) {
                Ok(data) => data,
                Err(e) => {
                    vacant.push(index);
                    return Err(e);
                }
            };
            // SAFETY: vacant indices are owned by the vacant list, locked by the caller.
            unsafe { *slot.data.get() = Some(data) };
            let _ = segment.free.push(index);
            created += 1;
        }
        Ok(created)
    }

    /// Publish the next segment and hand its slots to the vacant list.
    fn grow_locked(&self, vacant: &mut Vec<u32>) -> Result<()> {
        let next = self.segments().count();
        let exhausted = || PoolError::Exhausted {
            slots: self.slot_count(),
        };
        if next >= MAX_SEGMENTS {
            return Err(exhausted());
        }

        let first = self.inner.config.initial_slots;
        let start = first
            .checked_mul((1usize << next) - 1)
            .ok_or_else(exhausted)?;
        let len = first.checked_mul(1usize << next).ok_or_else(exhausted)?;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= u32::MAX as usize)
            .ok_or_else(exhausted)?;

        if self.inner.segments[next]
            .set(Segment::new(start as u32, len))
            .is_err()
        {
            return Err(exhausted());
        }
        vacant.extend((start as u32..end as u32).rev());

        tracing::debug!(
            "Grew chunk pool ({} bytes): segment {} adds {} slots, {} total",
            self.inner.config.chunk_size,
            next,
            len,
            end
        );
        Ok(())
    }

    fn trim_locked(&self, vacant: &mut Vec<u32>, target: usize) -> usize {
        let mut freed = 0;
        for segment in self.segments() {
            while self.unused_count() > target {
                let Some(index) = segment.free.pop() else {
                    break;
                };
                // SAFETY: popping the index off the free queue transfers
                // exclusive ownership of the slot to us.
                if let Some(slot) = segment.slot(index) {
                    unsafe { *slot.data.get() = None };
                }
                vacant.push(index);
                freed += 1;
            }
        }
        freed
    }

    #[inline]
    fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.inner.segments.iter().map_while(OnceLock::get)
    }

    #[inline]
    fn segment_of(&self, index: u32) -> Option<&Segment> {
        let (segment, _) = locate(self.inner.config.initial_slots, index);
        self.inner.segments.get(segment)?.get()
    }

    #[inline]
    fn slot(&self, index: u32) -> Option<&Slot> {
        self.segment_of(index)?.slot(index)
    }

    // ==================== Accessors ====================

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.inner.config.chunk_size
    }

    /// Chunks currently handed out.
    #[inline]
    pub fn used_count(&self) -> usize {
        self.inner.used.load(Ordering::Acquire)
    }

    /// Chunks with backing memory sitting in the free lists.
    #[inline]
    pub fn unused_count(&self) -> usize {
        self.segments().map(|segment| segment.free.len()).sum()
    }

    /// Chunks with backing memory (`used + unused`).
    #[inline]
    pub fn total_count(&self) -> usize {
        self.used_count() + self.unused_count()
    }

    /// Slots in the arena, with or without backing memory.
    pub fn slot_count(&self) -> usize {
        self.segments().map(|segment| segment.slots.len()).sum()
    }

    /// Whether `chunk` was allocated by this pool.
    #[inline]
    pub fn owns(&self, chunk: &Chunk) -> bool {
        chunk.owner == self.owner_tag()
    }

    #[inline]
    fn owner_tag(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    #[inline]
    fn check_owner(&self, chunk: &Chunk) {
        assert!(
            self.owns(chunk),
            "chunk {} does not belong to this pool",
            chunk.index
        );
    }
}

impl std::fmt::Debug for FixedChunkPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedChunkPool")
            .field("chunk_size", &self.chunk_size())
            .field("used", &self.used_count())
            .field("unused", &self.unused_count())
            .field("slots", &self.slot_count())
            .field("growable", &self.inner.config.growable)
            .finish()
    }
}

/// Segment number and in-segment offset of `index`, for a first segment
/// of `first` slots.
///
/// Segment `k` starts at `first * (2^k - 1)`, so `index / first + 1` lies
/// in `[2^k, 2^(k+1))`.
#[inline]
fn locate(first: usize, index: u32) -> (usize, usize) {
    let group = index as usize / first + 1;
    let segment = (usize::BITS - 1 - group.leading_zeros()) as usize;
    let start = first * ((1usize << segment) - 1);
    (segment, index as usize - start)
}

fn alloc_backing(size: usize) -> Result<Box<[u8]>> {
    let mut data = Vec::new();
    data.try_reserve_exact(size)
        .map_err(|_| PoolError::BackingAllocation { size })?;
    data.resize(size, 0);
    Ok(data.into_boxed_slice())
}
