//! Session: the control-side handle shared by every non-realtime thread.
//!
//! A session owns both pools, the consumer-visible inbound queue and the
//! destination table. Control threads use the cheap-to-clone [`Session`];
//! the audio thread gets a single [`Processor`] from
//! [`Session::processor`].

use crate::config::SessionConfig;
use crate::driver::PortId;
use crate::lockfree::AtomicFlag;
use crate::metrics::{MetricsSnapshot, SessionMetrics};
use crate::processor::Processor;
use crate::{Error, Result};
use cadenza_midi::{
    decode, record_size, DecodeError, MidiEvent, RawMidiEvent, RecordRef, TimedMidiEvent,
};
use cadenza_pool::{
    Chunk, FixedChunkPool, MultiSizePool, PoolMaintainer, SizedChunk, SleepyReport,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Outcome of reading one inbound record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundRead {
    /// The inbound queue is empty.
    Empty,
    /// A record was consumed but is not a channel voice message.
    Malformed {
        raw: RawMidiEvent,
        error: DecodeError,
    },
    Event(TimedMidiEvent),
}

/// Destination description returned by [`Session::ports`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub id: PortId,
    pub name: String,
    /// Events waiting for delivery.
    pub pending: usize,
}

pub(crate) struct Pending {
    pub(crate) frame_time: u64,
    pub(crate) chunk: SizedChunk,
}

pub(crate) struct Destination {
    pub(crate) id: PortId,
    name: String,
    /// Ordered by frame time; equal times keep insertion order.
    pub(crate) pending: VecDeque<Pending>,
}

impl Destination {
    fn insert(&mut self, frame_time: u64, chunk: SizedChunk) {
        let at = self.pending.partition_point(|p| p.frame_time <= frame_time);
        self.pending.insert(at, Pending { frame_time, chunk });
    }
}

/// State guarded by the session mutex.
pub(crate) struct Queues {
    pub(crate) inbound: VecDeque<Chunk>,
    pub(crate) destinations: Vec<Destination>,
    next_port: u32,
}

impl Queues {
    fn destination_mut(&mut self, id: PortId) -> Option<&mut Destination> {
        self.destinations.iter_mut().find(|d| d.id == id)
    }

    fn destination(&self, id: PortId) -> Option<&Destination> {
        self.destinations.iter().find(|d| d.id == id)
    }
}

pub(crate) struct SessionShared {
    pub(crate) config: SessionConfig,
    pub(crate) inbound_pool: FixedChunkPool,
    pub(crate) outbound_pool: MultiSizePool,
    pub(crate) queues: Mutex<Queues>,
    pub(crate) do_process: AtomicFlag,
    pub(crate) want_events: AtomicFlag,
    pub(crate) metrics: SessionMetrics,
    /// Serializes control-plane flag changes around destination edits.
    control: Mutex<()>,
}

/// Control-side session handle.
///
/// Clone is cheap; clones share the same session. Every method here may
/// block and must not be called from the audio thread.
///
/// # Example
///
/// ```ignore
/// use cadenza_core::{MidiEvent, Session};
///
/// let session = Session::builder().max_event_size(32).build()?;
/// let synth = session.create_port("synth");
/// let mut processor = session.processor();
///
/// session.put_event(synth, &MidiEvent::note_on(0, 60, 100), 48_000)?;
/// // Audio thread: processor.process(&ctx, &mut outputs);
/// ```
#[derive(Clone)]
pub struct Session {
    shared: Arc<SessionShared>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;

        let inbound_pool = FixedChunkPool::with_config(config.inbound_pool_config())?;
        let outbound_pool = MultiSizePool::new(
            config.outbound_record_size(),
            config.outbound_min_chunks,
            config.outbound_max_chunks,
        )?;
        let queues = Queues {
            inbound: VecDeque::with_capacity(config.inbound_capacity),
            destinations: Vec::new(),
            next_port: 0,
        };

        tracing::debug!(
            "Created MIDI session: max_event_size={}, inbound_capacity={}, outbound_max_size={}",
            config.max_event_size,
            config.inbound_capacity,
            config.outbound_max_size
        );

        Ok(Self {
            shared: Arc::new(SessionShared {
                config,
                inbound_pool,
                outbound_pool,
                queues: Mutex::new(queues),
                do_process: AtomicFlag::new(true),
                want_events: AtomicFlag::new(false),
                metrics: SessionMetrics::new(),
                control: Mutex::new(()),
            }),
        })
    }

    pub fn builder() -> crate::SessionBuilder {
        crate::SessionBuilder::default()
    }

    /// Create the audio-thread side of this session.
    ///
    /// Allocates the processor's pending list. Use one processor per driver
    /// callback.
    pub fn processor(&self) -> Processor {
        Processor::new(Arc::clone(&self.shared))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    // ==================== Flags ====================

    /// Enable or disable input capture. Pending captured events are still
    /// handed off while disabled.
    pub fn want_events(&self, enabled: bool) {
        self.shared.want_events.set(enabled);
    }

    pub fn wants_events(&self) -> bool {
        self.shared.want_events.get()
    }

    /// Pause or resume the audio thread. While paused every callback
    /// clears its outputs and does nothing else.
    pub fn set_processing(&self, enabled: bool) {
        let _control = self.shared.control.lock();
        self.shared.do_process.set(enabled);
    }

    pub fn is_processing(&self) -> bool {
        self.shared.do_process.get()
    }

    // ==================== Inbound ====================

    /// Pop and decode the oldest captured event.
    pub fn read_event(&self) -> InboundRead {
        let Some(chunk) = self.shared.queues.lock().inbound.pop_front() else {
            return InboundRead::Empty;
        };

        let pool = &self.shared.inbound_pool;
        let read = match RecordRef::read(pool.bytes(&chunk)) {
            Some(record) => match decode(record.bytes) {
                Ok(event) => InboundRead::Event(event.at(record.frame_time)),
                Err(error) => InboundRead::Malformed {
                    raw: record.to_raw(),
                    error,
                },
            },
            None => InboundRead::Malformed {
                raw: RawMidiEvent::new(0, &[]),
                error: DecodeError::Empty,
            },
        };
        pool.deallocate(chunk);

        if let InboundRead::Malformed { raw, error } = &read {
            self.shared.metrics.record_malformed();
            tracing::debug!(
                "Skipping malformed MIDI input at frame {}: {}",
                raw.frame_time,
                error
            );
        }
        read
    }

    /// Pop the oldest decodable event, discarding malformed records.
    pub fn get_event(&self) -> Option<TimedMidiEvent> {
        loop {
            match self.read_event() {
                InboundRead::Event(event) => return Some(event),
                InboundRead::Malformed { .. } => continue,
                InboundRead::Empty => return None,
            }
        }
    }

    /// Pop the oldest captured record without decoding it.
    pub fn get_raw_event(&self) -> Option<RawMidiEvent> {
        let chunk = self.shared.queues.lock().inbound.pop_front()?;
        let pool = &self.shared.inbound_pool;
        let raw = RecordRef::read(pool.bytes(&chunk))
            .map(|record| record.to_raw())
            .unwrap_or_else(|| RawMidiEvent::new(0, &[]));
        pool.deallocate(chunk);
        Some(raw)
    }

    /// Records handed off by the audio thread and not yet read.
    pub fn inbound_len(&self) -> usize {
        self.shared.queues.lock().inbound.len()
    }

    /// Discard every queued inbound record. Returns how many were dropped.
    pub fn clear_inbound(&self) -> usize {
        let drained: Vec<Chunk> = self.shared.queues.lock().inbound.drain(..).collect();
        let count = drained.len();
        for chunk in drained {
            self.shared.inbound_pool.deallocate(chunk);
        }
        count
    }

    // ==================== Outbound ====================

    /// Queue a channel voice event for delivery at `frame_time`.
    ///
    /// The outbound pool grows when every chunk is queued, so this never
    /// waits on the audio thread. An unknown destination is logged, counted
    /// and otherwise ignored.
    pub fn put_event(&self, port: PortId, event: &MidiEvent, frame_time: u64) -> Result<()> {
        self.put_raw(port, event.to_bytes().as_bytes(), frame_time)
    }

    /// Queue pre-encoded bytes (for example sysex) for delivery at
    /// `frame_time`.
    pub fn put_raw(&self, port: PortId, bytes: &[u8], frame_time: u64) -> Result<()> {
        if bytes.is_empty() {
            return Err(Error::EmptyEvent);
        }
        let max = self.shared.config.outbound_max_size;
        if bytes.len() > max {
            return Err(Error::EventTooLarge {
                size: bytes.len(),
                max,
            });
        }

        let pool = &self.shared.outbound_pool;
        let mut chunk = pool.allocate_or_wait(record_size(bytes.len()))?;
        let record = RecordRef { frame_time, bytes };
        if record.write(pool.bytes_mut(&mut chunk)).is_none() {
            pool.deallocate(chunk);
            return Err(Error::EventTooLarge {
                size: bytes.len(),
                max,
            });
        }

        let mut queues = self.shared.queues.lock();
        match queues.destination_mut(port) {
            Some(destination) => {
                destination.insert(frame_time, chunk);
                Ok(())
            }
            None => {
                drop(queues);
                pool.deallocate(chunk);
                self.shared.metrics.record_unknown_destination();
                tracing::warn!("Dropping MIDI event for unknown destination {}", port);
                Ok(())
            }
        }
    }

    /// Events queued for `port`, or `None` if it does not exist.
    pub fn pending_count(&self, port: PortId) -> Option<usize> {
        self.shared
            .queues
            .lock()
            .destination(port)
            .map(|d| d.pending.len())
    }

    // ==================== Destinations ====================

    pub fn create_port(&self, name: impl Into<String>) -> PortId {
        let name = name.into();
        let id = self.edit_destinations(|queues| {
            let id = PortId(queues.next_port);
            queues.next_port += 1;
            queues.destinations.push(Destination {
                id,
                name: name.clone(),
                pending: VecDeque::new(),
            });
            id
        });

        tracing::debug!("Created MIDI output port {}: {}", id.index(), name);
        id
    }

    /// Remove a destination, dropping its queued events.
    ///
    /// Returns `false` if the port does not exist.
    pub fn destroy_port(&self, port: PortId) -> bool {
        let removed = self.edit_destinations(|queues| {
            let index = queues.destinations.iter().position(|d| d.id == port)?;
            Some(queues.destinations.remove(index))
        });

        let Some(destination) = removed else {
            tracing::debug!("Destroy of unknown MIDI output port {}", port.index());
            return false;
        };

        let dropped = destination.pending.len();
        for pending in destination.pending {
            self.shared.outbound_pool.deallocate(pending.chunk);
        }
        tracing::debug!(
            "Destroyed MIDI output port {}: {} ({} pending events dropped)",
            port.index(),
            destination.name,
            dropped
        );
        true
    }

    pub fn port_name(&self, port: PortId) -> Option<String> {
        self.shared
            .queues
            .lock()
            .destination(port)
            .map(|d| d.name.clone())
    }

    pub fn ports(&self) -> Vec<PortInfo> {
        self.shared
            .queues
            .lock()
            .destinations
            .iter()
            .map(|d| PortInfo {
                id: d.id,
                name: d.name.clone(),
                pending: d.pending.len(),
            })
            .collect()
    }

    /// Run `edit` on the destination table with the audio thread paused.
    fn edit_destinations<T>(&self, edit: impl FnOnce(&mut Queues) -> T) -> T {
        let _control = self.shared.control.lock();
        let was_processing = self.shared.do_process.swap(false);
        let mut queues = self.shared.queues.lock();
        let result = edit(&mut queues);
        drop(queues);
        self.shared.do_process.set(was_processing);
        result
    }

    // ==================== Pools & Diagnostics ====================

    /// Refill or trim both pools now. Blocking.
    pub fn sleepy(&self) -> Result<SleepyReport> {
        let inbound = self.shared.inbound_pool.sleepy()?;
        let outbound = self.shared.outbound_pool.sleepy()?;
        Ok(inbound.merge(outbound))
    }

    /// Hand both pools to a maintainer thread for periodic refills.
    pub fn register_pools(&self, maintainer: &PoolMaintainer) -> Result<()> {
        maintainer.register(self.shared.inbound_pool.clone())?;
        maintainer.register(self.shared.outbound_pool.clone())?;
        Ok(())
    }

    pub fn inbound_pool(&self) -> &FixedChunkPool {
        &self.shared.inbound_pool
    }

    pub fn outbound_pool(&self) -> &MultiSizePool {
        &self.shared.outbound_pool
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.shared.metrics.reset();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.shared.config)
            .field("processing", &self.is_processing())
            .field("want_events", &self.wants_events())
            .finish()
    }
}
