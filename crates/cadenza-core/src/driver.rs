//! Audio driver callback contract.
//!
//! The driver hands the session one [`ProcessContext`] per callback and a
//! set of output buffers to fill. Nothing here allocates after construction.

use serde::{Deserialize, Serialize};

/// Handle to an output destination. Ids are never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId(pub(crate) u32);

impl PortId {
    #[inline]
    pub fn index(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for PortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "port:{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    #[default]
    Stopped,
    Rolling,
}

/// Transport state at the first frame of the block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportInfo {
    pub state: TransportState,
    /// Absolute transport frame at block start.
    pub frame: u64,
}

impl TransportInfo {
    pub fn rolling(frame: u64) -> Self {
        Self {
            state: TransportState::Rolling,
            frame,
        }
    }

    pub fn stopped(frame: u64) -> Self {
        Self {
            state: TransportState::Stopped,
            frame,
        }
    }

    #[inline]
    pub fn is_rolling(&self) -> bool {
        self.state == TransportState::Rolling
    }
}

/// Raw MIDI input stamped with a block-relative frame offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent<'a> {
    pub offset: usize,
    pub bytes: &'a [u8],
}

impl<'a> InputEvent<'a> {
    pub fn new(offset: usize, bytes: &'a [u8]) -> Self {
        Self { offset, bytes }
    }
}

/// Everything the driver supplies for one callback.
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext<'a> {
    /// Block length in frames.
    pub nframes: usize,
    pub transport: TransportInfo,
    /// Input events for this block, in offset order.
    pub inputs: &'a [InputEvent<'a>],
}

impl<'a> ProcessContext<'a> {
    pub fn new(nframes: usize, transport: TransportInfo, inputs: &'a [InputEvent<'a>]) -> Self {
        Self {
            nframes,
            transport,
            inputs,
        }
    }

    #[inline]
    pub fn block_start(&self) -> u64 {
        self.transport.frame
    }

    /// First frame after this block.
    #[inline]
    pub fn block_end(&self) -> u64 {
        self.transport.frame.saturating_add(self.nframes as u64)
    }
}

/// Driver-owned MIDI output buffer for one destination.
pub trait MidiOutputBuffer {
    /// Drop everything written this block.
    fn clear(&mut self);

    /// Write one message at a block-relative offset.
    ///
    /// Returns `false` if the buffer has no room; the caller keeps the event.
    fn write(&mut self, offset: usize, bytes: &[u8]) -> bool;
}

/// Lookup of output buffers by destination.
pub trait OutputBuffers {
    fn buffer(&mut self, port: PortId) -> Option<&mut dyn MidiOutputBuffer>;

    /// Clear every buffer (silence the block).
    fn clear_all(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BufferedEvent {
    offset: usize,
    start: usize,
    len: usize,
}

/// Preallocated [`MidiOutputBuffer`] storing events and their bytes inline.
#[derive(Debug, Clone)]
pub struct EventBuffer {
    events: Vec<BufferedEvent>,
    data: Vec<u8>,
    max_events: usize,
    max_bytes: usize,
}

impl EventBuffer {
    pub fn with_capacity(max_events: usize, max_bytes: usize) -> Self {
        Self {
            events: Vec::with_capacity(max_events),
            data: Vec::with_capacity(max_bytes),
            max_events,
            max_bytes,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[u8])> + '_ {
        self.events
            .iter()
            .map(|e| (e.offset, &self.data[e.start..e.start + e.len]))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::with_capacity(256, 4096)
    }
}

impl MidiOutputBuffer for EventBuffer {
    #[inline]
    fn clear(&mut self) {
        self.events.clear();
        self.data.clear();
    }

    #[inline]
    fn write(&mut self, offset: usize, bytes: &[u8]) -> bool {
        if self.events.len() >= self.max_events || self.data.len() + bytes.len() > self.max_bytes {
            return false;
        }
        let start = self.data.len();
        self.data.extend_from_slice(bytes);
        self.events.push(BufferedEvent {
            offset,
            start,
            len: bytes.len(),
        });
        true
    }
}

/// [`OutputBuffers`] backed by one [`EventBuffer`] per destination.
#[derive(Debug, Clone, Default)]
pub struct EventBufferSet {
    buffers: Vec<(PortId, EventBuffer)>,
}

impl EventBufferSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the buffer for `port`. Not RT-safe.
    pub fn insert(&mut self, port: PortId, buffer: EventBuffer) {
        match self.buffers.iter_mut().find(|(id, _)| *id == port) {
            Some((_, existing)) => *existing = buffer,
            None => self.buffers.push((port, buffer)),
        }
    }

    pub fn remove(&mut self, port: PortId) -> Option<EventBuffer> {
        let index = self.buffers.iter().position(|(id, _)| *id == port)?;
        Some(self.buffers.swap_remove(index).1)
    }

    pub fn get(&self, port: PortId) -> Option<&EventBuffer> {
        self.buffers
            .iter()
            .find(|(id, _)| *id == port)
            .map(|(_, buffer)| buffer)
    }
}

impl OutputBuffers for EventBufferSet {
    fn buffer(&mut self, port: PortId) -> Option<&mut dyn MidiOutputBuffer> {
        self.buffers
            .iter_mut()
            .find(|(id, _)| *id == port)
            .map(|(_, buffer)| buffer as &mut dyn MidiOutputBuffer)
    }

    fn clear_all(&mut self) {
        for (_, buffer) in &mut self.buffers {
            buffer.clear();
        }
    }
}
