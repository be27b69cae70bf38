//! Raw MIDI records as stored in pool chunks.
//!
//! Layout (little-endian):
//!
//! ```text
//! [0..8)   frame_time  u64
//! [8]      size        u8
//! [9..)    payload     `size` bytes
//! ```

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Bytes before the payload.
pub const RECORD_HEADER_SIZE: usize = 9;

/// Largest payload a record can describe.
pub const MAX_RECORD_PAYLOAD: usize = u8::MAX as usize;

/// Chunk size needed to hold a payload of `max_event_size` bytes.
#[inline]
pub const fn record_size(max_event_size: usize) -> usize {
    RECORD_HEADER_SIZE + max_event_size
}

/// Borrowed view of one record inside a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordRef<'a> {
    pub frame_time: u64,
    pub bytes: &'a [u8],
}

impl<'a> RecordRef<'a> {
    /// Parse a record from the start of `buf`.
    ///
    /// Returns `None` if the buffer is too short for the header or for the
    /// payload size it declares.
    #[inline]
    pub fn read(buf: &'a [u8]) -> Option<Self> {
        let header = buf.get(..RECORD_HEADER_SIZE)?;
        let mut time = [0u8; 8];
        time.copy_from_slice(&header[..8]);
        let size = header[8] as usize;
        let bytes = buf.get(RECORD_HEADER_SIZE..RECORD_HEADER_SIZE + size)?;
        Some(Self {
            frame_time: u64::from_le_bytes(time),
            bytes,
        })
    }

    /// Write this record to the start of `buf`.
    ///
    /// Returns the number of bytes written, or `None` (leaving `buf`
    /// untouched) if the payload is too long for a record or for `buf`.
    #[inline]
    pub fn write(&self, buf: &mut [u8]) -> Option<usize> {
        let size = self.bytes.len();
        if size > MAX_RECORD_PAYLOAD {
            return None;
        }
        let total = RECORD_HEADER_SIZE + size;
        let out = buf.get_mut(..total)?;
        out[..8].copy_from_slice(&self.frame_time.to_le_bytes());
        out[8] = size as u8;
        out[RECORD_HEADER_SIZE..].copy_from_slice(self.bytes);
        Some(total)
    }

    pub fn to_raw(&self) -> RawMidiEvent {
        RawMidiEvent {
            frame_time: self.frame_time,
            data: SmallVec::from_slice(self.bytes),
        }
    }
}

/// Owned raw MIDI message with its absolute frame time.
///
/// Channel messages stay inline; sysex-sized payloads spill to the heap, so
/// this type is for non-realtime callers only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMidiEvent {
    pub frame_time: u64,
    pub data: SmallVec<[u8; 4]>,
}

impl RawMidiEvent {
    pub fn new(frame_time: u64, bytes: &[u8]) -> Self {
        Self {
            frame_time,
            data: SmallVec::from_slice(bytes),
        }
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_record(&self) -> RecordRef<'_> {
        RecordRef {
            frame_time: self.frame_time,
            bytes: &self.data,
        }
    }
}
