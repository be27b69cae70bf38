//! MIDI event types and a realtime-safe channel voice codec.
//!
//! ```
//! use cadenza_midi::{decode, MidiEvent};
//!
//! let event = decode(&[0x91, 64, 100]).unwrap();
//! assert_eq!(event, MidiEvent::note_on(1, 64, 100));
//! assert_eq!(event.to_bytes().as_bytes(), &[0x91, 64, 100]);
//! ```

pub mod error;
pub use error::{DecodeError, Result};

mod event;
pub use event::{ChannelMessage, MidiEvent, TimedMidiEvent, PITCH_WHEEL_MAX, PITCH_WHEEL_MIN};

mod codec;
pub use codec::{decode, encode, EncodedMessage};

mod raw;
pub use raw::{record_size, RawMidiEvent, RecordRef, MAX_RECORD_PAYLOAD, RECORD_HEADER_SIZE};
