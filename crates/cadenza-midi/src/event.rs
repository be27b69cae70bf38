//! RT-safe MIDI event types.

use serde::{Deserialize, Serialize};

/// Lowest pitch wheel value (full bend down).
pub const PITCH_WHEEL_MIN: i16 = -8192;
/// Highest pitch wheel value (full bend up).
pub const PITCH_WHEEL_MAX: i16 = 8191;

/// Channel voice message body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelMessage {
    NoteOff { note: u8, velocity: u8 },
    NoteOn { note: u8, velocity: u8 },
    /// Polyphonic key pressure.
    Aftertouch { note: u8, pressure: u8 },
    ControlChange { controller: u8, value: u8 },
    ProgramChange { program: u8 },
    ChannelPressure { pressure: u8 },
    /// Signed bend, centered at 0, range `[-8192, 8191]`.
    PitchWheel { value: i16 },
}

impl ChannelMessage {
    /// Status nibble (high four bits of the status byte).
    #[inline]
    pub fn status(&self) -> u8 {
        match self {
            Self::NoteOff { .. } => 0x80,
            Self::NoteOn { .. } => 0x90,
            Self::Aftertouch { .. } => 0xA0,
            Self::ControlChange { .. } => 0xB0,
            Self::ProgramChange { .. } => 0xC0,
            Self::ChannelPressure { .. } => 0xD0,
            Self::PitchWheel { .. } => 0xE0,
        }
    }

    /// Encoded length in bytes, status included.
    #[inline]
    pub fn wire_len(&self) -> usize {
        match self {
            Self::ProgramChange { .. } | Self::ChannelPressure { .. } => 2,
            _ => 3,
        }
    }
}

/// Channel voice message on one of the 16 MIDI channels (0-15).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MidiEvent {
    pub channel: u8,
    pub msg: ChannelMessage,
}

impl MidiEvent {
    #[inline]
    pub fn new(channel: u8, msg: ChannelMessage) -> Self {
        Self { channel, msg }
    }

    #[inline]
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(channel, ChannelMessage::NoteOn { note, velocity })
    }

    #[inline]
    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(channel, ChannelMessage::NoteOff { note, velocity })
    }

    #[inline]
    pub fn aftertouch(channel: u8, note: u8, pressure: u8) -> Self {
        Self::new(channel, ChannelMessage::Aftertouch { note, pressure })
    }

    #[inline]
    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self::new(channel, ChannelMessage::ControlChange { controller, value })
    }

    #[inline]
    pub fn program_change(channel: u8, program: u8) -> Self {
        Self::new(channel, ChannelMessage::ProgramChange { program })
    }

    #[inline]
    pub fn channel_pressure(channel: u8, pressure: u8) -> Self {
        Self::new(channel, ChannelMessage::ChannelPressure { pressure })
    }

    #[inline]
    pub fn pitch_wheel(channel: u8, value: i16) -> Self {
        Self::new(channel, ChannelMessage::PitchWheel { value })
    }

    #[inline]
    pub fn is_note_on(&self) -> bool {
        matches!(self.msg, ChannelMessage::NoteOn { velocity, .. } if velocity > 0)
    }

    /// Note Off, or Note On with velocity 0.
    #[inline]
    pub fn is_note_off(&self) -> bool {
        matches!(
            self.msg,
            ChannelMessage::NoteOff { .. } | ChannelMessage::NoteOn { velocity: 0, .. }
        )
    }

    #[inline]
    pub fn note(&self) -> Option<u8> {
        match self.msg {
            ChannelMessage::NoteOn { note, .. }
            | ChannelMessage::NoteOff { note, .. }
            | ChannelMessage::Aftertouch { note, .. } => Some(note),
            _ => None,
        }
    }

    #[inline]
    pub fn velocity(&self) -> Option<u8> {
        match self.msg {
            ChannelMessage::NoteOn { velocity, .. } | ChannelMessage::NoteOff { velocity, .. } => {
                Some(velocity)
            }
            _ => None,
        }
    }

    /// Attach an absolute transport frame.
    #[inline]
    pub fn at(self, frame_time: u64) -> TimedMidiEvent {
        TimedMidiEvent {
            frame_time,
            event: self,
        }
    }
}

/// MIDI event stamped with an absolute transport frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimedMidiEvent {
    pub frame_time: u64,
    pub event: MidiEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on() {
        let event = MidiEvent::note_on(0, 60, 100);
        assert!(event.is_note_on());
        assert!(!event.is_note_off());
        assert_eq!(event.note(), Some(60));
        assert_eq!(event.velocity(), Some(100));
        assert_eq!(event.channel, 0);
    }

    #[test]
    fn test_note_on_zero_velocity_is_note_off() {
        let event = MidiEvent::note_on(0, 60, 0);
        assert!(event.is_note_off());
        assert!(!event.is_note_on());
    }

    #[test]
    fn test_aftertouch_has_note_but_no_velocity() {
        let event = MidiEvent::aftertouch(3, 64, 20);
        assert_eq!(event.note(), Some(64));
        assert_eq!(event.velocity(), None);
    }

    #[test]
    fn test_wire_len_and_status() {
        assert_eq!(MidiEvent::program_change(0, 5).msg.wire_len(), 2);
        assert_eq!(MidiEvent::channel_pressure(0, 5).msg.wire_len(), 2);
        assert_eq!(MidiEvent::pitch_wheel(0, 0).msg.wire_len(), 3);
        assert_eq!(MidiEvent::control_change(0, 7, 1).msg.status(), 0xB0);
    }

    #[test]
    fn test_timed_event() {
        let timed = MidiEvent::note_off(2, 60, 0).at(48_000);
        assert_eq!(timed.frame_time, 48_000);
        assert_eq!(timed.event.channel, 2);
    }
}
