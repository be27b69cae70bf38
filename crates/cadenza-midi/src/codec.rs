//! MIDI 1.0 channel voice codec.
//!
//! Pure and allocation-free; safe to call on the audio thread.
//!
//! | Status | Message          | Bytes |
//! |--------|------------------|-------|
//! | 0x8n   | Note Off         | 3     |
//! | 0x9n   | Note On          | 3     |
//! | 0xAn   | Poly Aftertouch  | 3     |
//! | 0xBn   | Control Change   | 3     |
//! | 0xCn   | Program Change   | 2     |
//! | 0xDn   | Channel Pressure | 2     |
//! | 0xEn   | Pitch Wheel      | 3     |

use crate::error::{DecodeError, Result};
use crate::event::{ChannelMessage, MidiEvent, PITCH_WHEEL_MAX, PITCH_WHEEL_MIN};

const PITCH_WHEEL_CENTER: i32 = 8192;

/// Encoded channel voice message (2 or 3 bytes, stored inline).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodedMessage {
    data: [u8; 3],
    len: u8,
}

impl EncodedMessage {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for EncodedMessage {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Encode a channel voice event.
///
/// Channel and data values are masked to their wire widths; pitch wheel
/// values are clamped to `[-8192, 8191]`.
#[inline]
pub fn encode(event: &MidiEvent) -> EncodedMessage {
    let status = event.msg.status() | (event.channel & 0x0F);
    let (d1, d2) = match event.msg {
        ChannelMessage::NoteOff { note, velocity } | ChannelMessage::NoteOn { note, velocity } => {
            (note, velocity)
        }
        ChannelMessage::Aftertouch { note, pressure } => (note, pressure),
        ChannelMessage::ControlChange { controller, value } => (controller, value),
        ChannelMessage::ProgramChange { program } => (program, 0),
        ChannelMessage::ChannelPressure { pressure } => (pressure, 0),
        ChannelMessage::PitchWheel { value } => {
            let biased = (value.clamp(PITCH_WHEEL_MIN, PITCH_WHEEL_MAX) as i32 + PITCH_WHEEL_CENTER) as u16;
            ((biased & 0x7F) as u8, (biased >> 7) as u8)
        }
    };

    EncodedMessage {
        data: [status, d1 & 0x7F, d2 & 0x7F],
        len: event.msg.wire_len() as u8,
    }
}

/// Decode exactly one channel voice message.
///
/// The status nibble selects the message and the slice length must match it
/// exactly. Running status, system messages and out-of-range data bytes are
/// rejected.
#[inline]
pub fn decode(bytes: &[u8]) -> Result<MidiEvent> {
    let (&status, data) = bytes.split_first().ok_or(DecodeError::Empty)?;
    if status < 0x80 || status >= 0xF0 {
        return Err(DecodeError::UnsupportedStatus(status));
    }

    let expected = match status & 0xF0 {
        0xC0 | 0xD0 => 2,
        _ => 3,
    };
    if bytes.len() != expected {
        return Err(DecodeError::Length {
            status,
            expected,
            actual: bytes.len(),
        });
    }
    if let Some(&bad) = data.iter().find(|&&b| b & 0x80 != 0) {
        return Err(DecodeError::DataByte(bad));
    }

    let channel = status & 0x0F;
    let d1 = data[0];
    let d2 = data.get(1).copied().unwrap_or(0);

    let msg = match status & 0xF0 {
        0x80 => ChannelMessage::NoteOff {
            note: d1,
            velocity: d2,
        },
        0x90 => ChannelMessage::NoteOn {
            note: d1,
            velocity: d2,
        },
        0xA0 => ChannelMessage::Aftertouch {
            note: d1,
            pressure: d2,
        },
        0xB0 => ChannelMessage::ControlChange {
            controller: d1,
            value: d2,
        },
        0xC0 => ChannelMessage::ProgramChange { program: d1 },
        0xD0 => ChannelMessage::ChannelPressure { pressure: d1 },
        _ => ChannelMessage::PitchWheel {
            value: ((((d2 as i32) << 7) | d1 as i32) - PITCH_WHEEL_CENTER) as i16,
        },
    };

    Ok(MidiEvent { channel, msg })
}

impl MidiEvent {
    #[inline]
    pub fn to_bytes(&self) -> EncodedMessage {
        encode(self)
    }

    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midi_msg::{Channel, ChannelVoiceMsg, MidiMsg};
    use proptest::prelude::*;

    #[test]
    fn test_decode_note_on_channel_1() {
        let event = decode(&[0x91, 64, 100]).unwrap();
        assert_eq!(event, MidiEvent::note_on(1, 64, 100));
        assert_eq!(encode(&event).as_bytes(), &[0x91, 64, 100]);
    }

    #[test]
    fn test_decode_two_byte_messages() {
        assert_eq!(
            decode(&[0xC3, 5]).unwrap(),
            MidiEvent::program_change(3, 5)
        );
        assert_eq!(
            decode(&[0xDF, 90]).unwrap(),
            MidiEvent::channel_pressure(15, 90)
        );
    }

    #[test]
    fn test_pitch_wheel_bias() {
        assert_eq!(decode(&[0xE0, 0, 64]).unwrap(), MidiEvent::pitch_wheel(0, 0));
        assert_eq!(decode(&[0xE0, 0, 0]).unwrap(), MidiEvent::pitch_wheel(0, -8192));
        assert_eq!(
            decode(&[0xE0, 0x7F, 0x7F]).unwrap(),
            MidiEvent::pitch_wheel(0, 8191)
        );
        assert_eq!(encode(&MidiEvent::pitch_wheel(0, 1)).as_bytes(), &[0xE0, 1, 64]);
    }

    #[test]
    fn test_pitch_wheel_clamped_on_encode() {
        let bytes = encode(&MidiEvent::pitch_wheel(0, i16::MIN));
        assert_eq!(bytes.as_bytes(), &[0xE0, 0, 0]);
        let bytes = encode(&MidiEvent::pitch_wheel(0, i16::MAX));
        assert_eq!(bytes.as_bytes(), &[0xE0, 0x7F, 0x7F]);
    }

    #[test]
    fn test_malformed_inputs() {
        assert_eq!(decode(&[]), Err(DecodeError::Empty));
        assert_eq!(decode(&[0x40, 1, 2]), Err(DecodeError::UnsupportedStatus(0x40)));
        assert_eq!(decode(&[0xF0, 1, 0xF7]), Err(DecodeError::UnsupportedStatus(0xF0)));
        assert_eq!(decode(&[0xF8]), Err(DecodeError::UnsupportedStatus(0xF8)));
        assert_eq!(
            decode(&[0x90, 60]),
            Err(DecodeError::Length {
                status: 0x90,
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(
            decode(&[0xC0, 1, 2]),
            Err(DecodeError::Length {
                status: 0xC0,
                expected: 2,
                actual: 3
            })
        );
        assert_eq!(decode(&[0x90, 0x80, 1]), Err(DecodeError::DataByte(0x80)));
    }

    #[test]
    fn test_encode_masks_out_of_range_values() {
        let bytes = encode(&MidiEvent::note_on(17, 200, 255));
        assert_eq!(bytes.as_bytes(), &[0x91, 200 & 0x7F, 0x7F]);
    }

    #[test]
    fn test_matches_midi_msg_encoding() {
        let cases = [
            (
                MidiEvent::note_on(1, 64, 100),
                ChannelVoiceMsg::NoteOn {
                    note: 64,
                    velocity: 100,
                },
            ),
            (
                MidiEvent::note_off(9, 36, 0),
                ChannelVoiceMsg::NoteOff {
                    note: 36,
                    velocity: 0,
                },
            ),
            (
                MidiEvent::aftertouch(2, 60, 33),
                ChannelVoiceMsg::PolyPressure {
                    note: 60,
                    pressure: 33,
                },
            ),
            (
                MidiEvent::program_change(4, 12),
                ChannelVoiceMsg::ProgramChange { program: 12 },
            ),
            (
                MidiEvent::channel_pressure(5, 77),
                ChannelVoiceMsg::ChannelPressure { pressure: 77 },
            ),
            (
                MidiEvent::pitch_wheel(6, -1000),
                ChannelVoiceMsg::PitchBend { bend: 8192 - 1000 },
            ),
        ];

        for (event, msg) in cases {
            let reference = MidiMsg::ChannelVoice {
                channel: Channel::from_u8(event.channel),
                msg,
            }
            .to_midi();
            assert_eq!(encode(&event).as_bytes(), reference.as_slice(), "{:?}", event);
        }
    }

    fn event_strategy() -> impl Strategy<Value = MidiEvent> {
        let data = 0u8..128;
        let msg = prop_oneof![
            (data.clone(), data.clone())
                .prop_map(|(note, velocity)| ChannelMessage::NoteOff { note, velocity }),
            (data.clone(), data.clone())
                .prop_map(|(note, velocity)| ChannelMessage::NoteOn { note, velocity }),
            (data.clone(), data.clone())
                .prop_map(|(note, pressure)| ChannelMessage::Aftertouch { note, pressure }),
            (data.clone(), data.clone()).prop_map(|(controller, value)| {
                ChannelMessage::ControlChange { controller, value }
            }),
            data.clone()
                .prop_map(|program| ChannelMessage::ProgramChange { program }),
            data.prop_map(|pressure| ChannelMessage::ChannelPressure { pressure }),
            (PITCH_WHEEL_MIN..=PITCH_WHEEL_MAX)
                .prop_map(|value| ChannelMessage::PitchWheel { value }),
        ];
        (0u8..16, msg).prop_map(|(channel, msg)| MidiEvent { channel, msg })
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(event in event_strategy()) {
            let bytes = encode(&event);
            prop_assert_eq!(bytes.len(), event.msg.wire_len());
            prop_assert_eq!(decode(bytes.as_bytes()), Ok(event));
        }

        #[test]
        fn prop_decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..6)) {
            if let Ok(event) = decode(&bytes) {
                let encoded = encode(&event);
                prop_assert_eq!(encoded.as_bytes(), bytes.as_slice());
            }
        }
    }

    #[test]
    fn test_full_pitch_wheel_range() {
        for value in PITCH_WHEEL_MIN..=PITCH_WHEEL_MAX {
            let event = MidiEvent::pitch_wheel(0, value);
            assert_eq!(decode(encode(&event).as_bytes()), Ok(event));
        }
    }
}
