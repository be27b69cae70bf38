//! Error types for cadenza-midi.

use thiserror::Error;

/// Why a byte sequence is not a supported channel voice message.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Empty MIDI message")]
    Empty,

    #[error("Unsupported status byte 0x{0:02X}")]
    UnsupportedStatus(u8),

    #[error("Status 0x{status:02X} expects {expected} bytes, got {actual}")]
    Length {
        status: u8,
        expected: usize,
        actual: usize,
    },

    #[error("Data byte 0x{0:02X} has the high bit set")]
    DataByte(u8),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, DecodeError>;
