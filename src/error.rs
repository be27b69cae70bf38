//! Centralized error type for the cadenza umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Pool: {0}")]
    Pool(#[from] cadenza_pool::PoolError),

    #[error("MIDI: {0}")]
    Midi(#[from] cadenza_midi::DecodeError),

    #[cfg(feature = "session")]
    #[error(transparent)]
    Session(#[from] cadenza_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_note(bytes: &[u8]) -> Result<u8> {
        let event = cadenza_midi::decode(bytes)?;
        Ok(event.note().unwrap_or(0))
    }

    #[test]
    fn test_subsystem_errors_convert() {
        assert_eq!(decode_note(&[0x90, 60, 1]).unwrap(), 60);
        assert!(matches!(decode_note(&[]), Err(Error::Midi(_))));

        let pool: Result<_> = cadenza_pool::FixedChunkPool::new(0, 0, 0).map_err(Error::from);
        assert!(matches!(pool, Err(Error::Pool(_))));
    }
}
