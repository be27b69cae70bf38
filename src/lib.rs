//! # Cadenza - Realtime MIDI Core
//!
//! Non-blocking memory pools and sample-accurate MIDI scheduling for an
//! audio driver callback.
//!
//! ## Architecture
//!
//! Cadenza is an umbrella crate that coordinates:
//! - **cadenza-pool** - Fixed-chunk and multi-size pools with lock-free
//!   allocate/deallocate, plus a background refill thread
//! - **cadenza-midi** - MIDI event types and an allocation-free codec
//! - **cadenza-core** - Session: inbound capture, outbound scheduling and
//!   sub-block event interleaving
//!
//! ## Quick Start
//!
//! ```ignore
//! use cadenza::prelude::*;
//!
//! let session = Session::builder().build()?;
//! let synth = session.create_port("synth");
//! let maintainer = PoolMaintainer::start()?;
//! session.register_pools(&maintainer)?;
//!
//! // Control thread
//! session.put_event(synth, &MidiEvent::note_on(0, 60, 100), 48_000)?;
//!
//! // Audio thread
//! let mut processor = session.processor();
//! processor.process(&ctx, &mut outputs);
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Everything
//! - `session` - MIDI session (without it only pools and codec are built)

mod error;
pub use error::{Error, Result};

/// Re-export of cadenza-pool for direct access
pub use cadenza_pool as pool;

pub use cadenza_pool::{
    Chunk, FixedChunkPool, MaintainerConfig, MultiSizePool, PoolConfig, PoolMaintainer,
    SizedChunk, SleepyReport,
};

/// Re-export of cadenza-midi for direct access
pub use cadenza_midi as midi;

pub use cadenza_midi::{
    decode, encode, ChannelMessage, DecodeError, EncodedMessage, MidiEvent, RawMidiEvent,
    TimedMidiEvent,
};

// MIDI session
#[cfg(feature = "session")]
pub use cadenza_core as core;

#[cfg(feature = "session")]
pub use cadenza_core::{
    BlockRenderer, EventBuffer, EventBufferSet, FrameScheduler, InboundRead, InputEvent,
    MetricsSnapshot, MidiOutputBuffer, OutputBuffers, PortId, PortInfo, ProcessContext,
    Processor, Session, SessionBuilder, SessionConfig, StoppedPolicy, TransportInfo,
    TransportState,
};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{Error, Result};

    pub use crate::{FixedChunkPool, MultiSizePool, PoolMaintainer};

    pub use crate::{ChannelMessage, MidiEvent, TimedMidiEvent};

    #[cfg(feature = "session")]
    pub use crate::{
        BlockRenderer, EventBuffer, EventBufferSet, InputEvent, OutputBuffers, PortId,
        ProcessContext, Processor, Session, StoppedPolicy, TransportInfo,
    };
}
