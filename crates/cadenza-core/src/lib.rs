//! Realtime MIDI session: inbound capture, outbound scheduling and sub-block
//! event interleaving for an audio driver callback.
//!
//! Two roles share a session:
//!
//! - **Control threads** hold a [`Session`] (cheap `Clone`). They create
//!   destinations, queue outbound events and read captured input. These
//!   calls may block.
//! - **The audio thread** owns the [`Processor`]. Once per callback it
//!   captures input into pool chunks, hands them off with a try-lock and
//!   writes due outbound events into the driver's buffers. It never
//!   blocks, allocates or logs.
//!
//! # Example
//!
//! ```ignore
//! use cadenza_core::*;
//!
//! let session = Session::builder().build()?;
//! let port = session.create_port("synth");
//! session.want_events(true);
//! let mut processor = session.processor();
//!
//! let mut outputs = EventBufferSet::new();
//! outputs.insert(port, EventBuffer::default());
//!
//! // Audio thread
//! let ctx = ProcessContext::new(256, TransportInfo::rolling(frame), &inputs);
//! processor.process(&ctx, &mut outputs);
//!
//! // Control thread
//! while let Some(event) = session.get_event() {
//!     println!("{} {:?}", event.frame_time, event.event);
//! }
//! ```

pub mod error;
pub use error::{Error, Result};

mod builder;
pub use builder::SessionBuilder;

mod config;
pub use config::{SessionConfig, StoppedPolicy};

mod driver;
pub use driver::{
    EventBuffer, EventBufferSet, InputEvent, MidiOutputBuffer, OutputBuffers, PortId,
    ProcessContext, TransportInfo, TransportState,
};

pub mod lockfree;

mod metrics;
pub use metrics::{MetricsSnapshot, SessionMetrics};

mod processor;
pub use processor::Processor;

mod scheduler;
pub use scheduler::{BlockRenderer, FrameScheduler};

mod session;
pub use session::{InboundRead, PortInfo, Session};

pub use cadenza_midi::{MidiEvent, RawMidiEvent, TimedMidiEvent};
