//! Shared fixtures for cadenza integration tests.
//!
//! Sessions here are small so exhaustion and ordering are easy to hit, and
//! transport is driven by hand one block at a time.

#![allow(dead_code)]

use cadenza::prelude::*;
use cadenza::SessionConfig;

/// Block size used by every integration test.
pub const TEST_BLOCK: usize = 64;

/// Session with small pools and default policies.
pub fn test_session() -> Session {
    test_session_with(SessionConfig::default())
}

/// Small-pool session with the stopped policy and limits from `base`.
pub fn test_session_with(base: SessionConfig) -> Session {
    Session::new(SessionConfig {
        inbound_min_chunks: 32,
        inbound_max_chunks: 64,
        inbound_capacity: 128,
        outbound_min_chunks: 16,
        outbound_max_chunks: 32,
        ..base
    })
    .expect("Failed to create test session")
}

/// Output buffers for `ports`, each with room for a full block of notes.
pub fn test_outputs(ports: &[PortId]) -> EventBufferSet {
    let mut outputs = EventBufferSet::new();
    for &port in ports {
        outputs.insert(port, EventBuffer::with_capacity(TEST_BLOCK * 2, TEST_BLOCK * 8));
    }
    outputs
}

/// Run one rolling block starting at `frame`.
pub fn run_block(
    processor: &mut Processor,
    outputs: &mut EventBufferSet,
    frame: u64,
    inputs: &[InputEvent<'_>],
) -> bool {
    let ctx = ProcessContext::new(TEST_BLOCK, TransportInfo::rolling(frame), inputs);
    processor.process(&ctx, outputs)
}

/// Offsets and bytes written to `port` in the last block.
pub fn written(outputs: &EventBufferSet, port: PortId) -> Vec<(usize, Vec<u8>)> {
    outputs
        .get(port)
        .map(|buffer| {
            buffer
                .iter()
                .map(|(offset, bytes)| (offset, bytes.to_vec()))
                .collect()
        })
        .unwrap_or_default()
}
