//! Concurrency stress tests (requires the "session" feature)
//!
//! One thread plays the audio driver while control threads produce and
//! consume events as fast as they can. Nothing may be lost without being
//! counted, and inbound order must survive contention.
//!
//! Run with:
//! ```bash
//! cargo test -p cadenza --test stress_tests --release
//! ```

#![cfg(feature = "session")]

mod helpers;

use cadenza::prelude::*;
use helpers::*;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const MIN_BLOCKS: u64 = 3_000;
const INPUTS_PER_BLOCK: usize = 6;
const OUTBOUND_EVENTS: u64 = 5_000;

#[test]
fn test_audio_and_control_threads() {
    let session = test_session();
    session.want_events(true);
    let port = session.create_port("out");
    let maintainer = PoolMaintainer::with_config(cadenza::MaintainerConfig {
        interval: Duration::from_millis(1),
        ..Default::default()
    })
    .unwrap();
    session.register_pools(&maintainer).unwrap();

    let frame = Arc::new(AtomicU64::new(0));
    let running = Arc::new(AtomicBool::new(true));
    let producing = Arc::new(AtomicBool::new(true));

    let audio = {
        let mut processor = session.processor();
        let frame = Arc::clone(&frame);
        let running = Arc::clone(&running);
        let producing = Arc::clone(&producing);
        thread::Builder::new()
            .name("test-audio".into())
            .spawn(move || {
                let mut outputs = test_outputs(&[port]);
                let messages: Vec<[u8; 3]> = (0..INPUTS_PER_BLOCK as u8)
                    .map(|i| [0x90, i, 100])
                    .collect();
                let inputs: Vec<_> = messages
                    .iter()
                    .enumerate()
                    .map(|(i, bytes)| InputEvent::new(i * 8, bytes))
                    .collect();

                // Keep the transport moving until the producer is done so
                // every queued event comes due.
                let mut written = 0u64;
                let mut block = 0u64;
                while block < MIN_BLOCKS || producing.load(Ordering::Acquire) {
                    let start = block * TEST_BLOCK as u64;
                    frame.store(start, Ordering::Release);
                    run_block(&mut processor, &mut outputs, start, &inputs);
                    written += outputs.get(port).map_or(0, |b| b.len() as u64);
                    block += 1;
                    if block % 16 == 0 {
                        thread::yield_now();
                    }
                }
                running.store(false, Ordering::Release);
                (block, written)
            })
            .unwrap()
    };

    let consumer = {
        let session = session.clone();
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let mut received = 0u64;
            let mut last_frame = 0u64;
            loop {
                match session.get_event() {
                    Some(event) => {
                        assert!(event.frame_time >= last_frame, "inbound order broken");
                        last_frame = event.frame_time;
                        received += 1;
                    }
                    None if !running.load(Ordering::Acquire) => break,
                    None => thread::yield_now(),
                }
            }
            received
        })
    };

    let producer = {
        let session = session.clone();
        let frame = Arc::clone(&frame);
        let producing = Arc::clone(&producing);
        thread::spawn(move || {
            for i in 0..OUTBOUND_EVENTS {
                let due = frame.load(Ordering::Acquire) + 2 * TEST_BLOCK as u64;
                let event = MidiEvent::note_on(0, (i % 128) as u8, 64);
                session.put_event(port, &event, due).unwrap();
            }
            producing.store(false, Ordering::Release);
        })
    };

    producer.join().unwrap();
    let (blocks, written) = audio.join().unwrap();
    let mut received = consumer.join().unwrap();

    // Anything handed off after the consumer's last look
    while session.get_event().is_some() {
        received += 1;
    }

    let metrics = session.metrics();
    let total_inputs = blocks * INPUTS_PER_BLOCK as u64;
    assert_eq!(metrics.captured + metrics.inbound_dropped(), total_inputs);
    assert_eq!(received, metrics.handed_off);

    let pending = session.pending_count(port).unwrap() as u64;
    assert_eq!(metrics.delivered, written);
    assert_eq!(metrics.delivered + metrics.evicted + pending, OUTBOUND_EVENTS);

    maintainer.shutdown();
}

/// Port edits while the audio thread runs never lose track of chunks.
#[test]
fn test_port_churn_while_processing() {
    let session = test_session();
    let running = Arc::new(AtomicBool::new(true));

    let audio = {
        let mut processor = session.processor();
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let mut outputs = test_outputs(&[]);
            let mut block = 0u64;
            while running.load(Ordering::Acquire) {
                run_block(&mut processor, &mut outputs, block * TEST_BLOCK as u64, &[]);
                block += 1;
                thread::yield_now();
            }
        })
    };

    for round in 0..200u64 {
        let port = session.create_port(format!("port-{}", round));
        for i in 0..8 {
            session
                .put_event(port, &MidiEvent::note_on(0, i, 1), round * 1_000 + i as u64)
                .unwrap();
        }
        assert!(session.destroy_port(port));
    }

    running.store(false, Ordering::Release);
    audio.join().unwrap();

    assert!(session.is_processing());
    assert!(session.ports().is_empty());
    assert_eq!(session.outbound_pool().used_count(), 0);
}
