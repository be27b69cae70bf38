//! Audio-thread side of a session.
//!
//! Everything in [`Processor::process`] is RT-safe: no allocation, no
//! blocking lock, no logging. Contention and exhaustion are absorbed and
//! counted in the session metrics.

use crate::config::StoppedPolicy;
use crate::driver::{MidiOutputBuffer, OutputBuffers, ProcessContext};
use crate::metrics::SessionMetrics;
use crate::scheduler::{BlockRenderer, FrameScheduler};
use crate::session::{Destination, SessionShared};
use cadenza_midi::{decode, MidiEvent, RecordRef};
use cadenza_pool::{Chunk, MultiSizePool};
use std::sync::Arc;

/// Where a queued outbound event goes this block.
enum Placement {
    Write(usize),
    Evict,
    Keep,
}

/// How far outbound delivery has actually run on this processor.
///
/// A block whose delivery lost the try-lock leaves `delivered_until`
/// behind, so the next successful pass still covers the skipped frames.
#[derive(Debug, Default)]
struct DeliveryWindow {
    /// Frames before this were covered by a completed delivery pass.
    delivered_until: u64,
    /// Start of the next contiguous rolling block. `None` before the first
    /// block and after a stop or pause.
    next_start: Option<u64>,
}

impl DeliveryWindow {
    /// Enter a rolling block and return the start of its delivery window.
    ///
    /// A block that does not follow the previous one (relocate, restart)
    /// begins a fresh window at its own start.
    #[inline]
    fn begin(&mut self, start: u64, end: u64) -> u64 {
        if self.next_start != Some(start) {
            self.delivered_until = start;
        }
        self.next_start = Some(end);
        self.delivered_until
    }

    #[inline]
    fn complete(&mut self, end: u64) {
        self.delivered_until = end;
    }

    #[inline]
    fn interrupt(&mut self) {
        self.next_start = None;
    }
}

/// Realtime half of a [`Session`](crate::Session). Move it to the audio
/// thread and call [`process`](Self::process) once per callback.
pub struct Processor {
    shared: Arc<SessionShared>,
    /// Captured records not yet handed off. Never grows past its initial
    /// capacity because the inbound pool has no more chunks than that.
    pending: Vec<Chunk>,
    window: DeliveryWindow,
}

impl Processor {
    pub(crate) fn new(shared: Arc<SessionShared>) -> Self {
        let pending = Vec::with_capacity(shared.config.inbound_capacity);
        Self {
            shared,
            pending,
            window: DeliveryWindow::default(),
        }
    }

    // ==================== RT Thread Methods ====================

    /// Run one driver callback: capture input, hand it off, deliver output.
    ///
    /// Returns `false` if processing is paused, in which case every output
    /// buffer was cleared and nothing else happened.
    pub fn process(&mut self, ctx: &ProcessContext<'_>, outputs: &mut dyn OutputBuffers) -> bool {
        let shared: &SessionShared = &self.shared;

        if !shared.do_process.get() {
            outputs.clear_all();
            self.window.interrupt();
            shared.metrics.record_paused_cycle();
            return false;
        }

        if shared.want_events.get() {
            capture(shared, &mut self.pending, ctx);
        }
        hand_off(shared, &mut self.pending);
        deliver(shared, ctx, outputs, &mut self.window);
        true
    }

    /// [`process`](Self::process), then interleave rendering with this
    /// block's decodable input events.
    ///
    /// The renderer is not called while processing is paused.
    pub fn process_with_renderer<R>(
        &mut self,
        ctx: &ProcessContext<'_>,
        outputs: &mut dyn OutputBuffers,
        renderer: &mut R,
    ) -> bool
    where
        R: BlockRenderer<MidiEvent> + ?Sized,
    {
        if !self.process(ctx, outputs) {
            return false;
        }
        let events = ctx
            .inputs
            .iter()
            .filter_map(|input| decode(input.bytes).ok().map(|event| (input.offset, event)));
        FrameScheduler::run(ctx.nframes, events, renderer);
        true
    }

    /// Captured records still waiting for a successful hand-off.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for Processor {
    fn drop(&mut self) {
        for chunk in self.pending.drain(..) {
            self.shared.inbound_pool.deallocate(chunk);
        }
    }
}

fn capture(shared: &SessionShared, pending: &mut Vec<Chunk>, ctx: &ProcessContext<'_>) {
    let pool = &shared.inbound_pool;
    let max = shared.config.max_event_size;

    for input in ctx.inputs {
        if input.bytes.is_empty() {
            shared.metrics.record_dropped_empty();
            continue;
        }
        if input.bytes.len() > max {
            shared.metrics.record_dropped_oversize();
            continue;
        }
        if pending.len() == pending.capacity() {
            shared.metrics.record_dropped_exhausted();
            continue;
        }
        let Some(mut chunk) = pool.allocate() else {
            shared.metrics.record_dropped_exhausted();
            continue;
        };

        let record = RecordRef {
            frame_time: ctx.block_start().saturating_add(input.offset as u64),
            bytes: input.bytes,
        };
        if record.write(pool.bytes_mut(&mut chunk)).is_none() {
            pool.deallocate(chunk);
            shared.metrics.record_dropped_oversize();
            continue;
        }
        pending.push(chunk);
        shared.metrics.record_captured();
    }
}

fn hand_off(shared: &SessionShared, pending: &mut Vec<Chunk>) {
    if pending.is_empty() {
        return;
    }
    match shared.queues.try_lock() {
        Some(mut queues) => {
            let count = pending.len();
            queues.inbound.extend(pending.drain(..));
            shared.metrics.record_handed_off(count);
        }
        None => shared.metrics.record_handoff_contended(),
    }
}

fn deliver(
    shared: &SessionShared,
    ctx: &ProcessContext<'_>,
    outputs: &mut dyn OutputBuffers,
    window: &mut DeliveryWindow,
) {
    let rolling = ctx.transport.is_rolling();
    let flush = !rolling && shared.config.stopped_policy == StoppedPolicy::Flush;
    let start = ctx.block_start();
    let end = ctx.block_end();

    let from = if rolling {
        window.begin(start, end)
    } else {
        window.interrupt();
        start
    };

    // Skipped frames stay inside `[delivered_until, ..)` for the next pass.
    let Some(mut queues) = shared.queues.try_lock() else {
        outputs.clear_all();
        shared.metrics.record_delivery_contended();
        return;
    };

    for destination in queues.destinations.iter_mut() {
        let Some(buffer) = outputs.buffer(destination.id) else {
            continue;
        };
        buffer.clear();

        if flush {
            drain_due(destination, &shared.outbound_pool, buffer, &shared.metrics, |_| {
                Placement::Write(0)
            });
        } else if rolling {
            drain_due(destination, &shared.outbound_pool, buffer, &shared.metrics, |time| {
                if time < from {
                    Placement::Evict
                } else if time < start {
                    Placement::Write(0)
                } else if time < end {
                    Placement::Write((time - start) as usize)
                } else {
                    Placement::Keep
                }
            });
        }
    }
    if rolling {
        window.complete(end);
    }
}

/// Pop events off the front of the queue while `place` says they are due.
///
/// An event is removed only once written or evicted; a full buffer stops
/// the drain and leaves the rest queued.
fn drain_due(
    destination: &mut Destination,
    pool: &MultiSizePool,
    buffer: &mut dyn MidiOutputBuffer,
    metrics: &SessionMetrics,
    mut place: impl FnMut(u64) -> Placement,
) {
    while let Some(front) = destination.pending.front() {
        match place(front.frame_time) {
            Placement::Keep => break,
            Placement::Evict => metrics.record_evicted(),
            Placement::Write(offset) => {
                let written = RecordRef::read(pool.bytes(&front.chunk))
                    .is_some_and(|record| buffer.write(offset, record.bytes));
                if !written {
                    break;
                }
                metrics.record_delivered();
            }
        }
        if let Some(done) = destination.pending.pop_front() {
            pool.deallocate(done.chunk);
        }
    }
}
