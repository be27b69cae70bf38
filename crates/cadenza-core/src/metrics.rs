//! Session counters.
//!
//! The audio thread never logs; everything it drops or skips shows up here.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic event counters, updated from both the audio and control threads.
#[derive(Debug, Default)]
pub struct SessionMetrics {
    /// Input events copied into the pending list
    captured: AtomicU64,
    /// Input events moved to the consumer queue
    handed_off: AtomicU64,
    /// Input events dropped for being over `max_event_size`
    dropped_oversize: AtomicU64,
    /// Input events dropped for having no bytes
    dropped_empty: AtomicU64,
    /// Input events dropped because the inbound pool was empty
    dropped_exhausted: AtomicU64,
    /// Inbound records that failed to decode
    malformed: AtomicU64,
    /// Callbacks whose hand-off try-lock failed
    handoff_contended: AtomicU64,
    /// Callbacks whose delivery try-lock failed
    delivery_contended: AtomicU64,
    /// Outbound events written to an output buffer
    delivered: AtomicU64,
    /// Outbound events dropped after their window had passed
    evicted: AtomicU64,
    /// Outbound events addressed to a missing destination
    unknown_destination: AtomicU64,
    /// Callbacks skipped while processing was paused
    paused_cycles: AtomicU64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_captured(&self) {
        self.captured.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_handed_off(&self, count: usize) {
        self.handed_off.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped_oversize(&self) {
        self.dropped_oversize.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped_empty(&self) {
        self.dropped_empty.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped_exhausted(&self) {
        self.dropped_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_handoff_contended(&self) {
        self.handoff_contended.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_delivery_contended(&self) {
        self.delivery_contended.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_unknown_destination(&self) {
        self.unknown_destination.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_paused_cycle(&self) {
        self.paused_cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            captured: self.captured.load(Ordering::Relaxed),
            handed_off: self.handed_off.load(Ordering::Relaxed),
            dropped_oversize: self.dropped_oversize.load(Ordering::Relaxed),
            dropped_empty: self.dropped_empty.load(Ordering::Relaxed),
            dropped_exhausted: self.dropped_exhausted.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            handoff_contended: self.handoff_contended.load(Ordering::Relaxed),
            delivery_contended: self.delivery_contended.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            unknown_destination: self.unknown_destination.load(Ordering::Relaxed),
            paused_cycles: self.paused_cycles.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.captured,
            &self.handed_off,
            &self.dropped_oversize,
            &self.dropped_empty,
            &self.dropped_exhausted,
            &self.malformed,
            &self.handoff_contended,
            &self.delivery_contended,
            &self.delivered,
            &self.evicted,
            &self.unknown_destination,
            &self.paused_cycles,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Snapshot of session counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub captured: u64,
    pub handed_off: u64,
    pub dropped_oversize: u64,
    pub dropped_empty: u64,
    pub dropped_exhausted: u64,
    pub malformed: u64,
    pub handoff_contended: u64,
    pub delivery_contended: u64,
    pub delivered: u64,
    pub evicted: u64,
    pub unknown_destination: u64,
    pub paused_cycles: u64,
}

impl MetricsSnapshot {
    /// Input events lost before reaching the consumer queue.
    pub fn inbound_dropped(&self) -> u64 {
        self.dropped_oversize + self.dropped_empty + self.dropped_exhausted
    }

    /// Captured events still waiting in the audio thread's pending list.
    pub fn awaiting_handoff(&self) -> u64 {
        self.captured.saturating_sub(self.handed_off)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let metrics = SessionMetrics::new();
        metrics.record_captured();
        metrics.record_captured();
        metrics.record_handed_off(1);
        metrics.record_dropped_oversize();
        metrics.record_dropped_exhausted();
        metrics.record_dropped_empty();
        metrics.record_evicted();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.captured, 2);
        assert_eq!(snapshot.awaiting_handoff(), 1);
        assert_eq!(snapshot.dropped_empty, 1);
        assert_eq!(snapshot.inbound_dropped(), 3);
        assert_eq!(snapshot.evicted, 1);
        assert_eq!(snapshot.delivered, 0);
    }

    #[test]
    fn test_reset() {
        let metrics = SessionMetrics::new();
        metrics.record_delivered();
        metrics.record_paused_cycle();
        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
