//! Per-sink counters
//!
//! Shared between a `SinkHandle` (drops) and its worker (writes, failures).

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct SinkMetrics {
    queue_len: AtomicUsize,
    written: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Approximate number of queued events
    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Outcome of one `EventSink::write`
    pub fn record_write(&self, ok: bool) {
        let counter = if ok { &self.written } else { &self.failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Event rejected by a full queue
    pub fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len.load(Ordering::Relaxed),
            write_count: self.written.load(Ordering::Relaxed),
            failure_count: self.failed.load(Ordering::Relaxed),
            dropped_count: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SinkMetrics`] for reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub write_count: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
}

impl MetricsSnapshot {
    /// Events that never reached the sink
    pub fn lost(&self) -> u64 {
        self.failure_count + self.dropped_count
    }
}
