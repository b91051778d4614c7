//! Dispatcher counters for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// Counters shared between the dispatcher, its replay tasks and handles
#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    /// Publish requests processed
    published: AtomicU64,
    /// Events accepted into a subscriber (or staging) queue
    delivered: AtomicU64,
    /// Events dropped because a queue was full
    dropped: AtomicU64,
    /// Subscribers evicted because their queue was full
    evicted: AtomicU64,
    /// Subscribers currently routed
    active_subscribers: AtomicUsize,
    /// Replay tasks started
    replays_started: AtomicU64,
    /// Replay tasks finished (exhausted or aborted)
    replays_finished: AtomicU64,
    /// Historical events pushed by replay tasks
    replayed_events: AtomicU64,
}

impl DispatcherMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn inc_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    pub fn inc_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active_subscribers(&self) -> usize {
        self.active_subscribers.load(Ordering::Relaxed)
    }

    pub fn set_active_subscribers(&self, count: usize) {
        self.active_subscribers.store(count, Ordering::Relaxed);
    }

    pub fn replays_started(&self) -> u64 {
        self.replays_started.load(Ordering::Relaxed)
    }

    pub fn inc_replays_started(&self) {
        self.replays_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn replays_finished(&self) -> u64 {
        self.replays_finished.load(Ordering::Relaxed)
    }

    pub fn inc_replays_finished(&self) {
        self.replays_finished.fetch_add(1, Ordering::Relaxed);
    }

    pub fn replayed_events(&self) -> u64 {
        self.replayed_events.load(Ordering::Relaxed)
    }

    pub fn add_replayed_events(&self, count: u64) {
        self.replayed_events.fetch_add(count, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            published: self.published(),
            delivered: self.delivered(),
            dropped: self.dropped(),
            evicted: self.evicted(),
            active_subscribers: self.active_subscribers(),
            replays_started: self.replays_started(),
            replays_finished: self.replays_finished(),
            replayed_events: self.replayed_events(),
        }
    }
}

/// Snapshot of dispatcher metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub published: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub evicted: u64,
    pub active_subscribers: usize,
    pub replays_started: u64,
    pub replays_finished: u64,
    pub replayed_events: u64,
}
