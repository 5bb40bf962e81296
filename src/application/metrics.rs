//! Observability metrics for dispatching.
//!
//! Provides counters about policy decisions, channel delivery and store
//! housekeeping for monitoring and debugging.

use crate::domain::result::DispatchStatus;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics tracking dispatch statistics.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Clones share the same counters.
#[derive(Debug, Clone)]
pub struct DispatchMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    /// Live events that survived the policy chain
    events_allowed: AtomicU64,
    /// Live events dropped by a policy
    events_suppressed: AtomicU64,
    /// Synthetic events produced by policy flushes
    events_flushed: AtomicU64,
    dispatches_sent: AtomicU64,
    dispatches_partial: AtomicU64,
    dispatches_failed: AtomicU64,
    /// Channel calls that exceeded the channel timeout
    channel_timeouts: AtomicU64,
    /// Channel calls that panicked
    channel_panics: AtomicU64,
    /// Expired store entries removed by the sweep
    entries_swept: AtomicU64,
}

impl DispatchMetrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub(crate) fn record_allowed(&self) {
        self.inner.events_allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_suppressed(&self) {
        self.inner.events_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flushed(&self, count: u64) {
        self.inner.events_flushed.fetch_add(count, Ordering::Relaxed);
    }

    /// Record the classified status of one fan-out.
    pub(crate) fn record_dispatch(&self, status: DispatchStatus) {
        let counter = match status {
            DispatchStatus::Sent => &self.inner.dispatches_sent,
            DispatchStatus::Partial => &self.inner.dispatches_partial,
            DispatchStatus::Failed => &self.inner.dispatches_failed,
            DispatchStatus::Suppressed => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_channel_timeout(&self) {
        self.inner.channel_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_channel_panic(&self) {
        self.inner.channel_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_swept(&self, count: u64) {
        self.inner.entries_swept.fetch_add(count, Ordering::Relaxed);
    }

    /// Get the number of live events allowed through the chain.
    pub fn events_allowed(&self) -> u64 {
        self.inner.events_allowed.load(Ordering::Relaxed)
    }

    /// Get the number of live events suppressed.
    pub fn events_suppressed(&self) -> u64 {
        self.inner.events_suppressed.load(Ordering::Relaxed)
    }

    /// Get the number of expired store entries swept.
    pub fn entries_swept(&self) -> u64 {
        self.inner.entries_swept.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        let inner = &self.inner;
        MetricsSnapshot {
            events_allowed: load(&inner.events_allowed),
            events_suppressed: load(&inner.events_suppressed),
            events_flushed: load(&inner.events_flushed),
            dispatches_sent: load(&inner.dispatches_sent),
            dispatches_partial: load(&inner.dispatches_partial),
            dispatches_failed: load(&inner.dispatches_failed),
            channel_timeouts: load(&inner.channel_timeouts),
            channel_panics: load(&inner.channel_panics),
            entries_swept: load(&inner.entries_swept),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        let inner = &self.inner;
        for counter in [
            &inner.events_allowed,
            &inner.events_suppressed,
            &inner.events_flushed,
            &inner.dispatches_sent,
            &inner.dispatches_partial,
            &inner.dispatches_failed,
            &inner.channel_timeouts,
            &inner.channel_panics,
            &inner.entries_swept,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub events_allowed: u64,
    pub events_suppressed: u64,
    pub events_flushed: u64,
    pub dispatches_sent: u64,
    pub dispatches_partial: u64,
    pub dispatches_failed: u64,
    pub channel_timeouts: u64,
    pub channel_panics: u64,
    pub entries_swept: u64,
}

impl MetricsSnapshot {
    /// Calculate the suppression rate (0.0 to 1.0) over live events.
    ///
    /// Returns 0.0 if no events have been processed.
    pub fn suppression_rate(&self) -> f64 {
        let total = self.total_events();
        if total == 0 {
            0.0
        } else {
            self.events_suppressed as f64 / total as f64
        }
    }

    /// Get the total number of live events processed (allowed + suppressed).
    pub fn total_events(&self) -> u64 {
        self.events_allowed.saturating_add(self.events_suppressed)
    }

    /// Get the total number of fan-outs performed.
    pub fn total_dispatches(&self) -> u64 {
        self.dispatches_sent
            .saturating_add(self.dispatches_partial)
            .saturating_add(self.dispatches_failed)
    }
}
