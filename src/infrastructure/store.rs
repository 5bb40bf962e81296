//! In-process expiring store.
//!
//! Backs the [`Store`] port with two sharded maps: one for expiring flags and
//! one for windowed counters. Expired entries are removed lazily on access and
//! by an amortized sweep that keeps memory bounded when keys stop being read.

use crate::application::metrics::DispatchMetrics;
use crate::application::ports::{Clock, Store};
use crate::infrastructure::clock::SystemClock;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Minimum time between two sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Sweeps are skipped while the store holds fewer entries than this.
pub const DEFAULT_SWEEP_MIN_ENTRIES: usize = 1024;

/// Longest expiry the store records; longer ttls saturate to it.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `last_sweep_nanos` value before the first sweep.
const NEVER_SWEPT: u64 = u64::MAX;

fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now)
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u64,
    expires_at: Instant,
}

/// Thread-safe expiring store backed by DashMap.
///
/// Each operation holds at most one shard guard for the duration of a few
/// field updates, so concurrent callers on different keys never contend and
/// callers on the same key are serialized.
///
/// # Example
/// ```
/// use notice::application::ports::Store;
/// use notice::infrastructure::store::MemoryStore;
/// use std::time::Duration;
///
/// let store = MemoryStore::new();
/// store.set_expiry("cooldown:disk", Duration::from_secs(60));
/// assert!(store.is_active("cooldown:disk"));
/// assert_eq!(store.increment("rate:global:1", Duration::from_secs(120)), 1);
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    flags: DashMap<String, Instant>,
    counters: DashMap<String, Counter>,
    clock: Arc<dyn Clock>,
    sweep_interval: Duration,
    sweep_min_entries: usize,
    /// Reference point for `last_sweep_nanos`
    epoch: Instant,
    last_sweep_nanos: AtomicU64,
    metrics: Option<DispatchMetrics>,
}

impl MemoryStore {
    /// Create an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Create an empty store reading time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let epoch = clock.now();
        Self {
            flags: DashMap::new(),
            counters: DashMap::new(),
            clock,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            sweep_min_entries: DEFAULT_SWEEP_MIN_ENTRIES,
            epoch,
            last_sweep_nanos: AtomicU64::new(NEVER_SWEPT),
            metrics: None,
        }
    }

    /// Set the minimum time between sweeps.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the entry count below which sweeps are skipped.
    pub fn with_sweep_min_entries(mut self, min_entries: usize) -> Self {
        self.sweep_min_entries = min_entries;
        self
    }

    /// Record swept entries into `metrics`.
    pub fn with_metrics(mut self, metrics: DispatchMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Remove every expired flag and counter now, returning how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0usize;

        self.flags.retain(|_, expires_at| {
            let keep = *expires_at > now;
            if !keep {
                removed += 1;
            }
            keep
        });
        self.counters.retain(|_, counter| {
            let keep = counter.expires_at > now;
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            tracing::trace!(removed, remaining = self.len(), "swept expired store entries");
            if let Some(metrics) = &self.metrics {
                metrics.record_swept(removed as u64);
            }
        }
        removed
    }

    /// Sweep if the store is large enough and the interval has elapsed.
    ///
    /// Must be called without holding any map guard.
    fn maybe_sweep(&self, now: Instant) {
        if self.len() < self.sweep_min_entries {
            return;
        }

        let now_nanos = now.saturating_duration_since(self.epoch).as_nanos() as u64;
        let last = self.last_sweep_nanos.load(Ordering::Acquire);
        if last != NEVER_SWEPT
            && now_nanos.saturating_sub(last) < self.sweep_interval.as_nanos() as u64
        {
            return;
        }

        // Only the caller that wins the exchange sweeps.
        if self
            .last_sweep_nanos
            .compare_exchange(last, now_nanos, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.sweep_expired();
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn is_active(&self, key: &str) -> bool {
        let now = self.clock.now();
        let expires_at = self.flags.get(key).map(|entry| *entry.value());

        match expires_at {
            Some(expires_at) if expires_at > now => true,
            Some(_) => {
                // Re-checked under the shard lock in case it was re-armed meanwhile.
                self.flags.remove_if(key, |_, expires_at| *expires_at <= now);
                false
            }
            None => false,
        }
    }

    fn set_expiry(&self, key: &str, ttl: Duration) {
        let now = self.clock.now();
        self.maybe_sweep(now);
        self.flags.insert(key.to_string(), expiry(now, ttl));
    }

    fn increment(&self, key: &str, ttl: Duration) -> u64 {
        let now = self.clock.now();
        self.maybe_sweep(now);

        let mut counter = self.counters.entry(key.to_string()).or_insert(Counter {
            count: 0,
            expires_at: now,
        });
        if counter.expires_at <= now {
            counter.count = 0;
        }
        counter.count = counter.count.saturating_add(1);
        counter.expires_at = expiry(now, ttl);
        counter.count
    }

    fn get_count(&self, key: &str) -> u64 {
        let now = self.clock.now();
        let current = self.counters.get(key).map(|entry| *entry.value());

        match current {
            Some(counter) if counter.expires_at > now => counter.count,
            Some(_) => {
                self.counters
                    .remove_if(key, |_, counter| counter.expires_at <= now);
                0
            }
            None => 0,
        }
    }

    fn reset(&self, key: &str) {
        self.flags.remove(key);
        self.counters.remove(key);
    }

    fn len(&self) -> usize {
        self.flags.len() + self.counters.len()
    }

    fn clear(&self) {
        self.flags.clear();
        self.counters.clear();
    }
}
