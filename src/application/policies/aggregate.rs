//! Windowed aggregation of alerts into periodic summaries.
//!
//! Matching events are swallowed into a bucket per `(level, source)` and
//! come back out of [`Policy::flush`] as one summary event once the bucket is
//! a full window old.

use super::{LevelSet, Policy};
use crate::application::ports::{Clock, Store};
use crate::domain::event::{Event, Level};
use crate::domain::outcome::{PolicyOutcome, SuppressReason};
use crate::infrastructure::clock::SystemClock;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Meta flag marking an event that must not be aggregated again.
pub const AGGREGATE_SKIP: &str = "aggregate_skip";

/// Meta entry carrying the window, in seconds, of a summary event.
pub const AGGREGATE_WINDOW: &str = "aggregate_window";

/// Source used for events without one.
pub const DEFAULT_SOURCE: &str = "default";

/// Default cap on samples kept per bucket.
pub const DEFAULT_MAX_SAMPLES: usize = 5;

type BucketKey = (Level, String);

#[derive(Debug)]
struct Bucket {
    started: Instant,
    counts: BTreeMap<String, u64>,
    samples: Vec<String>,
}

impl Bucket {
    fn new(started: Instant) -> Self {
        Self {
            started,
            counts: BTreeMap::new(),
            samples: Vec::new(),
        }
    }
}

/// Collapses bursts of alerts into one summary per window.
///
/// # Example
/// ```
/// use notice::application::policies::{AggregatePolicy, Policy};
/// use notice::infrastructure::store::MemoryStore;
/// use notice::{Event, Level};
/// use std::time::Duration;
///
/// let store = MemoryStore::new();
/// let policy = AggregatePolicy::new(Duration::from_secs(600)).with_levels([Level::Warn]);
/// let event = Event::builder("slow query").level(Level::Warn).build();
///
/// assert!(policy.apply(event, &store).is_suppress());
/// assert_eq!(policy.pending(), 1);
/// // Nothing is due until the window has elapsed.
/// assert!(policy.flush(&store).is_empty());
/// ```
#[derive(Debug)]
pub struct AggregatePolicy {
    window: Duration,
    levels: LevelSet,
    max_samples: usize,
    clock: Arc<dyn Clock>,
    buckets: DashMap<BucketKey, Bucket>,
}

impl AggregatePolicy {
    /// Create an aggregate policy applying to every level.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            levels: LevelSet::all(),
            max_samples: DEFAULT_MAX_SAMPLES,
            clock: Arc::new(SystemClock::new()),
            buckets: DashMap::new(),
        }
    }

    /// Restrict to the given levels.
    pub fn with_levels(mut self, levels: impl IntoIterator<Item = Level>) -> Self {
        self.levels = levels.into_iter().collect();
        self
    }

    /// Cap the number of samples listed in a summary.
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Read time from `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Number of open buckets.
    pub fn pending(&self) -> usize {
        self.buckets.len()
    }

    fn is_due(&self, bucket: &Bucket, now: Instant) -> bool {
        now.saturating_duration_since(bucket.started) >= self.window
    }

    fn summarize(&self, level: Level, source: &str, bucket: Bucket) -> Event {
        let window_secs = self.window.as_secs();

        let mut counts: Vec<(String, u64)> = bucket.counts.into_iter().collect();
        // Stable sort keeps ties in key order.
        counts.sort_by(|a, b| b.1.cmp(&a.1));

        let mut content = format!("window={}s\nsource={}", window_secs, source);
        for (key, count) in &counts {
            let _ = write!(content, "\n- {}: {}", key, count);
        }
        if !bucket.samples.is_empty() {
            content.push_str("\nsamples:");
            for sample in &bucket.samples {
                let _ = write!(content, "\n  {}", sample);
            }
        }

        Event::builder(content)
            .level(level)
            .content_type("text")
            .event_key(format!("aggregate:{}:{}", level, source))
            .source(source)
            .build()
            .with_meta(AGGREGATE_SKIP, true)
            .with_meta(AGGREGATE_WINDOW, window_secs)
    }
}

impl Policy for AggregatePolicy {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    fn apply(&self, event: Event, _store: &dyn Store) -> PolicyOutcome {
        if event.meta_flag(AGGREGATE_SKIP) || !self.levels.matches(event.level()) {
            return PolicyOutcome::Allow(event);
        }

        let source = event.source().unwrap_or(DEFAULT_SOURCE).to_string();
        let sample_body = if event.raw_content().is_empty() {
            event.event_key()
        } else {
            event.raw_content()
        };
        let sample = format!("{}: {}", event.event_key(), sample_body);

        let now = self.clock.now();
        let mut bucket = self
            .buckets
            .entry((event.level(), source))
            .or_insert_with(|| Bucket::new(now));
        *bucket.counts.entry(event.event_key().to_string()).or_insert(0) += 1;
        if bucket.samples.len() < self.max_samples {
            bucket.samples.push(sample);
        }

        PolicyOutcome::suppress(SuppressReason::Aggregated)
    }

    fn flush(&self, _store: &dyn Store) -> Vec<Event> {
        let now = self.clock.now();

        let mut due: Vec<BucketKey> = self
            .buckets
            .iter()
            .filter(|entry| self.is_due(entry.value(), now))
            .map(|entry| entry.key().clone())
            .collect();
        due.sort();

        let mut events = Vec::with_capacity(due.len());
        for key in due {
            // A concurrent flush may have taken it already.
            if let Some(((level, source), bucket)) = self
                .buckets
                .remove_if(&key, |_, bucket| self.is_due(bucket, now))
            {
                let total: u64 = bucket.counts.values().sum();
                tracing::info!(
                    policy = self.name(),
                    level = level.as_str(),
                    source = source.as_str(),
                    total,
                    "flushing aggregate summary"
                );
                events.push(self.summarize(level, &source, bucket));
            }
        }
        events
    }
}
