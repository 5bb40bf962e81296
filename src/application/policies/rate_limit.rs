//! Per-minute rate limiting.

use super::{LevelSet, Policy};
use crate::application::ports::{Clock, Store};
use crate::domain::event::{Event, Level};
use crate::domain::outcome::{PolicyOutcome, SuppressReason};
use crate::infrastructure::clock::SystemClock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

/// Counter lifetime; outlives the minute it counts so a bucket is never reset
/// while still current.
const BUCKET_TTL: Duration = Duration::from_secs(120);

/// What a rate limit budget is shared across.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitScope {
    /// One budget for every event
    #[default]
    Global,
    /// One budget per level
    Level,
    /// One budget per event key
    EventKey,
}

/// Allows at most `per_minute` events per calendar minute per scope.
///
/// Buckets are tumbling: the budget resets at every minute boundary of wall
/// time, not 60 seconds after the first event.
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    per_minute: u64,
    levels: LevelSet,
    scope: RateLimitScope,
    clock: Arc<dyn Clock>,
}

impl RateLimitPolicy {
    /// Create a global limit applying to every level.
    pub fn new(per_minute: u64) -> Self {
        Self {
            per_minute,
            levels: LevelSet::all(),
            scope: RateLimitScope::Global,
            clock: Arc::new(SystemClock::new()),
        }
    }

    /// Restrict to the given levels.
    pub fn with_levels(mut self, levels: impl IntoIterator<Item = Level>) -> Self {
        self.levels = levels.into_iter().collect();
        self
    }

    /// Choose what the budget is shared across.
    pub fn with_scope(mut self, scope: RateLimitScope) -> Self {
        self.scope = scope;
        self
    }

    /// Read wall time from `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn bucket_key(&self, event: &Event) -> String {
        let minute = self
            .clock
            .system_now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() / 60)
            .unwrap_or(0);
        // The scope kind is part of the key so an event key can never land in
        // a global or per-level bucket.
        match self.scope {
            RateLimitScope::Global => format!("rate:global:{}", minute),
            RateLimitScope::Level => format!("rate:level:{}:{}", event.level(), minute),
            RateLimitScope::EventKey => format!("rate:key:{}:{}", event.event_key(), minute),
        }
    }
}

impl Policy for RateLimitPolicy {
    fn name(&self) -> &'static str {
        "rate"
    }

    fn apply(&self, event: Event, store: &dyn Store) -> PolicyOutcome {
        if !self.levels.matches(event.level()) {
            return PolicyOutcome::Allow(event);
        }

        let count = store.increment(&self.bucket_key(&event), BUCKET_TTL);
        if count > self.per_minute {
            PolicyOutcome::suppress(SuppressReason::RateLimited)
        } else {
            PolicyOutcome::Allow(event)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::MockClock;
    use crate::infrastructure::store::MemoryStore;
    use std::time::Instant;

    fn setup(policy: RateLimitPolicy) -> (RateLimitPolicy, MemoryStore, MockClock) {
        let clock = MockClock::new(Instant::now());
        let store = MemoryStore::with_clock(Arc::new(clock.clone()));
        (policy.with_clock(Arc::new(clock.clone())), store, clock)
    }

    fn event(key: &str, level: Level) -> Event {
        Event::builder("x").event_key(key).level(level).build()
    }

    #[test]
    fn test_budget_within_one_minute() {
        let (policy, store, _clock) = setup(RateLimitPolicy::new(2));

        assert!(policy.apply(event("a", Level::Info), &store).is_allow());
        assert!(policy.apply(event("b", Level::Info), &store).is_allow());
        let third = policy.apply(event("c", Level::Info), &store);
        assert_eq!(third.reason(), Some(&SuppressReason::RateLimited));
    }

    #[test]
    fn test_budget_resets_at_minute_boundary() {
        let (policy, store, clock) = setup(RateLimitPolicy::new(1));

        // The mock wall clock starts on a minute boundary.
        clock.advance(Duration::from_secs(59));
        assert!(policy.apply(event("a", Level::Info), &store).is_allow());
        assert!(policy.apply(event("a", Level::Info), &store).is_suppress());

        clock.advance(Duration::from_secs(1));
        assert!(policy.apply(event("a", Level::Info), &store).is_allow());
    }

    #[test]
    fn test_level_scope() {
        let (policy, store, _clock) =
            setup(RateLimitPolicy::new(1).with_scope(RateLimitScope::Level));

        assert!(policy.apply(event("a", Level::Error), &store).is_allow());
        assert!(policy.apply(event("b", Level::Warn), &store).is_allow());
        assert!(policy.apply(event("c", Level::Error), &store).is_suppress());
    }

    #[test]
    fn test_event_key_scope() {
        let (policy, store, _clock) =
            setup(RateLimitPolicy::new(1).with_scope(RateLimitScope::EventKey));

        assert!(policy.apply(event("a", Level::Error), &store).is_allow());
        assert!(policy.apply(event("b", Level::Error), &store).is_allow());
        assert!(policy.apply(event("a", Level::Error), &store).is_suppress());
    }

    #[test]
    fn test_scopes_never_share_a_bucket() {
        let clock = MockClock::new(Instant::now());
        let store = MemoryStore::with_clock(Arc::new(clock.clone()));
        let global = RateLimitPolicy::new(1).with_clock(Arc::new(clock.clone()));
        let per_level = RateLimitPolicy::new(1)
            .with_scope(RateLimitScope::Level)
            .with_clock(Arc::new(clock.clone()));
        let per_key = RateLimitPolicy::new(1)
            .with_scope(RateLimitScope::EventKey)
            .with_clock(Arc::new(clock.clone()));

        assert!(per_key.apply(event("global", Level::Warn), &store).is_allow());
        assert!(per_key.apply(event("warn", Level::Warn), &store).is_allow());
        assert!(global.apply(event("a", Level::Warn), &store).is_allow());
        assert!(per_level.apply(event("b", Level::Warn), &store).is_allow());
    }

    #[test]
    fn test_unmatched_levels_are_not_counted() {
        let (policy, store, _clock) = setup(RateLimitPolicy::new(1).with_levels([Level::Warn]));

        for _ in 0..5 {
            assert!(policy.apply(event("a", Level::Info), &store).is_allow());
        }
        assert!(policy.apply(event("a", Level::Warn), &store).is_allow());
        assert!(policy.apply(event("a", Level::Warn), &store).is_suppress());
    }

    #[test]
    fn test_scope_deserializes_snake_case() {
        let scope: RateLimitScope = serde_json::from_str("\"event_key\"").unwrap();
        assert_eq!(scope, RateLimitScope::EventKey);
        assert!(serde_json::from_str::<RateLimitScope>("\"team\"").is_err());
    }
}
