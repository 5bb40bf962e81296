//! Duplicate suppression within a time window.

use super::{LevelSet, Policy};
use crate::application::ports::Store;
use crate::domain::event::{Event, Level};
use crate::domain::outcome::{PolicyOutcome, SuppressReason};
use std::time::Duration;

/// Suppresses repeats of the same `event_key` while its dedupe flag is armed.
///
/// With `upgrade_after = n`, a persistent alert is let through again once `n`
/// copies have been suppressed, so a storm is never silenced for the full
/// window.
///
/// # Example
/// ```
/// use notice::application::policies::{DedupePolicy, Policy};
/// use notice::infrastructure::store::MemoryStore;
/// use notice::Event;
/// use std::time::Duration;
///
/// let store = MemoryStore::new();
/// let policy = DedupePolicy::new(Duration::from_secs(60));
/// let event = Event::builder("disk full").event_key("disk").build();
///
/// assert!(policy.apply(event.clone(), &store).is_allow());
/// assert!(policy.apply(event, &store).is_suppress());
/// ```
#[derive(Debug, Clone)]
pub struct DedupePolicy {
    ttl: Duration,
    levels: LevelSet,
    upgrade_after: Option<u64>,
}

impl DedupePolicy {
    /// Create a dedupe policy applying to every level.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            levels: LevelSet::all(),
            upgrade_after: None,
        }
    }

    /// Restrict to the given levels.
    pub fn with_levels(mut self, levels: impl IntoIterator<Item = Level>) -> Self {
        self.levels = levels.into_iter().collect();
        self
    }

    /// Let an alert through again after `count` suppressed repeats.
    pub fn with_upgrade_after(mut self, count: u64) -> Self {
        self.upgrade_after = Some(count);
        self
    }

    fn flag_key(event: &Event) -> String {
        format!("dedupe:{}", event.event_key())
    }

    // Must never equal a flag key: `reset` clears flags and counters alike.
    fn suppressed_key(event: &Event) -> String {
        format!("suppress:{}", event.event_key())
    }
}

impl Policy for DedupePolicy {
    fn name(&self) -> &'static str {
        "dedupe"
    }

    fn apply(&self, event: Event, store: &dyn Store) -> PolicyOutcome {
        if !self.levels.matches(event.level()) {
            return PolicyOutcome::Allow(event);
        }

        let flag_key = Self::flag_key(&event);
        let suppressed_key = Self::suppressed_key(&event);

        if !store.is_active(&flag_key) {
            store.set_expiry(&flag_key, self.ttl);
            store.reset(&suppressed_key);
            return PolicyOutcome::Allow(event);
        }

        let suppressed = store.increment(&suppressed_key, self.ttl);
        match self.upgrade_after {
            Some(threshold) if suppressed >= threshold => {
                store.reset(&suppressed_key);
                store.set_expiry(&flag_key, self.ttl);
                tracing::debug!(
                    policy = self.name(),
                    event_key = event.event_key(),
                    suppressed,
                    "repeat threshold reached, letting alert through"
                );
                PolicyOutcome::Allow(event)
            }
            _ => PolicyOutcome::suppress(SuppressReason::Deduped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::MockClock;
    use crate::infrastructure::store::MemoryStore;
    use std::sync::Arc;
    use std::time::Instant;

    fn setup() -> (MemoryStore, MockClock) {
        let clock = MockClock::new(Instant::now());
        (MemoryStore::with_clock(Arc::new(clock.clone())), clock)
    }

    fn event(key: &str, level: Level) -> Event {
        Event::builder("payload").event_key(key).level(level).build()
    }

    #[test]
    fn test_repeat_within_ttl_is_suppressed() {
        let (store, clock) = setup();
        let policy = DedupePolicy::new(Duration::from_secs(60));

        assert!(policy.apply(event("db", Level::Error), &store).is_allow());
        clock.advance(Duration::from_secs(30));
        let outcome = policy.apply(event("db", Level::Error), &store);
        assert_eq!(outcome.reason(), Some(&SuppressReason::Deduped));
    }

    #[test]
    fn test_allowed_again_after_ttl() {
        let (store, clock) = setup();
        let policy = DedupePolicy::new(Duration::from_secs(60));

        assert!(policy.apply(event("db", Level::Error), &store).is_allow());
        clock.advance(Duration::from_secs(60));
        assert!(policy.apply(event("db", Level::Error), &store).is_allow());
    }

    #[test]
    fn test_different_keys_are_independent() {
        let (store, _clock) = setup();
        let policy = DedupePolicy::new(Duration::from_secs(60));

        assert!(policy.apply(event("a", Level::Error), &store).is_allow());
        assert!(policy.apply(event("b", Level::Error), &store).is_allow());
    }

    #[test]
    fn test_upgrade_after_lets_storm_through() {
        let (store, _clock) = setup();
        let policy = DedupePolicy::new(Duration::from_secs(60)).with_upgrade_after(3);

        let decisions: Vec<bool> = (0..8)
            .map(|_| policy.apply(event("db", Level::Error), &store).is_allow())
            .collect();

        // Allowed on first sight, then the third suppressed repeat is upgraded.
        assert_eq!(
            decisions,
            vec![true, false, false, true, false, false, true, false]
        );
    }

    #[test]
    fn test_counter_key_never_disarms_another_flag() {
        let (store, _clock) = setup();
        let policy = DedupePolicy::new(Duration::from_secs(3600));

        assert!(policy.apply(event("suppressed:db", Level::Error), &store).is_allow());
        // First sighting of `db` resets its repeat counter.
        assert!(policy.apply(event("db", Level::Error), &store).is_allow());

        let repeat = policy.apply(event("suppressed:db", Level::Error), &store);
        assert_eq!(repeat.reason(), Some(&SuppressReason::Deduped));
    }

    #[test]
    fn test_level_filter() {
        let (store, _clock) = setup();
        let policy = DedupePolicy::new(Duration::from_secs(60)).with_levels([Level::Error]);

        assert!(policy.apply(event("x", Level::Info), &store).is_allow());
        assert!(policy.apply(event("x", Level::Info), &store).is_allow());
        assert!(store.is_empty(), "unmatched levels leave no state");

        assert!(policy.apply(event("x", Level::Error), &store).is_allow());
        assert!(policy.apply(event("x", Level::Error), &store).is_suppress());
    }

    #[test]
    fn test_allowed_event_is_unchanged() {
        let (store, _clock) = setup();
        let policy = DedupePolicy::new(Duration::from_secs(60));
        let original = event("db", Level::Warn).with_meta("trace", "abc");

        let outcome = policy.apply(original.clone(), &store);
        assert_eq!(outcome.into_event(), Some(original));
    }
}
