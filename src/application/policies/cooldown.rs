//! Quiet period after an alert fires.

use super::{LevelSet, Policy};
use crate::application::ports::Store;
use crate::domain::event::{Event, Level};
use crate::domain::outcome::{PolicyOutcome, SuppressReason};
use std::time::Duration;

/// Lets one alert per `event_key` through, then suppresses that key until the
/// cooldown expires. Unlike dedupe there is no repeat threshold.
#[derive(Debug, Clone)]
pub struct CooldownPolicy {
    ttl: Duration,
    levels: LevelSet,
}

impl CooldownPolicy {
    /// Create a cooldown policy applying to every level.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            levels: LevelSet::all(),
        }
    }

    /// Restrict to the given levels.
    pub fn with_levels(mut self, levels: impl IntoIterator<Item = Level>) -> Self {
        self.levels = levels.into_iter().collect();
        self
    }
}

impl Policy for CooldownPolicy {
    fn name(&self) -> &'static str {
        "cooldown"
    }

    fn apply(&self, event: Event, store: &dyn Store) -> PolicyOutcome {
        if !self.levels.matches(event.level()) {
            return PolicyOutcome::Allow(event);
        }

        let key = format!("cooldown:{}", event.event_key());
        if store.is_active(&key) {
            return PolicyOutcome::suppress(SuppressReason::Cooldown);
        }

        store.set_expiry(&key, self.ttl);
        PolicyOutcome::Allow(event)
    }
}
