//! Noise-reduction policies.
//!
//! A policy sees every live event in registration order and either lets it
//! through (possibly rewritten) or suppresses it. Policies keep their state in
//! the shared [`Store`] under keys prefixed with their own tag, so they never
//! read each other's state. A policy that delays events (aggregation) hands
//! them back through [`Policy::flush`].

pub mod aggregate;
pub mod cooldown;
pub mod dedupe;
pub mod rate_limit;

pub use aggregate::AggregatePolicy;
pub use cooldown::CooldownPolicy;
pub use dedupe::DedupePolicy;
pub use rate_limit::{RateLimitPolicy, RateLimitScope};

use crate::application::ports::Store;
use crate::domain::event::{Event, Level};
use crate::domain::outcome::PolicyOutcome;
use std::fmt::{self, Debug};

/// Trait for implementing noise-reduction policies.
///
/// `apply` and `flush` run synchronously and must not block; every store call
/// is a short in-memory critical section.
pub trait Policy: Send + Sync + Debug {
    /// Tag used in logs and as the prefix of this policy's store keys.
    fn name(&self) -> &'static str;

    /// Decide what happens to a live event.
    fn apply(&self, event: Event, store: &dyn Store) -> PolicyOutcome;

    /// Emit events held back by this policy that are now due.
    fn flush(&self, _store: &dyn Store) -> Vec<Event> {
        Vec::new()
    }
}

/// Set of levels a policy applies to. Empty means every level.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LevelSet {
    bits: u8,
}

impl LevelSet {
    /// The empty set, which matches every level.
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a level.
    pub fn with(mut self, level: Level) -> Self {
        self.bits |= Self::bit(level);
        self
    }

    /// True if the set is empty or holds `level`.
    pub fn matches(&self, level: Level) -> bool {
        self.bits == 0 || self.bits & Self::bit(level) != 0
    }

    /// Check if no level was added.
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Levels in the set, most severe first.
    pub fn iter(&self) -> impl Iterator<Item = Level> + '_ {
        Level::ALL
            .into_iter()
            .filter(move |level| self.bits & Self::bit(*level) != 0)
    }

    fn bit(level: Level) -> u8 {
        match level {
            Level::Fatal => 1,
            Level::Error => 1 << 1,
            Level::Warn => 1 << 2,
            Level::Info => 1 << 3,
        }
    }
}

impl FromIterator<Level> for LevelSet {
    fn from_iter<I: IntoIterator<Item = Level>>(iter: I) -> Self {
        iter.into_iter().fold(LevelSet::all(), LevelSet::with)
    }
}

impl Debug for LevelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("LevelSet(*)")
        } else {
            f.debug_set().entries(self.iter()).finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set_matches_everything() {
        let set = LevelSet::all();
        for level in Level::ALL {
            assert!(set.matches(level));
        }
    }

    #[test]
    fn test_set_membership() {
        let set: LevelSet = [Level::Error, Level::Fatal].into_iter().collect();

        assert!(set.matches(Level::Fatal));
        assert!(set.matches(Level::Error));
        assert!(!set.matches(Level::Warn));
        assert!(!set.matches(Level::Info));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Level::Fatal, Level::Error]);
    }

    #[test]
    fn test_debug_format() {
        assert_eq!(format!("{:?}", LevelSet::all()), "LevelSet(*)");
        assert_eq!(format!("{:?}", LevelSet::all().with(Level::Warn)), "{Warn}");
    }
}
