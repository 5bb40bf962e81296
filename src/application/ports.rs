//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports, and callers
//! plug their own delivery sinks in through [`Channel`].

use crate::domain::event::Event;
use crate::domain::result::ChannelResult;
use async_trait::async_trait;
use std::fmt::Debug;
use std::time::{Duration, Instant, SystemTime};

/// Port for obtaining current time.
///
/// Infrastructure provides concrete implementations (SystemClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Monotonic instant, used for expiry and aggregate windows.
    fn now(&self) -> Instant;

    /// Wall-clock time, used where a calendar bucket is needed.
    fn system_now(&self) -> SystemTime;
}

/// Port for the expiring key-value store shared by all policies.
///
/// Holds two kinds of entries under independent keys: boolean flags with an
/// expiry, and counters with a sliding expiry. Every operation is atomic per
/// key and never blocks on I/O.
pub trait Store: Send + Sync + Debug {
    /// True iff `key` has a flag whose expiry is strictly in the future.
    ///
    /// An expired flag is removed on the way out.
    fn is_active(&self, key: &str) -> bool;

    /// Arm (or re-arm) the flag for `key`, expiring `ttl` from now.
    fn set_expiry(&self, key: &str, ttl: Duration);

    /// Bump the counter for `key` and return the new value.
    ///
    /// An expired counter restarts from zero. The expiry is always pushed out
    /// to `ttl` from now.
    fn increment(&self, key: &str, ttl: Duration) -> u64;

    /// Current counter value; an expired counter reads 0 and is removed.
    fn get_count(&self, key: &str) -> u64;

    /// Drop both the flag and the counter for `key`.
    fn reset(&self, key: &str);

    /// Number of stored entries, flags and counters together.
    fn len(&self) -> usize;

    /// Check if the store holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry.
    fn clear(&self);
}

/// Port for a delivery sink.
///
/// `send` must not fail: implementations convert transport errors into
/// [`ChannelResult::failure`]. The dispatcher additionally contains timeouts
/// and panics.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Stable name, unique within one dispatcher.
    fn name(&self) -> &str;

    /// Deliver one event.
    async fn send(&self, event: &Event) -> ChannelResult;
}
