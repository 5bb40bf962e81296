//! Mock clock for testing.

use crate::application::ports::Clock;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Wall-clock start used by [`MockClock::new`]; falls on a minute boundary.
pub const DEFAULT_SYSTEM_START: Duration = Duration::from_secs(1_700_000_040);

#[derive(Debug, Clone, Copy)]
struct Readings {
    instant: Instant,
    system: SystemTime,
}

/// Mock clock for testing.
///
/// Both readings move together, so expiry windows and minute buckets stay in
/// step as a test advances time.
///
/// # Examples
///
/// ```
/// use notice::infrastructure::mocks::MockClock;
/// use notice::application::ports::Clock;
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let clock = MockClock::new(start);
/// let wall = clock.system_now();
///
/// clock.advance(Duration::from_secs(90));
/// assert_eq!(clock.now(), start + Duration::from_secs(90));
/// assert_eq!(clock.system_now(), wall + Duration::from_secs(90));
/// ```
///
/// # Thread Safety
///
/// All clones share the same underlying readings, so advancing time in one
/// clone affects all clones.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<Readings>>,
}

impl MockClock {
    /// Create a mock clock at `start`, with wall time at [`DEFAULT_SYSTEM_START`]
    /// after the Unix epoch.
    pub fn new(start: Instant) -> Self {
        Self::with_system_time(start, UNIX_EPOCH + DEFAULT_SYSTEM_START)
    }

    /// Create a mock clock with explicit monotonic and wall-clock starts.
    pub fn with_system_time(start: Instant, system: SystemTime) -> Self {
        Self {
            current: Arc::new(Mutex::new(Readings {
                instant: start,
                system,
            })),
        }
    }

    /// Advance both readings by a duration.
    pub fn advance(&self, duration: Duration) {
        let mut readings = self.lock();
        readings.instant += duration;
        readings.system += duration;
    }

    /// Move the monotonic reading to `instant`, shifting wall time by the
    /// same amount.
    pub fn set(&self, instant: Instant) {
        let mut readings = self.lock();
        if instant >= readings.instant {
            let delta = instant - readings.instant;
            readings.system += delta;
        } else {
            let delta = readings.instant - instant;
            readings.system -= delta;
        }
        readings.instant = instant;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Readings> {
        self.current
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock")
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.lock().instant
    }

    fn system_now(&self) -> SystemTime {
        self.lock().system
    }
}
