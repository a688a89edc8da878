//! Collection interval boundary tracking
//!
//! Counts and summaries need an interval start, while SDK points only carry
//! their end time. The tracker remembers when the previous export cycle
//! finished so every point in the current cycle shares one interval start.

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current wall-clock time in nanoseconds since the epoch
pub trait Clock: Send + Sync + Debug {
    /// Current time in nanoseconds since the epoch
    fn now_nanos(&self) -> u64;
}

/// Clock backed by [`SystemTime`]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_nanos(&self) -> u64 {
        system_time_to_nanos(SystemTime::now())
    }
}

/// Manually advanced clock for deterministic tests
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    /// Create a clock reading `nanos`
    pub fn new(nanos: u64) -> Self {
        Self {
            nanos: AtomicU64::new(nanos),
        }
    }

    /// Set the current reading
    pub fn set_nanos(&self, nanos: u64) {
        self.nanos.store(nanos, Ordering::SeqCst);
    }

    /// Set the current reading in milliseconds
    pub fn set_millis(&self, millis: u64) {
        self.set_nanos(millis.saturating_mul(1_000_000));
    }

    /// Move the clock forward
    pub fn advance_nanos(&self, nanos: u64) {
        self.nanos.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }
}

/// Tracks the boundary of the previous collection interval
#[derive(Debug)]
pub struct TimeTracker {
    clock: Arc<dyn Clock>,
    previous_nanos: AtomicU64,
}

impl TimeTracker {
    /// Create a tracker; the previous boundary starts at the clock's current reading
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let previous_nanos = AtomicU64::new(clock.now_nanos());
        Self {
            clock,
            previous_nanos,
        }
    }

    /// Create a tracker reading the system clock
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    /// Current time in nanoseconds since the epoch
    pub fn current_time_nanos(&self) -> u64 {
        self.clock.now_nanos()
    }

    /// Time of the last [`TimeTracker::tick`], or of construction if never ticked
    pub fn previous_time_nanos(&self) -> u64 {
        self.previous_nanos.load(Ordering::SeqCst)
    }

    /// Record the current time as the new previous boundary
    ///
    /// Call once per export cycle, after every point in the cycle has been translated.
    pub fn tick(&self) {
        self.previous_nanos
            .store(self.clock.now_nanos(), Ordering::SeqCst);
    }
}

impl Default for TimeTracker {
    fn default() -> Self {
        Self::system()
    }
}

/// Nanoseconds since the epoch, zero for times before it
pub fn system_time_to_nanos(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Truncate nanoseconds to whole milliseconds
pub fn nanos_to_millis(nanos: u64) -> u64 {
    nanos / 1_000_000
}
