//! Single-shot countdown timer.
//!
//! The timer never calls back on its own. The thread that owns the detector
//! asks how long until the deadline, sleeps at most that long, then collects
//! the expiry with `take_expired`. This keeps the expiry serialized with
//! sample delivery.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed.set(self.elapsed.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed.get()
    }
}

/// Follows the `t` stamps of the feed once any sample carries one, and the
/// wall clock until then. Clones share the same time.
#[derive(Debug, Clone)]
pub struct FeedClock {
    origin: Instant,
    stamp_ms: Rc<Cell<Option<u64>>>,
}

impl FeedClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            stamp_ms: Rc::new(Cell::new(None)),
        }
    }

    /// Record a sample timestamp. Zero means the sample carried none.
    pub fn observe(&self, timestamp_ms: u64) {
        if timestamp_ms > 0 {
            self.stamp_ms.set(Some(timestamp_ms));
        }
    }

    pub fn is_stamped(&self) -> bool {
        self.stamp_ms.get().is_some()
    }
}

impl Default for FeedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FeedClock {
    fn now(&self) -> Instant {
        match self.stamp_ms.get() {
            Some(ms) => self.origin + Duration::from_millis(ms),
            None => Instant::now(),
        }
    }
}

pub trait Timer {
    fn set_interval(&mut self, interval: Duration);
    fn interval(&self) -> Duration;
    /// Arm the timer for a full interval, discarding any pending deadline.
    fn start(&mut self);
    fn cancel(&mut self);
    fn is_active(&self) -> bool;
    /// Time left before expiry, `None` when inactive.
    fn remaining(&self) -> Option<Duration>;
    /// True exactly once per `start` after the interval has elapsed.
    fn take_expired(&mut self) -> bool;
}

#[derive(Debug, Clone)]
pub struct DeadlineTimer<C: Clock = SystemClock> {
    clock: C,
    interval: Duration,
    deadline: Option<Instant>,
}

impl DeadlineTimer<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for DeadlineTimer<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> DeadlineTimer<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            interval: Duration::ZERO,
            deadline: None,
        }
    }
}

impl<C: Clock> Timer for DeadlineTimer<C> {
    fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn start(&mut self) {
        self.deadline = Some(self.clock.now() + self.interval);
    }

    fn cancel(&mut self) {
        self.deadline = None;
    }

    fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(self.clock.now()))
    }

    fn take_expired(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if self.clock.now() >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
