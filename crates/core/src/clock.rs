//! Time source used to budget work.
//!
//! Budgets are measured against an injected [`Clock`] rather than calling
//! `Instant::now()` directly, so tests can drive time by hand.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic time source.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Shared clock handle held by queues and jobs.
pub type SharedClock = Rc<dyn Clock>;

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

impl SystemClock {
    pub fn shared() -> SharedClock {
        Rc::new(SystemClock)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-driven clock for tests/dev.
///
/// Clones share the same time, so a job and the queue processing it observe
/// the same advances.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    /// Move time forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    /// Total time advanced since creation.
    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }

    pub fn shared(&self) -> SharedClock {
        Rc::new(self.clone())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }
}

/// Measures elapsed time against a [`Clock`] from the moment it was started.
#[derive(Clone)]
pub struct Stopwatch {
    clock: SharedClock,
    started: Instant,
}

impl Stopwatch {
    pub fn start(clock: SharedClock) -> Self {
        let started = clock.now();
        Self { clock, started }
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.started)
    }
}

impl core::fmt::Debug for Stopwatch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stopwatch")
            .field("elapsed", &self.elapsed())
            .finish()
    }
}
