//! Per-step budgeting for job authors.
//!
//! A job checks its [`SliceBudget`] at every internal checkpoint and yields
//! once it is exhausted. The budget is advisory: a single unit of work that
//! overruns it still completes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use strata_core::{SharedClock, Stopwatch};

/// Per-step budget a job is constructed with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepBudget {
    /// Wall-clock time a single step may use.
    pub time: Duration,
    /// Optional cap on work units per step, independent of time.
    pub unit_cap: Option<u32>,
}

impl StepBudget {
    pub fn new(time: Duration) -> Self {
        Self {
            time,
            unit_cap: None,
        }
    }

    pub fn with_unit_cap(mut self, cap: u32) -> Self {
        self.unit_cap = Some(cap.max(1));
        self
    }

    /// Start measuring a slice against this budget.
    pub fn start(&self, clock: SharedClock) -> SliceBudget {
        SliceBudget {
            watch: Stopwatch::start(clock),
            time: self.time,
            unit_cap: self.unit_cap,
            units: 0,
        }
    }
}

impl Default for StepBudget {
    fn default() -> Self {
        Self::new(Duration::from_millis(2))
    }
}

/// A running slice: elapsed time plus the units of work done so far.
#[derive(Debug)]
pub struct SliceBudget {
    watch: Stopwatch,
    time: Duration,
    unit_cap: Option<u32>,
    units: u32,
}

impl SliceBudget {
    /// Record one completed unit of work.
    pub fn record_unit(&mut self) {
        self.units += 1;
    }

    pub fn units(&self) -> u32 {
        self.units
    }

    pub fn elapsed(&self) -> Duration {
        self.watch.elapsed()
    }

    /// True once the slice should yield back to the queue.
    pub fn exhausted(&self) -> bool {
        if self.unit_cap.is_some_and(|cap| self.units >= cap) {
            return true;
        }
        self.watch.elapsed() >= self.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::ManualClock;

    #[test]
    fn time_budget_exhausts() {
        let clock = ManualClock::new();
        let slice = StepBudget::new(Duration::from_millis(2)).start(clock.shared());

        assert!(!slice.exhausted());
        clock.advance(Duration::from_millis(1));
        assert!(!slice.exhausted());
        clock.advance(Duration::from_millis(1));
        assert!(slice.exhausted());
    }

    #[test]
    fn unit_cap_exhausts_without_time_passing() {
        let clock = ManualClock::new();
        let mut slice = StepBudget::new(Duration::from_secs(1))
            .with_unit_cap(2)
            .start(clock.shared());

        slice.record_unit();
        assert!(!slice.exhausted());
        slice.record_unit();
        assert!(slice.exhausted());
        assert_eq!(slice.units(), 2);
    }

    #[test]
    fn zero_cap_is_raised_to_one() {
        assert_eq!(StepBudget::default().with_unit_cap(0).unit_cap, Some(1));
    }
}
