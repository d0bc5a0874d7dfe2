//! Scripted job for tests/dev.
//!
//! `ScriptedJob` needs a fixed number of steps, charges a fixed cost to a
//! [`ManualClock`] per step, and can append its label to a shared log, so
//! tests can assert on ordering, budgets and cancellation without real work.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use strata_core::{JobFault, ManualClock};

use crate::cancel::CancellationToken;
use crate::job::Job;
use crate::status::{JobState, JobStatus};

/// Shared record of which job performed work, in order.
pub type StepLog = Rc<RefCell<Vec<String>>>;

#[derive(Debug)]
pub struct ScriptedJob {
    label: String,
    steps_required: u32,
    step_cost: Duration,
    fail_on_step: Option<u32>,
    clock: ManualClock,
    token: CancellationToken,
    log: Option<StepLog>,
    progress: u32,
    state: JobState,
}

impl ScriptedJob {
    pub fn new(label: impl Into<String>, steps_required: u32, clock: ManualClock) -> Self {
        Self {
            label: label.into(),
            steps_required,
            step_cost: Duration::ZERO,
            fail_on_step: None,
            clock,
            token: CancellationToken::none(),
            log: None,
            progress: 0,
            state: JobState::new(),
        }
    }

    /// Advance the clock by `cost` for every step that does work.
    pub fn with_step_cost(mut self, cost: Duration) -> Self {
        self.step_cost = cost;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn with_log(mut self, log: StepLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Fault with a generation error when the given step (1-indexed) runs.
    pub fn failing_on_step(mut self, step: u32) -> Self {
        self.fail_on_step = Some(step);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of `step()` calls the job accepted (including the one that
    /// observed cancellation).
    pub fn steps_taken(&self) -> u32 {
        self.state.steps()
    }

    /// Units of work actually performed.
    pub fn progress(&self) -> u32 {
        self.progress
    }
}

impl Job for ScriptedJob {
    fn step(&mut self) {
        if !self.state.begin_step() {
            return;
        }

        if self.token.is_cancelled() {
            self.state.fail(JobFault::cancelled(format!("step {}", self.progress + 1)));
            return;
        }

        self.clock.advance(self.step_cost);
        self.progress += 1;
        if let Some(log) = &self.log {
            log.borrow_mut().push(self.label.clone());
        }

        if self.fail_on_step == Some(self.progress) {
            self.state.fail(JobFault::generation(
                format!("step {}", self.progress),
                "scripted failure",
            ));
        } else if self.progress >= self.steps_required {
            self.state.finish();
        }
    }

    fn status(&self) -> JobStatus {
        self.state.status()
    }

    fn fault(&self) -> Option<&JobFault> {
        self.state.fault()
    }

    fn describe(&self) -> String {
        format!("scripted job {}", self.label)
    }
}
