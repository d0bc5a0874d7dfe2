//! Job status and its monotonic lifecycle.

use serde::{Deserialize, Serialize};

use strata_core::JobFault;

/// Job execution status.
///
/// Transitions only move forward: `Pending → Running → Finished | Faulted`.
/// A terminal status never changes again.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, not yet stepped
    #[default]
    Pending,
    /// Stepped at least once, more work remains
    Running,
    /// Completed successfully
    Finished,
    /// Aborted (cancellation or internal fault)
    Faulted,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Faulted)
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Finished, _) | (JobStatus::Faulted, _) => false,
            (JobStatus::Running, JobStatus::Pending) => false,
            _ => true,
        }
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Faulted => "faulted",
        };
        f.write_str(s)
    }
}

/// Lifecycle bookkeeping a job embeds to implement `Job::status`.
///
/// All mutators refuse to leave a terminal status, so a job built on
/// `JobState` cannot regress even if its own logic is sloppy.
#[derive(Debug, Clone, Default)]
pub struct JobState {
    status: JobStatus,
    fault: Option<JobFault>,
    steps: u32,
}

impl JobState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn fault(&self) -> Option<&JobFault> {
        self.fault.as_ref()
    }

    /// Number of `step()` calls that were accepted.
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Record the start of a step.
    ///
    /// Returns `false` when the job is already terminal; the caller must then
    /// do no work.
    pub fn begin_step(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Running;
        self.steps += 1;
        true
    }

    /// Mark the job finished. Returns `false` if it was already terminal.
    pub fn finish(&mut self) -> bool {
        self.transition(JobStatus::Finished)
    }

    /// Mark the job faulted with a diagnostic. Returns `false` if it was
    /// already terminal (the first fault wins).
    pub fn fail(&mut self, fault: JobFault) -> bool {
        if !self.transition(JobStatus::Faulted) {
            return false;
        }
        self.fault = Some(fault);
        true
    }

    fn transition(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_moves_forward() {
        let mut state = JobState::new();
        assert_eq!(state.status(), JobStatus::Pending);

        assert!(state.begin_step());
        assert_eq!(state.status(), JobStatus::Running);
        assert!(state.begin_step());
        assert_eq!(state.steps(), 2);

        assert!(state.finish());
        assert_eq!(state.status(), JobStatus::Finished);
    }

    #[test]
    fn terminal_status_never_regresses() {
        let mut state = JobState::new();
        state.begin_step();
        state.fail(JobFault::cancelled("layout"));

        assert!(!state.begin_step());
        assert!(!state.finish());
        assert!(!state.fail(JobFault::generation("anchor", "late")));

        assert_eq!(state.status(), JobStatus::Faulted);
        assert_eq!(state.steps(), 1);
        assert_eq!(state.fault(), Some(&JobFault::cancelled("layout")));
    }

    #[test]
    fn transition_table() {
        use JobStatus::*;

        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Faulted));
        assert!(Running.can_transition_to(Running));
        assert!(Running.can_transition_to(Finished));
        assert!(!Running.can_transition_to(Pending));
        for next in [Pending, Running, Finished, Faulted] {
            assert!(!Finished.can_transition_to(next));
            assert!(!Faulted.can_transition_to(next));
        }
    }
}
