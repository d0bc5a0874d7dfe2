//! Per-subsystem scheduler: one queue, one registry, one tick entry point.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use strata_core::{JobId, SchedulerResult, SharedClock};

use crate::cancel::CancellationSource;
use crate::job::{Job, JobHandle};
use crate::queue::{JobQueue, ProcessReport, QueueStats};
use crate::registry::{JobRegistry, ReapedJob};

/// Everything that happened during one `tick`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub process: ProcessReport,
    pub reaped: Vec<ReapedJob>,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.process.steps == 0 && self.reaped.is_empty()
    }
}

/// Owns the job queue and registry of one subsystem.
///
/// `tick` processes the queue for up to the configured budget and then sweeps
/// the registry, so a job that reached a terminal status during this tick is
/// reaped in the same tick.
pub struct JobScheduler<J: Job + 'static> {
    name: String,
    queue: JobQueue,
    registry: JobRegistry<J>,
    budget: Duration,
}

impl<J: Job + 'static> JobScheduler<J> {
    pub fn new(name: impl Into<String>, clock: SharedClock, budget: Duration) -> Self {
        Self {
            name: name.into(),
            queue: JobQueue::new(clock),
            registry: JobRegistry::new(),
            budget,
        }
    }

    /// Register a job with its cancellation controller and enqueue it.
    pub fn submit(&mut self, job: J, cancel: CancellationSource) -> SchedulerResult<JobHandle<J>> {
        let handle = JobHandle::new(job);
        self.queue.enqueue(handle.erase())?;
        self.registry.register(handle.clone(), cancel);

        info!(
            scheduler = %self.name,
            job_id = %handle.id(),
            desc = %handle.describe(),
            outstanding = self.registry.len(),
            "job submitted"
        );
        Ok(handle)
    }

    /// Run one scheduler tick with the configured budget.
    pub fn tick(&mut self) -> TickReport {
        self.tick_with_budget(self.budget)
    }

    /// Run one scheduler tick: `process(budget)` then `reap()`.
    pub fn tick_with_budget(&mut self, budget: Duration) -> TickReport {
        let process = self.queue.process(budget);
        if process.steps > 0 {
            debug!(
                scheduler = %self.name,
                steps = process.steps,
                elapsed_us = process.elapsed.as_micros() as u64,
                remaining = process.remaining,
                "queue processed"
            );
        }

        let reaped = self.registry.reap();
        for job in &reaped {
            match &job.fault {
                None => info!(
                    scheduler = %self.name,
                    job_id = %job.id,
                    outstanding_ms = job.outstanding_ms,
                    "job reaped"
                ),
                Some(fault) => warn!(
                    scheduler = %self.name,
                    job_id = %job.id,
                    cancelled = job.was_cancelled,
                    fault = %fault,
                    "faulted job reaped"
                ),
            }
        }

        TickReport { process, reaped }
    }

    /// Cancel every outstanding job matching `predicate`.
    pub fn cancel_where<F>(&self, predicate: F) -> usize
    where
        F: FnMut(&J) -> bool,
    {
        let n = self.registry.cancel_all_for(predicate);
        if n > 0 {
            info!(scheduler = %self.name, cancelled = n, "cancellation requested");
        }
        n
    }

    pub fn cancel(&self, id: JobId) -> bool {
        self.registry.cancel(id)
    }

    pub fn registry(&self) -> &JobRegistry<J> {
        &self.registry
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn stats(&self) -> &QueueStats {
        self.queue.stats()
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn set_budget(&mut self, budget: Duration) {
        self.budget = budget;
    }

    /// Jobs submitted and not yet reaped.
    pub fn outstanding(&self) -> usize {
        self.registry.len()
    }

    /// True when nothing is queued or awaiting a reap.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.registry.is_empty()
    }
}

impl<J: Job + 'static> core::fmt::Debug for JobScheduler<J> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JobScheduler")
            .field("name", &self.name)
            .field("budget", &self.budget)
            .field("queue", &self.queue)
            .field("outstanding", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::JobStatus;
    use crate::testing::ScriptedJob;
    use strata_core::ManualClock;

    const UNIT: Duration = Duration::from_millis(1);

    fn scheduler(clock: &ManualClock) -> JobScheduler<ScriptedJob> {
        JobScheduler::new("test", clock.shared(), 2 * UNIT)
    }

    fn submit(s: &mut JobScheduler<ScriptedJob>, clock: &ManualClock, label: &str, steps: u32) -> JobHandle<ScriptedJob> {
        let cancel = CancellationSource::new();
        let job = ScriptedJob::new(label, steps, clock.clone())
            .with_step_cost(UNIT)
            .with_cancellation(cancel.token());
        s.submit(job, cancel).unwrap()
    }

    #[test]
    fn finished_job_is_reaped_in_the_same_tick() {
        let clock = ManualClock::new();
        let mut s = scheduler(&clock);
        let job = submit(&mut s, &clock, "a", 1);

        let report = s.tick();
        assert_eq!(report.process.finished, vec![job.id()]);
        assert_eq!(report.reaped.len(), 1);
        assert_eq!(report.reaped[0].id, job.id());
        assert!(s.is_idle());
    }

    #[test]
    fn job_outlives_several_ticks() {
        let clock = ManualClock::new();
        let mut s = scheduler(&clock);
        let a = submit(&mut s, &clock, "a", 4);
        let b = submit(&mut s, &clock, "b", 4);

        // a and b each get one step per tick.
        for _ in 0..3 {
            let report = s.tick();
            assert_eq!(report.process.steps, 2);
            assert!(report.reaped.is_empty());
        }
        assert_eq!(a.status(), JobStatus::Running);
        assert_eq!(s.outstanding(), 2);

        let report = s.tick();
        assert_eq!(report.reaped.len(), 2);
        assert_eq!(b.status(), JobStatus::Finished);
        assert!(s.is_idle());
    }

    #[test]
    fn cancel_where_faults_on_next_tick_and_reaps() {
        let clock = ManualClock::new();
        let mut s = scheduler(&clock);
        let doomed = submit(&mut s, &clock, "doomed", 3);
        let kept = submit(&mut s, &clock, "kept", 3);

        s.tick();
        assert_eq!(s.cancel_where(|j| j.label() == "doomed"), 1);
        assert_eq!(doomed.status(), JobStatus::Running);

        let report = s.tick();
        assert_eq!(report.process.faulted, vec![doomed.id()]);
        let reaped = report.reaped.iter().find(|r| r.id == doomed.id()).unwrap();
        assert!(reaped.was_cancelled);
        assert_eq!(reaped.status, JobStatus::Faulted);
        assert_eq!(doomed.borrow().progress(), 1);

        while !s.is_idle() {
            s.tick();
        }
        assert_eq!(kept.status(), JobStatus::Finished);
    }

    #[test]
    fn idle_tick_reports_nothing() {
        let clock = ManualClock::new();
        let mut s = scheduler(&clock);
        assert!(s.tick().is_idle());
    }
}
