//! FIFO round-robin job queue with a per-call time budget.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, trace};

use strata_core::{JobId, SchedulerError, SchedulerResult, SharedClock, Stopwatch, SystemClock};

use crate::job::{Job, JobHandle};
use crate::status::JobStatus;

/// Outcome of a single `process` call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessReport {
    /// Number of `step()` invocations made.
    pub steps: u32,
    /// Jobs that reached `Finished` and were dropped from the queue.
    pub finished: Vec<JobId>,
    /// Jobs that reached `Faulted` and were dropped from the queue.
    pub faulted: Vec<JobId>,
    /// Time spent inside `process`.
    pub elapsed: Duration,
    /// Jobs still queued afterwards.
    pub remaining: usize,
}

/// Cumulative queue statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub jobs_enqueued: u64,
    pub process_calls: u64,
    pub steps_run: u64,
    pub jobs_finished: u64,
    pub jobs_faulted: u64,
}

/// Jobs awaiting or mid-processing, in arrival order.
///
/// Every job in the queue is `Pending` or `Running`. `process` pops the head,
/// steps it once, and either drops it (terminal) or pushes it to the tail.
/// The loop stops when the budget is spent or the queue is empty, so a call
/// overruns its budget by at most one step.
pub struct JobQueue {
    jobs: VecDeque<JobHandle<dyn Job>>,
    clock: SharedClock,
    stats: QueueStats,
}

impl JobQueue {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            jobs: VecDeque::new(),
            clock,
            stats: QueueStats::default(),
        }
    }

    /// Queue measuring its budget against the wall clock.
    pub fn with_system_clock() -> Self {
        Self::new(SystemClock::shared())
    }

    /// Append a job to the tail.
    ///
    /// Fails with `InvalidState` if the job is already terminal or already
    /// queued.
    pub fn enqueue(&mut self, job: JobHandle<dyn Job>) -> SchedulerResult<()> {
        let status = job.status();
        if status.is_terminal() {
            return Err(SchedulerError::invalid_state(format!(
                "job {} is already {status}",
                job.id()
            )));
        }
        if self.contains(job.id()) {
            return Err(SchedulerError::invalid_state(format!(
                "job {} is already queued",
                job.id()
            )));
        }

        trace!(job_id = %job.id(), queued = self.jobs.len() + 1, "job enqueued");
        self.jobs.push_back(job);
        self.stats.jobs_enqueued += 1;
        Ok(())
    }

    /// Step jobs oldest-first until `budget` is spent or the queue is empty.
    pub fn process(&mut self, budget: Duration) -> ProcessReport {
        let watch = Stopwatch::start(self.clock.clone());
        let mut report = ProcessReport::default();

        while watch.elapsed() < budget {
            let Some(job) = self.jobs.pop_front() else {
                break;
            };

            // Terminal jobs are dropped without another step.
            if !job.status().is_terminal() {
                job.borrow_mut().step();
                report.steps += 1;
            }

            match job.status() {
                JobStatus::Finished => {
                    debug!(job_id = %job.id(), "job finished");
                    report.finished.push(job.id());
                }
                JobStatus::Faulted => {
                    debug!(job_id = %job.id(), fault = ?job.fault(), "job faulted");
                    report.faulted.push(job.id());
                }
                JobStatus::Pending | JobStatus::Running => self.jobs.push_back(job),
            }
        }

        report.elapsed = watch.elapsed();
        report.remaining = self.jobs.len();

        self.stats.process_calls += 1;
        self.stats.steps_run += u64::from(report.steps);
        self.stats.jobs_finished += report.finished.len() as u64;
        self.stats.jobs_faulted += report.faulted.len() as u64;

        report
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.jobs.iter().any(|j| j.id() == id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Queued job ids, head first.
    pub fn ids(&self) -> Vec<JobId> {
        self.jobs.iter().map(|j| j.id()).collect()
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}

impl core::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JobQueue")
            .field("queued", &self.jobs.len())
            .field("stats", &self.stats)
            .finish()
    }
}
