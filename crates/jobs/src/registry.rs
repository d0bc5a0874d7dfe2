//! Outstanding `(job, cancellation)` pairs.
//!
//! The registry is a side list next to the queue: it is how an owning
//! subsystem finds its jobs again to cancel them, and it is swept once per
//! tick (after the queue has processed) to drop jobs that reached a terminal
//! status. The queue never touches it.

use chrono::{DateTime, Utc};
use serde::Serialize;

use strata_core::{JobFault, JobId};

use crate::cancel::CancellationSource;
use crate::job::{Job, JobHandle};
use crate::status::JobStatus;

/// One outstanding job and the controller side of its cancellation token.
pub struct RegistryEntry<J> {
    job: JobHandle<J>,
    cancel: CancellationSource,
    registered_at: DateTime<Utc>,
}

impl<J: Job> RegistryEntry<J> {
    pub fn job(&self) -> &JobHandle<J> {
        &self.job
    }

    pub fn cancellation(&self) -> &CancellationSource {
        &self.cancel
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    pub fn status(&self) -> JobStatus {
        self.job.status()
    }
}

/// A job removed from the registry by `reap`.
#[derive(Debug, Clone, Serialize)]
pub struct ReapedJob {
    pub id: JobId,
    pub status: JobStatus,
    pub description: String,
    pub fault: Option<JobFault>,
    pub was_cancelled: bool,
    pub outstanding_ms: u64,
}

pub struct JobRegistry<J> {
    entries: Vec<RegistryEntry<J>>,
}

impl<J: Job> JobRegistry<J> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Track a job with the controller side of its cancellation token.
    pub fn register(&mut self, job: JobHandle<J>, cancel: CancellationSource) {
        self.entries.push(RegistryEntry {
            job,
            cancel,
            registered_at: Utc::now(),
        });
    }

    /// Remove every entry whose job is `Finished` or `Faulted`, releasing its
    /// cancellation source. Returns what was removed, in registration order.
    pub fn reap(&mut self) -> Vec<ReapedJob> {
        let (done, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| e.status().is_terminal());
        self.entries = live;

        let now = Utc::now();
        done.into_iter()
            .map(|e| ReapedJob {
                id: e.job.id(),
                status: e.status(),
                description: e.job.describe(),
                fault: e.job.fault(),
                was_cancelled: e.cancel.is_cancelled(),
                outstanding_ms: (now - e.registered_at).num_milliseconds().max(0) as u64,
            })
            .collect()
    }

    /// Trigger cancellation for every non-terminal job matching `predicate`.
    ///
    /// Cancellation takes effect the next time each job polls its token, not
    /// during this call. Terminal jobs are skipped. Returns the number of
    /// tokens triggered.
    pub fn cancel_all_for<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&J) -> bool,
    {
        let mut cancelled = 0;
        for entry in &self.entries {
            if entry.status().is_terminal() || entry.cancel.is_cancelled() {
                continue;
            }
            if predicate(&*entry.job.borrow()) {
                entry.cancel.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Trigger cancellation for a single job. Returns `false` if it is not
    /// registered.
    pub fn cancel(&self, id: JobId) -> bool {
        match self.entries.iter().find(|e| e.job.id() == id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// First non-terminal, non-cancelled job matching `predicate`.
    pub fn find_outstanding<F>(&self, mut predicate: F) -> Option<JobId>
    where
        F: FnMut(&J) -> bool,
    {
        self.entries
            .iter()
            .find(|e| {
                !e.status().is_terminal()
                    && !e.cancel.is_cancelled()
                    && predicate(&*e.job.borrow())
            })
            .map(|e| e.job.id())
    }

    pub fn get(&self, id: JobId) -> Option<&RegistryEntry<J>> {
        self.entries.iter().find(|e| e.job.id() == id)
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry<J>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<J: Job> Default for JobRegistry<J> {
    fn default() -> Self {
        Self::new()
    }
}

impl<J: Job> core::fmt::Debug for RegistryEntry<J> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("job", &self.job)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("registered_at", &self.registered_at)
            .finish()
    }
}

impl<J: Job> core::fmt::Debug for JobRegistry<J> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}
