use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use strata_core::{JobFault, JobId};

use crate::status::JobStatus;

/// A resumable unit of long-running work.
///
/// The queue calls `step` repeatedly until `status` reports a terminal value.
/// Each call must return after a bounded slice of work; the queue cannot
/// interrupt a step, so an unbounded step stalls the whole tick.
pub trait Job {
    /// Perform one bounded slice of work.
    ///
    /// Implementations poll their cancellation token at every internal
    /// checkpoint and record failures in their own status rather than
    /// returning them. Calling `step` on a terminal job must be a no-op.
    fn step(&mut self);

    /// Current status (monotonic).
    fn status(&self) -> JobStatus;

    /// Diagnostic recorded when the job entered `Faulted`.
    fn fault(&self) -> Option<&JobFault> {
        None
    }

    /// Free-form description, used for logging.
    fn describe(&self) -> String;
}

/// Shared handle to a job.
///
/// The queue and the registry hold clones of the same handle, so there is a
/// single copy of the job's state. Handles compare by identity only.
pub struct JobHandle<J: ?Sized> {
    id: JobId,
    inner: Rc<RefCell<J>>,
}

impl<J: Job + 'static> JobHandle<J> {
    pub fn new(job: J) -> Self {
        Self {
            id: JobId::new(),
            inner: Rc::new(RefCell::new(job)),
        }
    }

    /// Type-erased handle sharing the same job.
    pub fn erase(&self) -> JobHandle<dyn Job> {
        let inner: Rc<RefCell<dyn Job>> = self.inner.clone();
        JobHandle { id: self.id, inner }
    }
}

impl<J: ?Sized> JobHandle<J> {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn borrow(&self) -> Ref<'_, J> {
        self.inner.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, J> {
        self.inner.borrow_mut()
    }
}

impl<J: Job + ?Sized> JobHandle<J> {
    pub fn status(&self) -> JobStatus {
        self.inner.borrow().status()
    }

    pub fn fault(&self) -> Option<JobFault> {
        self.inner.borrow().fault().cloned()
    }

    pub fn describe(&self) -> String {
        self.inner.borrow().describe()
    }
}

impl<J: ?Sized> Clone for JobHandle<J> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: self.inner.clone(),
        }
    }
}

impl<J: Job + ?Sized> core::fmt::Debug for JobHandle<J> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut d = f.debug_struct("JobHandle");
        d.field("id", &self.id);
        match self.inner.try_borrow() {
            Ok(job) => d.field("status", &job.status()).field("desc", &job.describe()),
            Err(_) => d.field("status", &"<stepping>"),
        };
        d.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedJob;
    use strata_core::ManualClock;

    #[test]
    fn erased_handle_shares_state() {
        let handle = JobHandle::new(ScriptedJob::new("a", 2, ManualClock::new()));
        let erased = handle.erase();

        assert_eq!(erased.id(), handle.id());
        erased.borrow_mut().step();

        assert_eq!(handle.status(), JobStatus::Running);
        assert_eq!(handle.borrow().steps_taken(), 1);
    }

    #[test]
    fn identical_jobs_have_distinct_handles() {
        let clock = ManualClock::new();
        let a = JobHandle::new(ScriptedJob::new("same", 1, clock.clone()));
        let b = JobHandle::new(ScriptedJob::new("same", 1, clock));
        assert_ne!(a.id(), b.id());
    }
}
