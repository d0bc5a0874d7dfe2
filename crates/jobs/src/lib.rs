//! `strata-jobs`
//!
//! **Responsibility:** cooperative, time-sliced execution of long-running jobs
//! inside a single simulation loop.
//!
//! ## Components
//!
//! - `Job`: a resumable unit of work stepped in bounded slices
//! - `CancellationSource` / `CancellationToken`: one-way, polled cancellation
//! - `JobQueue`: FIFO round-robin processing under a per-call time budget
//! - `JobRegistry`: outstanding `(job, cancellation)` pairs, swept once per tick
//! - `JobScheduler`: one queue plus one registry, driven by `tick()`
//!
//! Everything here is single-threaded. A job is never preempted mid-step, so
//! job authors must keep each step short (see `SliceBudget`).

pub mod cancel;
pub mod job;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod slice;
pub mod status;
pub mod testing;

pub use cancel::{CancellationSource, CancellationToken};
pub use job::{Job, JobHandle};
pub use queue::{JobQueue, ProcessReport, QueueStats};
pub use registry::{JobRegistry, ReapedJob, RegistryEntry};
pub use scheduler::{JobScheduler, TickReport};
pub use slice::{SliceBudget, StepBudget};
pub use status::{JobState, JobStatus};
