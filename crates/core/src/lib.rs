//! `strata-core`: shared building blocks for the generation scheduler.
//!
//! Identifiers, the error taxonomy, and the clock abstraction used to budget
//! work. No scheduling logic lives here.

pub mod clock;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SharedClock, Stopwatch, SystemClock};
pub use error::{JobFault, SchedulerError, SchedulerResult};
pub use id::{JobId, StationId};
