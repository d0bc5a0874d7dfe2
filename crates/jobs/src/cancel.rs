//! Cooperative cancellation.
//!
//! A [`CancellationSource`] is the controller side, held by whoever may abort
//! the work (the registry). A [`CancellationToken`] is the observer side a job
//! polls at its checkpoints. Cancellation is one-way: once triggered it stays
//! triggered, and nothing is interrupted until the job next polls.

use std::cell::Cell;
use std::rc::Rc;

/// Controller side of a cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationSource {
    flag: Rc<Cell<bool>>,
}

impl CancellationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.get()
    }

    /// Observer handle bound to this source.
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            flag: Some(self.flag.clone()),
        }
    }
}

/// Observer side of a cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Option<Rc<Cell<bool>>>,
}

impl CancellationToken {
    /// A token that can never be cancelled.
    pub fn none() -> Self {
        Self { flag: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.as_ref().is_some_and(|f| f.get())
    }
}
