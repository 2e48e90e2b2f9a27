//! The execution-context seam.
//!
//! The task engine never creates threads. Work crosses threads only when
//! [`Task::fork`](crate::Task::fork) hands a job to an [`ExecutionContext`]
//! supplied by the caller. The contract is deliberately small: accept a job
//! and run it at some point, or refuse it. Nothing is assumed about queueing
//! order or fairness.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A unit of work submitted to an execution context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Returned when an execution context refuses a job.
#[derive(Debug, Clone, Error)]
#[error("execution context rejected job: {reason}")]
pub struct Rejected {
    reason: &'static str,
}

impl Rejected {
    /// Creates a rejection with a static reason.
    #[must_use]
    pub const fn new(reason: &'static str) -> Self {
        Self { reason }
    }

    /// The pool has been shut down.
    #[must_use]
    pub const fn shutdown() -> Self {
        Self::new("shut down")
    }

    /// Returns the rejection reason.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        self.reason
    }
}

/// Somewhere jobs can run.
pub trait ExecutionContext: Send + Sync + 'static {
    /// Submits a job. The job runs exactly once if this returns `Ok`, and is
    /// dropped unrun if this returns `Err`.
    fn submit(&self, job: Job) -> Result<(), Rejected>;
}

impl<C: ExecutionContext + ?Sized> ExecutionContext for Arc<C> {
    fn submit(&self, job: Job) -> Result<(), Rejected> {
        (**self).submit(job)
    }
}

/// Runs every job immediately on the submitting thread.
///
/// Forking onto `Inline` keeps a program single-threaded and deterministic,
/// which is mostly useful in tests.
#[derive(Clone, Copy, Default)]
pub struct Inline;

impl ExecutionContext for Inline {
    fn submit(&self, job: Job) -> Result<(), Rejected> {
        job();
        Ok(())
    }
}

impl fmt::Debug for Inline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Inline")
    }
}
