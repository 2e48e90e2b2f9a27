//! Moving work onto an execution context.

use crate::error::Error;
use crate::runtime::{ExecutionContext, Job};
use crate::tracing_compat::warn;
use crate::types::OutcomeError;
use parking_lot::Mutex;
use std::sync::Arc;

use super::step::{Node, Step};
use super::trampoline::{drive, Resume};
use super::Task;

impl<A: Send + 'static> Task<A> {
    /// Runs this task on `ctx` instead of the current thread.
    ///
    /// The calling pass suspends; the forked pass starts inside a job
    /// submitted to `ctx`, and the caller's continuations run on whichever
    /// thread finishes it. A cancellation token observed by the caller is
    /// observed by the forked pass too.
    ///
    /// If `ctx` rejects the job the task fails with
    /// [`ErrorKind::Rejected`](crate::error::ErrorKind::Rejected); if it
    /// accepts the job but drops it unrun, with
    /// [`ErrorKind::Abandoned`](crate::error::ErrorKind::Abandoned).
    pub fn fork<C: ExecutionContext>(&self, ctx: C) -> Self {
        let ctx = Arc::new(ctx);
        let node = Arc::clone(self.node());
        Self::from_source(move || {
            let ctx = Arc::clone(&ctx);
            let node = Arc::clone(&node);
            Step::Async(Box::new(move |resume| submit_pass(&*ctx, node, resume)))
        })
    }

    /// Evaluates `f` on `ctx`. Shorthand for `Task::delay(f).fork(ctx)`.
    pub fn spawn<C: ExecutionContext>(ctx: C, f: impl Fn() -> A + Send + Sync + 'static) -> Self {
        Self::delay(f).fork(ctx)
    }
}

fn submit_pass<C: ExecutionContext + ?Sized>(ctx: &C, node: Arc<Node>, resume: Resume) {
    let cancel = resume.cancel_token().cloned();
    // Whoever takes the handle out first completes it: the job, or the
    // rejection path below.
    let slot = Arc::new(Mutex::new(Some(resume)));
    let job_slot = Arc::clone(&slot);
    let job: Job = Box::new(move || {
        let taken = job_slot.lock().take();
        if let Some(resume) = taken {
            drive(
                Node::deferred_step(&node),
                cancel,
                Box::new(move |attempt| resume.complete(attempt)),
            );
        }
    });

    if let Err(rejected) = ctx.submit(job) {
        warn!(reason = rejected.reason(), "fork rejected by execution context");
        let taken = slot.lock().take();
        if let Some(resume) = taken {
            resume.complete(Err(OutcomeError::Err(Error::from(rejected))));
        }
    }
}
