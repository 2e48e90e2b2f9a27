//! Run methods: the only place a task description is actually executed.

use crate::cancel::CancelToken;
use crate::tracing_compat::{error, trace};
use crate::types::Outcome;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

use super::step::{capture, downcast, Attempt, Failure, Node};
use super::trampoline::{drive, OnDone};
use super::Task;

impl<A: Send + 'static> Task<A> {
    /// Runs the task and blocks until it finishes.
    ///
    /// Blocking a worker thread of the context the task forks onto can
    /// deadlock a pool with no spare threads; call this from outside.
    pub fn run(&self) -> Result<A, Failure> {
        self.attempt_run().into_result()
    }

    /// Runs the task and blocks until it finishes, returning the full
    /// [`Outcome`].
    pub fn attempt_run(&self) -> Outcome<A> {
        self.block_on(None)
    }

    /// Like [`attempt_run`](Task::attempt_run), observing `token`.
    ///
    /// Cancelling the token makes the run finish with
    /// [`Outcome::Cancelled`] at its next suspension point, without running
    /// any further continuations.
    pub fn attempt_run_with(&self, token: &CancelToken) -> Outcome<A> {
        self.block_on(Some(token.clone()))
    }

    /// Starts the task and returns immediately. `callback` receives the
    /// outcome on whichever thread finishes the run.
    pub fn run_async(&self, callback: impl FnOnce(Outcome<A>) + Send + 'static) {
        self.start(None, Box::new(move |attempt| deliver(callback, attempt)));
    }

    /// Like [`run_async`](Task::run_async), observing `token`.
    pub fn run_async_with(
        &self,
        token: &CancelToken,
        callback: impl FnOnce(Outcome<A>) + Send + 'static,
    ) {
        self.start(
            Some(token.clone()),
            Box::new(move |attempt| deliver(callback, attempt)),
        );
    }

    fn block_on(&self, cancel: Option<CancelToken>) -> Outcome<A> {
        let latch = Arc::new(Latch::default());
        let signal = Arc::clone(&latch);
        self.start(cancel, Box::new(move |attempt| signal.set(attempt)));
        typed(latch.wait())
    }

    fn start(&self, cancel: Option<CancelToken>, on_done: OnDone) {
        trace!(output = std::any::type_name::<A>(), "run started");
        drive(Node::deferred_step(self.node()), cancel, on_done);
    }
}

fn typed<A: 'static>(attempt: Attempt) -> Outcome<A> {
    Outcome::from(attempt.and_then(downcast::<A>))
}

fn deliver<A: 'static>(callback: impl FnOnce(Outcome<A>), attempt: Attempt) {
    let outcome = typed(attempt);
    if let Err(failure) = capture(move || callback(outcome)) {
        error!(%failure, "run callback panicked");
    }
}

/// One-shot result slot a blocked caller waits on.
#[derive(Default)]
struct Latch {
    slot: Mutex<Option<Attempt>>,
    ready: Condvar,
}

impl Latch {
    fn set(&self, attempt: Attempt) {
        *self.slot.lock() = Some(attempt);
        self.ready.notify_all();
    }

    fn wait(&self) -> Attempt {
        let mut slot = self.slot.lock();
        loop {
            if let Some(attempt) = slot.take() {
                return attempt;
            }
            self.ready.wait(&mut slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::runtime::{PoolConfig, WorkerPool};
    use crate::types::CancelReason;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn run_returns_value() {
        assert_eq!(Task::now("hi").run().ok(), Some("hi"));
    }

    #[test]
    fn attempt_run_reports_error() {
        let task: Task<u8> = Task::fail(Error::msg("bad"));
        assert!(task.attempt_run().is_err());
    }

    #[test]
    fn run_async_delivers_on_completing_thread() {
        let pool = WorkerPool::new(PoolConfig::fixed(1)).expect("pool");
        let (tx, rx) = mpsc::channel();
        Task::spawn(pool.handle(), || std::thread::current().name().map(str::to_owned))
            .run_async(move |outcome| {
                let _ = tx.send(outcome.unwrap());
            });
        let name = rx.recv_timeout(Duration::from_secs(5)).expect("callback ran");
        assert!(name.is_some_and(|n| n.starts_with("eventual")));
    }

    #[test]
    fn panicking_callback_is_contained() {
        Task::now(1).run_async(|_| panic!("callback"));
    }

    #[test]
    fn pre_cancelled_token_runs_nothing() {
        let token = CancelToken::new();
        token.cancel(&CancelReason::user("before start"));
        let task = Task::delay(|| -> u8 { panic!("must not run") });
        assert!(task.attempt_run_with(&token).is_cancelled());
    }

    #[test]
    fn latch_wakes_waiter() {
        let latch = Arc::new(Latch::default());
        let setter = Arc::clone(&latch);
        let handle = std::thread::spawn(move || setter.set(Ok(Box::new(5_u8))));
        let attempt = latch.wait();
        handle.join().expect("setter");
        assert_eq!(typed::<u8>(attempt).unwrap(), 5);
    }
}
