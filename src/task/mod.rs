//! Lazy, re-runnable task descriptions.
//!
//! A [`Task<A>`] describes a computation that eventually produces an `A` or
//! a [`Failure`]. Building a task runs nothing (except [`Task::eager`]);
//! every call to a run method starts an independent pass through the same
//! description.
//!
//! # Composition
//!
//! [`map`](Task::map), [`flat_map`](Task::flat_map), [`handle`](Task::handle)
//! and [`handle_with`](Task::handle_with) extend the description. Panics in
//! any supplied closure are captured as [`OutcomeError::Panicked`] and flow
//! to the next failure handler; they never unwind into the caller of a run
//! method.
//!
//! Composition depth is unbounded in both directions: a pass reduces the
//! description on an explicit continuation stack, so a chain of a hundred
//! thousand `flat_map`s runs (and drops) without growing the native stack.
//!
//! # Threads
//!
//! Work leaves the calling thread only through [`fork`](Task::fork), which
//! hands the rest of the inner task to an
//! [`ExecutionContext`](crate::runtime::ExecutionContext).

mod completion;
mod fork;
mod run;
mod step;
mod trampoline;

pub use completion::Completion;
pub use step::Failure;

pub(crate) use step::{downcast, Attempt, Node, Step, Value};
pub(crate) use trampoline::{drive, Resume};

use crate::error::Error;
use crate::types::{Outcome, OutcomeError};
use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use step::{capture, Cont, ContFn};

/// A lazy description of a computation producing an `A`.
///
/// Cloning a task is cheap and shares the description.
pub struct Task<A> {
    node: Arc<Node>,
    _marker: PhantomData<fn() -> A>,
}

impl<A> Clone for Task<A> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
            _marker: PhantomData,
        }
    }
}

impl<A> fmt::Debug for Task<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("output", &type_name::<A>())
            .finish_non_exhaustive()
    }
}

impl<A> Task<A> {
    fn from_node(node: Node) -> Self {
        Self {
            node: Arc::new(node),
            _marker: PhantomData,
        }
    }

    pub(crate) fn from_source(source: impl Fn() -> Step + Send + Sync + 'static) -> Self {
        Self::from_node(Node::Source(Arc::new(source)))
    }

    pub(crate) fn node(&self) -> &Arc<Node> {
        &self.node
    }

    fn then<B>(&self, cont: ContFn) -> Task<B> {
        Task::from_node(Node::Chain {
            prior: Arc::clone(&self.node),
            cont,
        })
    }
}

impl<A: Send + 'static> Task<A> {
    /// A task that succeeds with `value`.
    pub fn now(value: A) -> Self
    where
        A: Clone + Sync,
    {
        Self::from_source(move || Step::Done(Box::new(value.clone())))
    }

    /// Evaluates `f` immediately and wraps its result.
    ///
    /// A panic in `f` is captured and becomes the task's failure.
    pub fn eager(f: impl FnOnce() -> A) -> Self
    where
        A: Clone + Sync,
    {
        match capture(f) {
            Ok(value) => Self::now(value),
            Err(failure) => Self::failure(failure),
        }
    }

    /// Like [`eager`](Task::eager) for fallible thunks.
    ///
    /// An `Err` from `f`, or a panic in it, becomes the task's failure.
    pub fn try_eager(f: impl FnOnce() -> Result<A, Error>) -> Self
    where
        A: Clone + Sync,
    {
        match capture(f) {
            Ok(Ok(value)) => Self::now(value),
            Ok(Err(error)) => Self::fail(error),
            Err(failure) => Self::failure(failure),
        }
    }

    /// A task that evaluates `f` on each run, on the running thread.
    pub fn delay(f: impl Fn() -> A + Send + Sync + 'static) -> Self {
        Self::from_source(move || Step::Done(Box::new(f())))
    }

    /// Like [`delay`](Task::delay) for fallible thunks.
    pub fn try_delay(f: impl Fn() -> Result<A, Error> + Send + Sync + 'static) -> Self {
        Self::from_source(move || Step::from_result(f().map_err(OutcomeError::Err)))
    }

    /// Defers construction of the task itself to run time.
    ///
    /// The built task is reduced by the trampoline, not inside this frame,
    /// so recursive definitions (`fn lp(n) -> Task<_> { suspend(move || lp(n - 1)) }`)
    /// run in constant stack.
    pub fn suspend(f: impl Fn() -> Task<A> + Send + Sync + 'static) -> Self {
        Self::from_source(move || Node::deferred_step(&f().node))
    }

    /// A task that fails with `error`.
    pub fn fail(error: Error) -> Self {
        Self::failure(OutcomeError::Err(error))
    }

    /// A task that fails with an arbitrary failure, including a cancellation
    /// or panic marker.
    pub fn failure(failure: Failure) -> Self {
        Self::from_source(move || Step::Failed(failure.clone()))
    }

    /// A task that reproduces `outcome` on every run.
    pub fn from_outcome(outcome: Outcome<A>) -> Self
    where
        A: Clone + Sync,
    {
        let result = outcome.into_result();
        Self::from_source(move || Step::from_result(result.clone()))
    }

    /// Applies `f` to the success value.
    pub fn map<B: Send + 'static>(&self, f: impl Fn(A) -> B + Send + Sync + 'static) -> Task<B> {
        self.then(ContFn::OnSuccess(Arc::new(move |value| {
            match downcast::<A>(value) {
                Ok(a) => Step::Done(Box::new(f(a))),
                Err(failure) => Step::Failed(failure),
            }
        })))
    }

    /// Applies a fallible `f` to the success value.
    pub fn try_map<B: Send + 'static>(
        &self,
        f: impl Fn(A) -> Result<B, Error> + Send + Sync + 'static,
    ) -> Task<B> {
        self.map_attempt(move |a| f(a).map_err(OutcomeError::Err))
    }

    pub(crate) fn map_attempt<B: Send + 'static>(
        &self,
        f: impl Fn(A) -> Result<B, Failure> + Send + Sync + 'static,
    ) -> Task<B> {
        self.then(ContFn::OnSuccess(Arc::new(move |value| {
            Step::from_result(downcast::<A>(value).and_then(&f))
        })))
    }

    /// Sequences the task produced by `f` after this one.
    pub fn flat_map<B: Send + 'static>(
        &self,
        f: impl Fn(A) -> Task<B> + Send + Sync + 'static,
    ) -> Task<B> {
        self.then(ContFn::OnSuccess(Arc::new(move |value| {
            match downcast::<A>(value) {
                Ok(a) => f(a).node.step(),
                Err(failure) => Step::Failed(failure),
            }
        })))
    }

    /// Recovers from failures for which `pf` returns a value.
    ///
    /// Failures `pf` declines (by returning `None`) propagate unchanged, as
    /// does success.
    pub fn handle(&self, pf: impl Fn(&Failure) -> Option<A> + Send + Sync + 'static) -> Self {
        self.then(ContFn::OnFailure(Arc::new(move |failure| {
            match pf(&failure) {
                Some(value) => Step::Done(Box::new(value)),
                None => Step::Failed(failure),
            }
        })))
    }

    /// Recovers from failures for which `pf` returns a replacement task.
    pub fn handle_with(
        &self,
        pf: impl Fn(&Failure) -> Option<Task<A>> + Send + Sync + 'static,
    ) -> Self {
        self.then(ContFn::OnFailure(Arc::new(move |failure| {
            match pf(&failure) {
                Some(task) => task.node.step(),
                None => Step::Failed(failure),
            }
        })))
    }

    /// Runs `fallback` if this task fails with anything but a cancellation.
    pub fn or_else(&self, fallback: Task<A>) -> Self {
        self.handle_with(move |failure| (!failure.is_cancelled()).then(|| fallback.clone()))
    }

    /// Turns every result into a success carrying the full [`Outcome`].
    pub fn attempt(&self) -> Task<Outcome<A>> {
        self.settle().map(Outcome::from)
    }

    /// Runs `cleanup` after this task, whatever its result, then restores
    /// that result. A failing cleanup task replaces the result with its own
    /// failure.
    pub fn on_finish(
        &self,
        cleanup: impl Fn(Option<&Failure>) -> Task<()> + Send + Sync + 'static,
    ) -> Self {
        self.settle().then(ContFn::OnSuccess(Arc::new(move |value| {
            let result = match downcast::<Result<A, Failure>>(value) {
                Ok(result) => result,
                Err(failure) => return Step::Failed(failure),
            };
            let prior = cleanup(result.as_ref().err()).node.step();
            Step::Bound(
                Box::new(prior),
                Cont::OnSuccess(Box::new(move |_| Step::from_result(result))),
            )
        })))
    }

    fn settle(&self) -> Task<Result<A, Failure>> {
        self.then::<Result<A, Failure>>(ContFn::OnSuccess(Arc::new(|value| {
            Step::Done(Box::new(downcast::<A>(value)))
        })))
        .then(ContFn::OnFailure(Arc::new(|failure| {
            Step::Done(Box::new(Err::<A, Failure>(failure)))
        })))
    }
}

impl Task<()> {
    /// A task that succeeds with `()`.
    #[must_use]
    pub fn unit() -> Self {
        Self::now(())
    }
}
