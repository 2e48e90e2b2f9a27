//! Bridging callback-style APIs into tasks.

use crate::error::Error;
use crate::types::Outcome;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::step::{Step, Value};
use super::trampoline::Resume;
use super::Task;

/// The typed completion handle given to an [`async_callback`](Task::async_callback)
/// registrar.
///
/// Exactly one of the completing methods consumes it. Dropping it without
/// completing fails the run with
/// [`ErrorKind::Abandoned`](crate::error::ErrorKind::Abandoned).
pub struct Completion<A> {
    resume: Resume,
    _marker: PhantomData<fn(A)>,
}

impl<A: Send + 'static> Completion<A> {
    /// Completes the suspended run with `outcome`.
    pub fn complete(self, outcome: Outcome<A>) {
        self.resume
            .complete(outcome.into_result().map(|value| Box::new(value) as Value));
    }

    /// Completes the suspended run with a value.
    pub fn succeed(self, value: A) {
        self.complete(Outcome::Ok(value));
    }

    /// Completes the suspended run with an error.
    pub fn fail(self, error: Error) {
        self.complete(Outcome::Err(error));
    }

    /// Returns true if the waiting run has been cancelled. A registrar may
    /// use this to skip work whose result would be discarded.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.resume.is_cancelled()
    }
}

impl<A> fmt::Debug for Completion<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("resume", &self.resume)
            .finish()
    }
}

impl<A: Send + 'static> Task<A> {
    /// A task whose result is delivered through a callback.
    ///
    /// On every run `register` receives a fresh [`Completion`]. It may
    /// complete it before returning or hand it to another thread; the run
    /// continues wherever the completion happens.
    pub fn async_callback(register: impl Fn(Completion<A>) + Send + Sync + 'static) -> Self {
        let register = Arc::new(register);
        Self::from_source(move || {
            let register = Arc::clone(&register);
            Step::Async(Box::new(move |resume| {
                register(Completion {
                    resume,
                    _marker: PhantomData,
                });
            }))
        })
    }
}
