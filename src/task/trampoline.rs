//! The run loop.
//!
//! A pass reduces steps in a flat loop over an explicit continuation stack,
//! so neither left- nor right-nested composition grows the native stack.
//!
//! When a pass reaches an `Async` step it hands a [`Resume`] to the step's
//! registrar. If the registrar completes the handle before returning, the
//! pass simply continues. Otherwise the pass parks itself in the handle's
//! shared slot and returns; whichever thread later completes the handle
//! picks the parked pass up and continues it there. A mutex-guarded state
//! machine decides which of the two happened, so a completion racing with
//! registration is never lost and never observed twice.

use crate::cancel::CancelToken;
use crate::error::{Error, ErrorKind};
use crate::tracing_compat::{trace, warn};
use crate::types::OutcomeError;
use parking_lot::Mutex;
use std::fmt;
use std::mem;
use std::sync::Arc;

use super::step::{capture, Attempt, Cont, Failure, Step, Value};

/// Receives the terminal result of a pass.
pub(crate) type OnDone = Box<dyn FnOnce(Attempt) + Send>;

/// Starts a pass over `step` and returns when it finishes or parks.
pub(crate) fn drive(step: Step, cancel: Option<CancelToken>, on_done: OnDone) {
    Trampoline {
        conts: Vec::new(),
        cancel,
        on_done,
    }
    .run(step);
}

struct Trampoline {
    conts: Vec<Cont>,
    cancel: Option<CancelToken>,
    on_done: OnDone,
}

impl Trampoline {
    fn run(mut self, mut current: Step) {
        if let Some(failure) = self.cancellation() {
            return self.finish(Err(failure));
        }
        loop {
            current = match current {
                Step::More(thunk) => guarded(thunk),
                Step::Bound(prior, cont) => {
                    self.conts.push(cont);
                    *prior
                }
                Step::Done(value) => match self.next_on_success() {
                    Some(k) => guarded(move || k(value)),
                    None => return self.finish(Ok(value)),
                },
                Step::Failed(failure) => match self.next_on_failure() {
                    Some(k) => guarded(move || k(failure)),
                    None => return self.finish(Err(failure)),
                },
                Step::Async(register) => {
                    let Some((pass, attempt)) = self.suspend(register) else {
                        return;
                    };
                    self = pass;
                    if let Some(failure) = self.cancellation() {
                        return self.finish(Err(failure));
                    }
                    Step::from_attempt(attempt)
                }
            };
        }
    }

    fn next_on_success(&mut self) -> Option<Box<dyn FnOnce(Value) -> Step + Send>> {
        while let Some(cont) = self.conts.pop() {
            if let Cont::OnSuccess(k) = cont {
                return Some(k);
            }
        }
        None
    }

    fn next_on_failure(&mut self) -> Option<Box<dyn FnOnce(Failure) -> Step + Send>> {
        while let Some(cont) = self.conts.pop() {
            if let Cont::OnFailure(k) = cont {
                return Some(k);
            }
        }
        None
    }

    /// A cancelled pass runs no further continuations.
    fn cancellation(&self) -> Option<Failure> {
        let token = self.cancel.as_ref()?;
        token.reason().map(OutcomeError::Cancelled)
    }

    fn finish(self, attempt: Attempt) {
        trace!(
            ok = attempt.is_ok(),
            skipped = self.conts.len(),
            "pass finished"
        );
        (self.on_done)(attempt);
    }

    /// Registers a completion handle. Returns the pass and its result when
    /// the result is already available, or `None` once the pass is parked.
    fn suspend(self, register: Box<dyn FnOnce(Resume) + Send>) -> Option<(Self, Attempt)> {
        let slot = Arc::new(Mutex::new(Handoff::Registering));
        let resume = Resume {
            slot: Some(Arc::clone(&slot)),
            cancel: self.cancel.clone(),
        };

        let registered = capture(move || register(resume));

        let mut state = slot.lock();
        let previous = mem::replace(&mut *state, Handoff::Finished);
        if let Err(failure) = registered {
            // Any completion delivered later finds the slot finished.
            return Some((self, Err(failure)));
        }
        match previous {
            Handoff::Resumed(attempt) => Some((self, attempt)),
            Handoff::Registering => {
                trace!("pass parked");
                *state = Handoff::Parked(self);
                None
            }
            Handoff::Parked(_) | Handoff::Finished => Some((
                self,
                Err(OutcomeError::Err(Error::internal(
                    "completion slot in unexpected state",
                ))),
            )),
        }
    }
}

fn guarded(f: impl FnOnce() -> Step) -> Step {
    capture(f).unwrap_or_else(Step::Failed)
}

enum Handoff {
    /// The registrar is still running.
    Registering,
    /// Completed while the registrar was still running.
    Resumed(Attempt),
    /// The pass gave up its thread and waits here.
    Parked(Trampoline),
    /// The result has been consumed.
    Finished,
}

/// The completion handle passed to an `Async` step's registrar.
///
/// Completing it continues the suspended pass on the completing thread.
/// A handle dropped without completing finishes the pass with an
/// [`ErrorKind::Abandoned`] error.
pub(crate) struct Resume {
    slot: Option<Arc<Mutex<Handoff>>>,
    cancel: Option<CancelToken>,
}

impl Resume {
    /// Delivers the result of the asynchronous step.
    pub(crate) fn complete(mut self, attempt: Attempt) {
        if let Some(slot) = self.slot.take() {
            deliver(&slot, attempt);
        }
    }

    /// The cancellation token of the suspended pass, if any.
    pub(crate) fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }

    /// Returns true if the suspended pass has been cancelled.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

fn deliver(slot: &Mutex<Handoff>, attempt: Attempt) {
    let mut state = slot.lock();
    match mem::replace(&mut *state, Handoff::Finished) {
        Handoff::Registering => *state = Handoff::Resumed(attempt),
        Handoff::Parked(pass) => {
            drop(state);
            trace!("pass resumed");
            pass.run(Step::from_attempt(attempt));
        }
        previous @ (Handoff::Resumed(_) | Handoff::Finished) => {
            *state = previous;
            warn!("ignoring completion for a pass that already has its result");
        }
    }
}

impl Drop for Resume {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            warn!("completion handle dropped without completing");
            deliver(
                &slot,
                Err(OutcomeError::Err(Error::new(ErrorKind::Abandoned))),
            );
        }
    }
}

impl fmt::Debug for Resume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resume")
            .field("pending", &self.slot.is_some())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
