//! The step representation and the task description graph.
//!
//! A [`Step`] is one run's view of a task: a closed set of reduction states
//! the trampoline consumes. Steps are single-use (`FnOnce` thunks).
//!
//! A [`Node`] is the re-runnable description a [`Task`](super::Task) points
//! to. Each run asks the root node for a fresh step; a `Chain` node answers
//! with a `Bound` step whose prior is a `More` thunk that asks the next node
//! in turn, so building the first step of a deep chain costs one frame.
//!
//! Values are type-erased inside the engine and downcast again at the typed
//! API boundary.

use crate::error::Error;
use crate::types::{OutcomeError, PanicPayload};
use std::any::{type_name, Any};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use super::trampoline::Resume;

/// A failed run: an error from user code, a cancellation, or a panic.
pub type Failure = OutcomeError<Error>;

/// A type-erased value produced by some step.
pub(crate) type Value = Box<dyn Any + Send>;

/// The terminal result of one pass.
pub(crate) type Attempt = Result<Value, Failure>;

/// One unit of deferred computation.
pub(crate) enum Step {
    /// Completed with a value.
    Done(Value),
    /// Completed with a failure.
    Failed(Failure),
    /// Run this thunk now to obtain the next step.
    More(Box<dyn FnOnce() -> Step + Send>),
    /// Hand a completion handle to an external registrar and yield.
    Async(Box<dyn FnOnce(Resume) + Send>),
    /// Reduce the prior step, then feed its outcome to the continuation.
    Bound(Box<Step>, Cont),
}

/// A single-use continuation waiting on a prior step.
pub(crate) enum Cont {
    /// Runs on success; skipped on failure.
    OnSuccess(Box<dyn FnOnce(Value) -> Step + Send>),
    /// Runs on failure; skipped on success.
    OnFailure(Box<dyn FnOnce(Failure) -> Step + Send>),
}

impl Step {
    pub(crate) fn from_attempt(attempt: Attempt) -> Self {
        match attempt {
            Ok(value) => Self::Done(value),
            Err(failure) => Self::Failed(failure),
        }
    }

    pub(crate) fn from_result<T: Send + 'static>(result: Result<T, Failure>) -> Self {
        match result {
            Ok(value) => Self::Done(Box::new(value)),
            Err(failure) => Self::Failed(failure),
        }
    }
}

/// Runs user code, turning a panic into a failure.
pub(crate) fn capture<T>(f: impl FnOnce() -> T) -> Result<T, Failure> {
    catch_unwind(AssertUnwindSafe(f))
        .map_err(|payload| OutcomeError::Panicked(PanicPayload::from_unwind(payload.as_ref())))
}

/// Recovers a typed value from the engine's erased representation.
pub(crate) fn downcast<A: 'static>(value: Value) -> Result<A, Failure> {
    value.downcast::<A>().map(|boxed| *boxed).map_err(|_| {
        OutcomeError::Err(Error::internal(format!(
            "value type mismatch: expected {}",
            type_name::<A>()
        )))
    })
}

type SourceFn = Arc<dyn Fn() -> Step + Send + Sync>;

/// Re-runnable continuation stored in the description graph.
#[derive(Clone)]
pub(crate) enum ContFn {
    OnSuccess(Arc<dyn Fn(Value) -> Step + Send + Sync>),
    OnFailure(Arc<dyn Fn(Failure) -> Step + Send + Sync>),
}

impl ContFn {
    fn instantiate(&self) -> Cont {
        match self {
            Self::OnSuccess(f) => {
                let f = Arc::clone(f);
                Cont::OnSuccess(Box::new(move |value| f(value)))
            }
            Self::OnFailure(f) => {
                let f = Arc::clone(f);
                Cont::OnFailure(Box::new(move |failure| f(failure)))
            }
        }
    }
}

/// A node of the task description graph.
pub(crate) enum Node {
    /// Produces a fresh first step on every run.
    Source(SourceFn),
    /// `prior` followed by `cont`.
    Chain { prior: Arc<Node>, cont: ContFn },
}

impl Node {
    /// The first step of one run of this node.
    ///
    /// Only the trampoline calls this, from inside a `More` thunk or a
    /// continuation, so a panic in a source is captured there.
    pub(crate) fn step(&self) -> Step {
        match self {
            Self::Source(source) => source(),
            Self::Chain { prior, cont } => {
                let prior = Arc::clone(prior);
                Step::Bound(
                    Box::new(Step::More(Box::new(move || prior.step()))),
                    cont.instantiate(),
                )
            }
        }
    }

    /// Wraps the node's first step in a `More` so that building it happens
    /// under the trampoline's panic guard.
    pub(crate) fn deferred_step(node: &Arc<Self>) -> Step {
        let node = Arc::clone(node);
        Step::More(Box::new(move || node.step()))
    }
}

/// A shared terminal node used to detach `prior` links while dropping.
fn detached() -> Arc<Node> {
    static DETACHED: OnceLock<Arc<Node>> = OnceLock::new();
    Arc::clone(DETACHED.get_or_init(|| Arc::new(Node::Source(Arc::new(|| Step::Done(Box::new(())))))))
}

impl Drop for Node {
    // A chain built from thousands of compositions is a linked list of
    // `prior` links; unlink it iteratively instead of recursing per link.
    fn drop(&mut self) {
        let Self::Chain { prior, .. } = self else {
            return;
        };
        let mut pending = vec![std::mem::replace(prior, detached())];
        while let Some(node) = pending.pop() {
            if let Some(mut node) = Arc::into_inner(node) {
                if let Self::Chain { prior, .. } = &mut node {
                    pending.push(std::mem::replace(prior, detached()));
                }
            }
        }
    }
}
