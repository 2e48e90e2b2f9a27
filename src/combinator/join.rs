//! Join combinators: run several tasks at once and wait for their values.
//!
//! Every member starts as its own pass on the running thread and proceeds
//! until it first suspends. Members that [`fork`](crate::Task::fork) onto an
//! execution context then run in parallel; members that never suspend simply
//! finish one after another. The `_on` variants fork every member onto the
//! given context first.
//!
//! # Semantics
//!
//! `gather(tasks)`:
//! 1. Start every member
//! 2. Wait for all of them to report
//! 3. Succeed with the values in member order, or fail with the first
//!    failure reported
//!
//! With `exception_cancels` the first failure is reported at once and the
//! remaining members are cancelled: each finishes at its next suspension
//! point without running its outstanding continuations.
//!
//! # Algebraic Laws
//!
//! - Order: `gather(tasks)` succeeds with `tasks.map(run)`
//! - Identity: `gather([])` succeeds with `[]` immediately
//! - Unordered: `gather_unordered(tasks)` is a permutation of `gather(tasks)`

use std::sync::Arc;

use super::group::{group_task, Mode};
use crate::error::Error;
use crate::runtime::ExecutionContext;
use crate::task::{downcast, Node, Task, Value};
use crate::types::OutcomeError;

/// Runs `left` and `right` at once and succeeds with both values.
///
/// Both members always report before the pair does: a failure of one
/// member does not cut the other short.
pub fn both<A, B>(left: Task<A>, right: Task<B>) -> Task<(A, B)>
where
    A: Send + 'static,
    B: Send + 'static,
{
    let members: Arc<[Arc<Node>]> = Arc::new([Arc::clone(left.node()), Arc::clone(right.node())]);
    group_task::<Vec<Value>>(members, Mode::InOrder, false).map_attempt(|values| {
        let mut values = values.into_iter();
        match (values.next(), values.next()) {
            (Some(a), Some(b)) => Ok((downcast::<A>(a)?, downcast::<B>(b)?)),
            _ => Err(OutcomeError::Err(Error::internal(
                "joined pair is missing a member value",
            ))),
        }
    })
}

/// Runs all `tasks` at once; succeeds with their values in input order.
///
/// Equivalent to [`gather_with`] with `exception_cancels` off.
pub fn gather<A, I>(tasks: I) -> Task<Vec<A>>
where
    A: Send + 'static,
    I: IntoIterator<Item = Task<A>>,
{
    gather_with(tasks, false)
}

/// Runs all `tasks` at once; succeeds with their values in input order.
pub fn gather_with<A, I>(tasks: I, exception_cancels: bool) -> Task<Vec<A>>
where
    A: Send + 'static,
    I: IntoIterator<Item = Task<A>>,
{
    collect_all(tasks, Mode::InOrder, exception_cancels)
}

/// Runs all `tasks` at once; succeeds with their values in completion order.
pub fn gather_unordered<A, I>(tasks: I, exception_cancels: bool) -> Task<Vec<A>>
where
    A: Send + 'static,
    I: IntoIterator<Item = Task<A>>,
{
    collect_all(tasks, Mode::Unordered, exception_cancels)
}

/// [`both`] with each member forked onto `ctx`.
pub fn both_on<C, A, B>(ctx: C, left: Task<A>, right: Task<B>) -> Task<(A, B)>
where
    C: ExecutionContext + Clone,
    A: Send + 'static,
    B: Send + 'static,
{
    both(left.fork(ctx.clone()), right.fork(ctx))
}

/// [`gather_with`] with each member forked onto `ctx`.
///
/// An empty `tasks` submits nothing to `ctx`.
pub fn gather_on<C, A, I>(ctx: C, tasks: I, exception_cancels: bool) -> Task<Vec<A>>
where
    C: ExecutionContext + Clone,
    A: Send + 'static,
    I: IntoIterator<Item = Task<A>>,
{
    gather_with(forked(ctx, tasks), exception_cancels)
}

/// [`gather_unordered`] with each member forked onto `ctx`.
///
/// An empty `tasks` submits nothing to `ctx`.
pub fn gather_unordered_on<C, A, I>(ctx: C, tasks: I, exception_cancels: bool) -> Task<Vec<A>>
where
    C: ExecutionContext + Clone,
    A: Send + 'static,
    I: IntoIterator<Item = Task<A>>,
{
    gather_unordered(forked(ctx, tasks), exception_cancels)
}

fn forked<C, A, I>(ctx: C, tasks: I) -> Vec<Task<A>>
where
    C: ExecutionContext + Clone,
    A: Send + 'static,
    I: IntoIterator<Item = Task<A>>,
{
    tasks.into_iter().map(|task| task.fork(ctx.clone())).collect()
}

fn collect_all<A, I>(tasks: I, mode: Mode, exception_cancels: bool) -> Task<Vec<A>>
where
    A: Send + 'static,
    I: IntoIterator<Item = Task<A>>,
{
    let members: Arc<[Arc<Node>]> = tasks
        .into_iter()
        .map(|task| Arc::clone(task.node()))
        .collect();
    group_task::<Vec<Value>>(members, mode, exception_cancels)
        .map_attempt(|values| values.into_iter().map(downcast::<A>).collect())
}
