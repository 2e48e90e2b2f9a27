//! Race combinator: run two tasks, first to finish wins.
//!
//! Both tasks start as in [`both`](super::both). The first one to reach a
//! terminal result decides the race, whether that result is a value or a
//! failure, and the other is cancelled with
//! [`CancelKind::RaceLost`](crate::types::CancelKind::RaceLost). The loser
//! keeps running until its next suspension point and its result is
//! discarded.
//!
//! # Algebraic Laws
//!
//! - Commutativity: `race(a, b) ≃ race(b, a).map(Either::flip)` (up to timing)
//! - Identity: `race(a, never)` behaves as `a.map(Either::Left)`

use std::sync::Arc;

use super::group::{group_task, Mode};
use crate::runtime::ExecutionContext;
use crate::task::{downcast, Node, Task, Value};

/// Which side of a [`race`] won.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Either<A, B> {
    /// The first task finished first.
    Left(A),
    /// The second task finished first.
    Right(B),
}

impl<A, B> Either<A, B> {
    /// Returns true if this is the Left variant.
    pub fn is_left(&self) -> bool {
        matches!(self, Self::Left(_))
    }

    /// Returns true if this is the Right variant.
    pub fn is_right(&self) -> bool {
        matches!(self, Self::Right(_))
    }

    /// Swaps the sides.
    #[must_use]
    pub fn flip(self) -> Either<B, A> {
        match self {
            Self::Left(a) => Either::Right(a),
            Self::Right(b) => Either::Left(b),
        }
    }
}

/// Runs `left` and `right` at once; the first to finish decides.
pub fn race<A, B>(left: Task<A>, right: Task<B>) -> Task<Either<A, B>>
where
    A: Send + 'static,
    B: Send + 'static,
{
    let members: Arc<[Arc<Node>]> = Arc::new([Arc::clone(left.node()), Arc::clone(right.node())]);
    group_task::<(usize, Value)>(members, Mode::FirstWins, false).map_attempt(|(index, value)| {
        if index == 0 {
            downcast::<A>(value).map(Either::Left)
        } else {
            downcast::<B>(value).map(Either::Right)
        }
    })
}

/// [`race`] with both sides forked onto `ctx`.
pub fn race_on<C, A, B>(ctx: C, left: Task<A>, right: Task<B>) -> Task<Either<A, B>>
where
    C: ExecutionContext + Clone,
    A: Send + 'static,
    B: Send + 'static,
{
    race(left.fork(ctx.clone()), right.fork(ctx))
}
