//! The coordination record shared by the members of one group run.
//!
//! A group run starts every member as its own pass, under a child of the
//! caller's cancellation token, and suspends the caller until the group
//! decides. All member reports go through one mutex-guarded record:
//!
//! - the outstanding count decreases by one per report;
//! - successes are kept with their member index;
//! - the first failure is kept, and a cancellation marker never displaces
//!   a real failure;
//! - the caller's completion handle is taken out exactly once, and always
//!   invoked after the lock is released.
//!
//! With `exception_cancels` the first failure cancels the group token and
//! decides the group at once; siblings observe the cancellation at their
//! next suspension point and run none of their remaining continuations.
//! Without it the group decides only after every member has reported.

use crate::cancel::CancelToken;
use crate::task::{drive, Attempt, Failure, Node, Resume, Step, Task, Value};
use crate::tracing_compat::{debug, trace};
use crate::types::CancelReason;
use parking_lot::Mutex;
use std::mem;
use std::sync::Arc;

/// How a group turns member reports into its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// All members; values in member order.
    InOrder,
    /// All members; values in completion order.
    Unordered,
    /// The first member to finish decides; the rest are cancelled.
    FirstWins,
}

/// An `Async` step that runs `members` as one group.
///
/// For [`Mode::InOrder`] and [`Mode::Unordered`] the result value is a
/// `Vec<Value>`; for [`Mode::FirstWins`] it is `(usize, Value)` with the
/// winner's index.
pub(crate) fn group_step(members: Arc<[Arc<Node>]>, mode: Mode, exception_cancels: bool) -> Step {
    Step::Async(Box::new(move |resume| {
        Group::start(&members, mode, exception_cancels, resume);
    }))
}

/// A task running `members` as one group on every run; see [`group_step`].
pub(crate) fn group_task<R: Send + 'static>(
    members: Arc<[Arc<Node>]>,
    mode: Mode,
    exception_cancels: bool,
) -> Task<R> {
    Task::from_source(move || group_step(Arc::clone(&members), mode, exception_cancels))
}

struct Group {
    mode: Mode,
    exception_cancels: bool,
    token: CancelToken,
    state: Mutex<GroupState>,
}

struct GroupState {
    outstanding: usize,
    arrivals: Vec<(usize, Value)>,
    first_failure: Option<Failure>,
    waiter: Option<Resume>,
}

impl Group {
    fn start(members: &[Arc<Node>], mode: Mode, exception_cancels: bool, waiter: Resume) {
        if members.is_empty() {
            waiter.complete(Ok(Box::new(Vec::<Value>::new())));
            return;
        }

        let group = Arc::new(Self {
            mode,
            exception_cancels,
            token: CancelToken::child_of(waiter.cancel_token()),
            state: Mutex::new(GroupState {
                outstanding: members.len(),
                arrivals: Vec::with_capacity(members.len()),
                first_failure: None,
                waiter: Some(waiter),
            }),
        });
        debug!(members = members.len(), ?mode, exception_cancels, "group started");

        for (index, node) in members.iter().enumerate() {
            let member = Arc::clone(&group);
            drive(
                Node::deferred_step(node),
                Some(group.token.clone()),
                Box::new(move |attempt| member.record(index, attempt)),
            );
        }
    }

    fn record(&self, index: usize, attempt: Attempt) {
        let decided = {
            let mut state = self.state.lock();
            state.outstanding = state.outstanding.saturating_sub(1);
            match self.mode {
                Mode::FirstWins => self.first_wins(&mut state, index, attempt),
                Mode::InOrder | Mode::Unordered => self.collect(&mut state, index, attempt),
            }
        };
        if let Some((waiter, result)) = decided {
            waiter.complete(result);
        }
    }

    fn first_wins(
        &self,
        state: &mut GroupState,
        index: usize,
        attempt: Attempt,
    ) -> Option<(Resume, Attempt)> {
        let waiter = state.waiter.take()?;
        self.token.cancel(&CancelReason::race_lost());
        trace!(index, ok = attempt.is_ok(), "race decided");
        Some((waiter, attempt.map(|value| Box::new((index, value)) as Value)))
    }

    fn collect(
        &self,
        state: &mut GroupState,
        index: usize,
        attempt: Attempt,
    ) -> Option<(Resume, Attempt)> {
        if state.waiter.is_none() {
            // Already decided; late reports are dropped.
            return None;
        }
        match attempt {
            Ok(value) => state.arrivals.push((index, value)),
            Err(failure) => {
                let displaces = state
                    .first_failure
                    .as_ref()
                    .map_or(true, |recorded| recorded.is_cancelled() && !failure.is_cancelled());
                if displaces {
                    debug!(index, %failure, "group member failed");
                    state.first_failure = Some(failure);
                }
            }
        }

        let fail_fast = self.exception_cancels && state.first_failure.is_some();
        if !fail_fast && state.outstanding > 0 {
            return None;
        }
        let waiter = state.waiter.take()?;
        let result = match state.first_failure.take() {
            Some(failure) => {
                if self.exception_cancels && self.token.cancel(&CancelReason::sibling_failed()) {
                    debug!(remaining = state.outstanding, "cancelling group siblings");
                }
                Err(failure)
            }
            None => Ok(Box::new(self.assemble(mem::take(&mut state.arrivals))) as Value),
        };
        Some((waiter, result))
    }

    fn assemble(&self, mut arrivals: Vec<(usize, Value)>) -> Vec<Value> {
        if self.mode == Mode::InOrder {
            arrivals.sort_by_key(|(index, _)| *index);
        }
        arrivals.into_iter().map(|(_, value)| value).collect()
    }
}
