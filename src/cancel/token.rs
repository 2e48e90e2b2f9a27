//! Cooperative cancellation tokens.
//!
//! A token is a shared flag plus the reason it was raised. The trampoline
//! consults the token of the pass it is driving at suspension boundaries
//! only: when a pass starts and when it resumes after an `Async` step. Work
//! that is already running between two suspension points is never
//! interrupted; it finishes its step and is stopped at the next boundary.
//!
//! Tokens form a tree through [`CancelToken::child`]. A child observes its
//! parent's cancellation by walking the parent link, so parents keep no list
//! of children and short-lived child tokens never accumulate.

use crate::types::CancelReason;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct TokenState {
    cancelled: AtomicBool,
    reason: Mutex<Option<CancelReason>>,
    parent: Option<CancelToken>,
}

/// A cloneable cancellation token.
#[derive(Clone)]
pub struct CancelToken {
    state: Arc<TokenState>,
}

impl CancelToken {
    /// Creates a fresh, uncancelled root token.
    #[must_use]
    pub fn new() -> Self {
        Self::with_parent(None)
    }

    fn with_parent(parent: Option<Self>) -> Self {
        Self {
            state: Arc::new(TokenState {
                cancelled: AtomicBool::new(false),
                reason: Mutex::new(None),
                parent,
            }),
        }
    }

    /// Creates a child token that is cancelled whenever this one is.
    #[must_use]
    pub fn child(&self) -> Self {
        Self::with_parent(Some(self.clone()))
    }

    /// Creates a child of `parent` when one is given, otherwise a root token.
    #[must_use]
    pub fn child_of(parent: Option<&Self>) -> Self {
        parent.map_or_else(Self::new, Self::child)
    }

    /// Requests cancellation with the given reason.
    ///
    /// Returns true if this call triggered the cancellation (first caller wins).
    #[allow(clippy::must_use_candidate)]
    pub fn cancel(&self, reason: &CancelReason) -> bool {
        // The reason is published before the flag so that any reader that
        // observes the flag also finds the reason.
        let mut slot = self.state.reason.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(reason.clone());
        drop(slot);
        self.state.cancelled.store(true, Ordering::Release);
        true
    }

    /// Returns true if this token or any ancestor has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        let mut current = Some(self);
        while let Some(token) = current {
            if token.state.cancelled.load(Ordering::Acquire) {
                return true;
            }
            current = token.state.parent.as_ref();
        }
        false
    }

    /// Returns the cancellation reason, if cancelled.
    ///
    /// A token cancelled only through an ancestor reports
    /// [`CancelReason::parent_cancelled`].
    #[must_use]
    pub fn reason(&self) -> Option<CancelReason> {
        if let Some(reason) = self.state.reason.lock().clone() {
            return Some(reason);
        }
        self.state
            .parent
            .as_ref()
            .filter(|parent| parent.is_cancelled())
            .map(|_| CancelReason::parent_cancelled())
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("has_parent", &self.state.parent.is_some())
            .finish()
    }
}
