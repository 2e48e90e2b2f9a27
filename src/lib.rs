//! Eventual: lazy, composable, cancellable tasks on a stack-safe trampoline.
//!
//! # Overview
//!
//! A [`Task<A>`] is a description of a computation that eventually yields an
//! `A` or a failure. Descriptions are built with ordinary combinators and run
//! any number of times; nothing happens until a run method is called.
//!
//! ```
//! use eventual::{gather, runtime::{PoolConfig, WorkerPool}, Task};
//!
//! let pool = WorkerPool::new(PoolConfig::fixed(2)).unwrap();
//! let squares = (1..=4_u64).map(|n| Task::spawn(pool.handle(), move || n * n));
//! let total = gather(squares).map(|v| v.into_iter().sum::<u64>());
//! assert_eq!(total.run().unwrap(), 30);
//! ```
//!
//! # Core Guarantees
//!
//! - **Stack safety**: composition depth never grows the native stack,
//!   neither while running nor while dropping a description
//! - **Failures are values**: errors and panics in user closures become a
//!   [`Failure`], never an unwind into the caller
//! - **Exactly-once completion**: every run reports to its caller once,
//!   whichever thread finishes it
//! - **Cooperative cancellation**: a cancelled run stops at its next
//!   suspension point and runs no further continuations
//!
//! # Module Structure
//!
//! - [`task`]: the task type, its constructors, combinators and run methods
//! - [`combinator`]: nondeterminism: both, gather, gather_unordered, race
//! - [`runtime`]: execution contexts and the stock worker pool
//! - [`cancel`]: cancellation tokens
//! - [`types`]: outcomes and cancellation reasons
//! - [`error`]: error types

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod cancel;
pub mod combinator;
pub mod error;
pub mod runtime;
pub mod task;
pub mod tracing_compat;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-exports for convenient access to core types
pub use cancel::CancelToken;
pub use combinator::{
    both, both_on, gather, gather_on, gather_unordered, gather_unordered_on, gather_with, race,
    race_on, Either,
};
pub use error::{Error, ErrorKind, Result};
pub use runtime::{ExecutionContext, Inline, PoolConfig, Rejected, WorkerPool, WorkerPoolHandle};
pub use task::{Completion, Failure, Task};
pub use types::{join_outcomes, CancelKind, CancelReason, Outcome, OutcomeError, PanicPayload};
