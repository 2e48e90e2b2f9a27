//! Cooperative cancellation.
//!
//! Cancellation is a protocol between a nondeterminism group and the runs it
//! started: the group raises a [`CancelToken`], and each run stops at its
//! next suspension boundary with a `Cancelled` outcome.

pub mod token;

pub use token::CancelToken;
