//! Core value types shared by the task engine and its combinators.
//!
//! - [`outcome`]: Four-valued outcome type with severity lattice
//! - [`cancel`]: Cancellation reason and kind types

pub mod cancel;
pub mod outcome;

pub use cancel::{CancelKind, CancelReason};
pub use outcome::{join_outcomes, Outcome, OutcomeError, PanicPayload};
