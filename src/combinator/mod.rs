//! Nondeterministic combinators over tasks.
//!
//! - [`join`]: run several tasks at once, waiting for all of them
//!   ([`both`], [`gather`], [`gather_with`], [`gather_unordered`], and the
//!   `_on` variants that fork each member onto an execution context)
//! - [`race`](mod@race): run two tasks at once, first to finish wins
//!
//! All of them share one coordination record per run; see the `group`
//! module for the rules that record enforces.

mod group;
pub mod join;
pub mod race;

pub use join::{both, both_on, gather, gather_on, gather_unordered, gather_unordered_on, gather_with};
pub use race::{race, race_on, Either};
