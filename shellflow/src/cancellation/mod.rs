//! Cooperative cancellation for pipeline runs.
//!
//! A [`CancellationToken`] is the cancel scope of a run: process stages race
//! their child against [`CancellationToken::cancelled`] and kill the child
//! when the token fires.

mod token;

pub use token::{CancelCallback, CancellationToken};
