//! Fan-out and join of one provisioning round.
//!
//! ## Structure
//!
//! - [`coordinator`] - [`Coordinator`], which spawns one worker per requested
//!   validator and waits for all of them.
//! - [`worker`] - the per-slot task and the shared [`Accumulator`].

mod coordinator;
mod worker;

pub use coordinator::{Coordinator, RoundOutcome, RoundSettings};
pub use worker::Accumulator;
