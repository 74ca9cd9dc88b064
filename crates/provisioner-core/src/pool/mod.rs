//! Service-wide limits on worker tasks.
//!
//! ## Structure
//!
//! - [`limiter`] - [`TaskLimiter`], the optional bound on in-flight workers.

mod limiter;

pub use limiter::{TaskLimiter, TaskPermit};
