//! Semaphore gate for worker tasks.
//!
//! Every round spawns one task per requested validator. Without a bound, a
//! single large request spawns that many tasks at once. [`TaskLimiter`] caps
//! how many workers across all rounds may be past the gate at the same time.
//! Tasks waiting for a permit are already spawned but idle.
//!
//! The default is unbounded.

use crate::{Error, Result};
use core::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Optional bound on concurrently running worker tasks.
///
/// Cloning is cheap and clones share the same permits.
#[derive(Debug, Clone, Default)]
pub struct TaskLimiter {
    semaphore: Option<Arc<Semaphore>>,
    max_in_flight: Option<NonZeroUsize>,
}

/// Held by a worker while it runs. Releases its permit on drop.
#[derive(Debug)]
pub struct TaskPermit {
    _permit: Option<OwnedSemaphorePermit>,
}

impl TaskLimiter {
    /// Creates a limiter allowing at most `max_in_flight` workers, or an
    /// unbounded one for `None`.
    pub fn new(max_in_flight: Option<NonZeroUsize>) -> Self {
        Self {
            semaphore: max_in_flight.map(|max| Arc::new(Semaphore::new(max.get()))),
            max_in_flight,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn max_in_flight(&self) -> Option<NonZeroUsize> {
        self.max_in_flight
    }

    /// Permits currently free, or `None` when unbounded.
    pub fn available(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|s| s.available_permits())
    }

    /// Waits for a permit. Returns immediately when unbounded.
    ///
    /// Waiters are served in FIFO order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] if the semaphore was closed.
    pub async fn acquire(&self) -> Result<TaskPermit> {
        let permit = match &self.semaphore {
            Some(semaphore) => Some(
                Arc::clone(semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|_| Error::ServiceShutdown)?,
            ),
            None => None,
        };

        Ok(TaskPermit { _permit: permit })
    }
}
