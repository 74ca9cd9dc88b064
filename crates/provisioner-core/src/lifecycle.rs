//! Request status transitions.
//!
//! [`LifecycleManager`] is the only component that changes a request's
//! status. Each transition updates the in-memory record and then writes it to
//! the store while holding a status lock, so two writes for the same request
//! never interleave.
//!
//! The lock is either one async mutex per public id (created on first use and
//! dropped once the request is terminal and nobody else holds it) or a single
//! mutex shared by every request. Both are [`tokio::sync::Mutex`], which
//! grants the lock to waiters in FIFO order.

use crate::{Error, LockGranularity, ProvisioningRequest, RequestStatus, RequestStore, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

type StatusLock = Arc<AsyncMutex<()>>;

enum StatusLocks {
    Global(StatusLock),
    PerRequest(Mutex<HashMap<String, StatusLock>>),
}

impl StatusLocks {
    fn new(granularity: LockGranularity) -> Self {
        match granularity {
            LockGranularity::Global => Self::Global(StatusLock::default()),
            LockGranularity::PerRequest => Self::PerRequest(Mutex::new(HashMap::new())),
        }
    }

    fn lock_for(&self, public_id: &str) -> StatusLock {
        match self {
            Self::Global(lock) => Arc::clone(lock),
            Self::PerRequest(locks) => Arc::clone(
                locks
                    .lock()
                    .entry(public_id.to_string())
                    .or_default(),
            ),
        }
    }

    /// Drops the lock entry for `public_id` unless another transition still
    /// holds or waits on it.
    fn forget(&self, public_id: &str) {
        if let Self::PerRequest(locks) = self {
            let mut locks = locks.lock();
            if let Some(lock) = locks.get(public_id) {
                if Arc::strong_count(lock) == 1 {
                    locks.remove(public_id);
                }
            }
        }
    }

    fn tracked(&self) -> usize {
        match self {
            Self::Global(_) => 1,
            Self::PerRequest(locks) => locks.lock().len(),
        }
    }
}

/// Drives requests through `started → successful | failed`.
pub struct LifecycleManager {
    store: Arc<dyn RequestStore>,
    locks: StatusLocks,
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn RequestStore>, granularity: LockGranularity) -> Self {
        Self {
            store,
            locks: StatusLocks::new(granularity),
        }
    }

    /// Moves `request` to `next` and persists the change.
    ///
    /// The in-memory status is updated before the store write. A failed
    /// write is logged and neither retried nor rolled back, so the store may
    /// lag behind `request` until a later write succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if `request` is already terminal
    /// or `next` is not reachable from its status. Nothing is written in that
    /// case.
    #[tracing::instrument(level = "debug", skip_all, fields(request_id = %request.public_id, to = %next))]
    pub async fn transition(
        &self,
        request: &mut ProvisioningRequest,
        next: RequestStatus,
    ) -> Result<()> {
        let lock = self.locks.lock_for(&request.public_id);

        let result = {
            let _guard = lock.lock().await;

            if request.status.can_transition_to(next) {
                request.status = next;
                if let Err(e) = self.store.update_request(request).await {
                    tracing::error!(
                        "Failed to update validator request status, requestID: {}, error: {e}",
                        request.public_id
                    );
                }
                Ok(())
            } else {
                Err(Error::InvalidTransition {
                    from: request.status,
                    to: next,
                })
            }
        };

        drop(lock);
        if request.status.is_terminal() {
            self.locks.forget(&request.public_id);
        }

        if result.is_ok() {
            tracing::info!(status = %next, "Request status updated");
        }
        result
    }

    /// Number of status locks currently held in memory.
    pub fn tracked_locks(&self) -> usize {
        self.locks.tracked()
    }
}
