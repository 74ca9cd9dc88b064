//! Background execution of provisioning rounds.
//!
//! Intake returns to the caller before the round runs. [`RoundDispatcher`]
//! owns those fire-and-forget tasks for the lifetime of the service: it
//! tracks them, refuses new work once shutdown starts, and applies the
//! configured [`ShutdownPolicy`].

use crate::{Error, Result, ShutdownPolicy};
use core::future::Future;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// What [`RoundDispatcher::shutdown`] did with in-flight rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReport {
    /// Nothing was running.
    Idle,
    /// `count` rounds were left running.
    Abandoned { count: usize },
    /// All rounds finished within the drain timeout.
    Drained,
    /// The drain timed out and `count` rounds were cancelled.
    Cancelled { count: usize },
}

/// Owns the background rounds of a service.
pub struct RoundDispatcher {
    tracker: TaskTracker,
    shutdown_token: CancellationToken,
    policy: ShutdownPolicy,
}

impl RoundDispatcher {
    pub fn new(policy: ShutdownPolicy) -> Self {
        Self {
            tracker: TaskTracker::new(),
            shutdown_token: CancellationToken::new(),
            policy,
        }
    }

    /// Runs `round` in the background.
    ///
    /// The round is dropped at its next suspension point if a drain times
    /// out.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] once shutdown has started.
    pub fn submit<F>(&self, round: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tracker.is_closed() {
            return Err(Error::ServiceShutdown);
        }

        let token = self.shutdown_token.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                () = token.cancelled() => {
                    tracing::warn!("Round cancelled during shutdown");
                }
                () = round => {}
            }
        });
        Ok(())
    }

    /// Rounds currently running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.tracker.is_closed()
    }

    /// Stops accepting rounds and applies the shutdown policy.
    ///
    /// - [`ShutdownPolicy::Abandon`] returns immediately.
    /// - [`ShutdownPolicy::Drain`] waits up to its timeout for in-flight
    ///   rounds, then cancels the rest.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.tracker.close();
        let in_flight = self.tracker.len();

        if in_flight == 0 {
            tracing::info!("No in-flight rounds at shutdown");
            return ShutdownReport::Idle;
        }

        match self.policy {
            ShutdownPolicy::Abandon => {
                tracing::warn!("Abandoning {in_flight} in-flight rounds");
                ShutdownReport::Abandoned { count: in_flight }
            }
            ShutdownPolicy::Drain { timeout } => {
                tracing::info!("Draining {in_flight} in-flight rounds");
                match tokio::time::timeout(timeout, self.tracker.wait()).await {
                    Ok(()) => {
                        tracing::info!("All in-flight rounds drained");
                        ShutdownReport::Drained
                    }
                    Err(_) => {
                        let count = self.tracker.len();
                        tracing::warn!(
                            "Drain timed out after {}ms, cancelling {count} rounds",
                            timeout.as_millis()
                        );
                        self.shutdown_token.cancel();
                        self.tracker.wait().await;
                        ShutdownReport::Cancelled { count }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn submitted_round_runs() {
        let dispatcher = RoundDispatcher::new(ShutdownPolicy::Abandon);
        let (tx, rx) = tokio::sync::oneshot::channel();

        dispatcher
            .submit(async move {
                let _ = tx.send(());
            })
            .unwrap();

        rx.await.unwrap();
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_refused() {
        let dispatcher = RoundDispatcher::new(ShutdownPolicy::Abandon);
        assert_eq!(dispatcher.shutdown().await, ShutdownReport::Idle);

        assert!(dispatcher.is_shutting_down());
        assert_eq!(
            dispatcher.submit(async {}).unwrap_err(),
            Error::ServiceShutdown
        );
    }

    #[tokio::test]
    async fn abandon_does_not_wait() {
        let dispatcher = RoundDispatcher::new(ShutdownPolicy::Abandon);
        dispatcher
            .submit(tokio::time::sleep(Duration::from_secs(60)))
            .unwrap();

        let report = tokio::time::timeout(Duration::from_secs(1), dispatcher.shutdown())
            .await
            .unwrap();
        assert_eq!(report, ShutdownReport::Abandoned { count: 1 });
    }

    #[tokio::test]
    async fn drain_waits_for_rounds() {
        let dispatcher = RoundDispatcher::new(ShutdownPolicy::Drain {
            timeout: Duration::from_secs(5),
        });
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);

        dispatcher
            .submit(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                flag.store(true, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(dispatcher.shutdown().await, ShutdownReport::Drained);
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn drain_timeout_cancels_rounds() {
        let dispatcher = RoundDispatcher::new(ShutdownPolicy::Drain {
            timeout: Duration::from_millis(20),
        });
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);

        dispatcher
            .submit(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                flag.store(true, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(
            dispatcher.shutdown().await,
            ShutdownReport::Cancelled { count: 1 }
        );
        assert!(!done.load(Ordering::SeqCst));
    }
}
