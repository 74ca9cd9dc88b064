use super::worker::{Accumulator, WorkerContext, provision_slot};
use crate::{Error, KeyGenerator, TaskLimiter};
use core::time::Duration;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Per-round knobs taken from [`crate::ProvisionerConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundSettings {
    pub key_length: usize,
    pub worker_delay: Duration,
    pub round_timeout: Option<Duration>,
    /// Largest round that will be spawned. Bigger rounds fail without
    /// spawning anything.
    pub max_round_size: usize,
}

/// How a round ended.
#[derive(Debug)]
pub enum RoundOutcome {
    /// Every worker produced a key. Keys are in completion order.
    Completed(Vec<String>),
    /// At least one worker failed. Keys produced by the other workers are
    /// discarded.
    Failed(Vec<Error>),
    /// The barrier did not complete within the round timeout. Remaining
    /// workers were aborted.
    TimedOut { elapsed: Duration, finished: usize },
}

/// Runs provisioning rounds.
///
/// A round spawns one task per requested validator, each running
/// [`provision_slot`], and then waits for every task to finish. Generation
/// is all-or-nothing: a single worker error fails the whole round.
#[derive(Clone)]
pub struct Coordinator {
    ctx: Arc<WorkerContext>,
    round_timeout: Option<Duration>,
    max_round_size: usize,
}

impl Coordinator {
    pub fn new(
        generator: Arc<dyn KeyGenerator>,
        limiter: TaskLimiter,
        settings: RoundSettings,
    ) -> Self {
        Self {
            ctx: Arc::new(WorkerContext {
                generator,
                limiter,
                key_length: settings.key_length,
                delay: settings.worker_delay,
            }),
            round_timeout: settings.round_timeout,
            max_round_size: settings.max_round_size,
        }
    }

    pub fn limiter(&self) -> &TaskLimiter {
        &self.ctx.limiter
    }

    /// Runs one round of `count` workers and waits for all of them.
    ///
    /// # Behavior
    ///
    /// - Fails with [`Error::RoundTooLarge`] if `count` exceeds the
    ///   configured maximum.
    /// - Otherwise spawns exactly `count` tasks; no ordering between them.
    /// - A panicking task counts as a generation error.
    /// - With a round timeout, tasks still running at the deadline are
    ///   aborted and the round reports [`RoundOutcome::TimedOut`].
    pub async fn run_round(&self, count: usize) -> RoundOutcome {
        if count > self.max_round_size {
            tracing::warn!(count, max = self.max_round_size, "Round refused");
            return RoundOutcome::Failed(vec![Error::RoundTooLarge {
                count: count as u64,
                max: self.max_round_size,
            }]);
        }

        let start = Instant::now();
        let accumulator = Arc::new(Mutex::new(Accumulator::default()));

        let mut workers = JoinSet::new();
        for slot in 0..count as u64 {
            workers.spawn(provision_slot(
                slot,
                Arc::clone(&self.ctx),
                Arc::clone(&accumulator),
            ));
        }

        tracing::debug!(count, "Spawned round workers");

        let mut finished = 0;
        let mut crashed = Vec::new();
        let barrier = async {
            while let Some(result) = workers.join_next().await {
                finished += 1;
                if let Err(e) = result {
                    crashed.push(Error::generation(format!("worker task failed: {e}")));
                }
            }
        };

        let completed = match self.round_timeout {
            Some(limit) => tokio::time::timeout(limit, barrier).await.is_ok(),
            None => {
                barrier.await;
                true
            }
        };

        if !completed {
            workers.abort_all();
            let elapsed = start.elapsed();
            tracing::warn!(
                count,
                finished,
                "Round timed out after {}ms",
                elapsed.as_millis()
            );
            return RoundOutcome::TimedOut { elapsed, finished };
        }

        let mut acc = core::mem::take(&mut *accumulator.lock());
        acc.errors.append(&mut crashed);

        tracing::debug!(
            keys = acc.keys.len(),
            errors = acc.errors.len(),
            "Round finished in {}ms",
            start.elapsed().as_millis()
        );

        if acc.errors.is_empty() {
            RoundOutcome::Completed(acc.keys)
        } else {
            RoundOutcome::Failed(acc.errors)
        }
    }
}
