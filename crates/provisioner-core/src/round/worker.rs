use crate::{Error, KeyGenerator, TaskLimiter};
use core::time::Duration;
use parking_lot::Mutex;
use std::sync::Arc;

/// Results collected by the workers of one round.
///
/// Insertion order follows lock acquisition, not slot index.
#[derive(Debug, Default)]
pub struct Accumulator {
    pub keys: Vec<String>,
    pub errors: Vec<Error>,
}

/// Everything a worker needs besides the accumulator. Shared by all workers
/// of a round.
pub(crate) struct WorkerContext {
    pub generator: Arc<dyn KeyGenerator>,
    pub limiter: TaskLimiter,
    pub key_length: usize,
    pub delay: Duration,
}

/// Provisions one validator slot.
///
/// Waits for a limiter permit and the configured delay, then generates a key
/// and records the result while holding the round lock. Generation itself
/// happens inside the critical section, so at most one worker of a round
/// generates at a time.
pub(crate) async fn provision_slot(
    slot: u64,
    ctx: Arc<WorkerContext>,
    accumulator: Arc<Mutex<Accumulator>>,
) {
    let _permit = match ctx.limiter.acquire().await {
        Ok(permit) => permit,
        Err(e) => {
            tracing::warn!(slot, "Worker could not start: {e}");
            accumulator.lock().errors.push(e);
            return;
        }
    };

    tokio::time::sleep(ctx.delay).await;

    let mut acc = accumulator.lock();
    match ctx.generator.generate(ctx.key_length) {
        Ok(key) => {
            tracing::trace!(slot, "Generated key");
            acc.keys.push(key);
        }
        Err(e) => {
            tracing::warn!(slot, "Failed to generate random string: {e}");
            acc.errors.push(e);
        }
    }
}
