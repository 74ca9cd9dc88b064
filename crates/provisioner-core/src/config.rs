//! Tunables for the provisioning pipeline.
//!
//! The defaults reproduce the reference behavior: 32-character keys, a 20 ms
//! per-worker delay, no bound on in-flight workers, no round timeout, and
//! background rounds abandoned on shutdown. Rounds larger than
//! [`DEFAULT_MAX_ROUND_SIZE`] fail instead of spawning. Status writes use a
//! per-request lock unless [`LockGranularity::Global`] is selected.

use crate::DEFAULT_KEY_LENGTH;
use core::num::NonZeroUsize;
use core::time::Duration;

/// Delay each worker waits before generating, simulating provisioning
/// latency.
pub const DEFAULT_WORKER_DELAY: Duration = Duration::from_millis(20);

/// Largest number of keys a single round may generate.
pub const DEFAULT_MAX_ROUND_SIZE: usize = 100_000;

/// Message returned with every accepted request.
pub const IN_PROGRESS_MESSAGE: &str = "Validator creation in progress";

/// Scope of the lock that serializes status writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockGranularity {
    /// One lock per public id, created on first use.
    #[default]
    PerRequest,
    /// A single lock shared by every request.
    Global,
}

/// What happens to background rounds when the service shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShutdownPolicy {
    /// Stop accepting work and return immediately. Rounds still running are
    /// lost when the process exits and their requests stay `started`.
    #[default]
    Abandon,
    /// Stop accepting work and wait up to `timeout` for in-flight rounds,
    /// then cancel whatever is left.
    Drain { timeout: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionerConfig {
    pub key_length: usize,
    pub worker_delay: Duration,
    /// `None` means unbounded.
    pub max_in_flight_tasks: Option<NonZeroUsize>,
    /// `None` means rounds may run forever.
    pub round_timeout: Option<Duration>,
    /// Requests asking for more keys are accepted but fail their round.
    pub max_round_size: usize,
    pub lock_granularity: LockGranularity,
    pub shutdown_policy: ShutdownPolicy,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            key_length: DEFAULT_KEY_LENGTH,
            worker_delay: DEFAULT_WORKER_DELAY,
            max_in_flight_tasks: None,
            round_timeout: None,
            max_round_size: DEFAULT_MAX_ROUND_SIZE,
            lock_granularity: LockGranularity::default(),
            shutdown_policy: ShutdownPolicy::default(),
        }
    }
}
