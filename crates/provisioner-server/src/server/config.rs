use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::num::NonZeroUsize;
use core::time::Duration;
use std::path::PathBuf;
use provisioner_core::{
    DEFAULT_KEY_LENGTH, DEFAULT_MAX_ROUND_SIZE, LockGranularity, ProvisionerConfig,
    ShutdownPolicy,
};

/// Runtime configuration for the `provisioner-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first). The defaults match the behavior clients
/// expect from the public API: 32-character keys, a 20 ms worker delay, and
/// unbounded fan-out.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "provisioner-server",
    version,
    about = "An HTTP service that provisions validator keys in the background"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Directory of the on-disk request store. Requests are kept in memory
    /// and lost on restart when unset.
    ///
    /// Environment variable: `DATABASE_PATH`
    #[arg(long, env = "DATABASE_PATH")]
    pub database_path: Option<PathBuf>,

    /// Length of each generated key.
    ///
    /// Environment variable: `KEY_LENGTH`
    #[arg(long, env = "KEY_LENGTH", default_value_t = DEFAULT_KEY_LENGTH)]
    pub key_length: usize,

    /// Delay each worker waits before generating its key, in milliseconds.
    ///
    /// Environment variable: `WORKER_DELAY_MS`
    #[arg(long, env = "WORKER_DELAY_MS", default_value_t = 20)]
    pub worker_delay_ms: u64,

    /// Maximum number of worker tasks running at once across all requests.
    /// Zero means unbounded.
    ///
    /// Environment variable: `MAX_IN_FLIGHT_TASKS`
    #[arg(long, env = "MAX_IN_FLIGHT_TASKS", default_value_t = 0)]
    pub max_in_flight_tasks: usize,

    /// Largest number of keys one request may ask for. Larger requests are
    /// accepted and then fail.
    ///
    /// Environment variable: `MAX_ROUND_SIZE`
    #[arg(long, env = "MAX_ROUND_SIZE", default_value_t = DEFAULT_MAX_ROUND_SIZE)]
    pub max_round_size: usize,

    /// Upper bound on a single round, in milliseconds. Zero disables the
    /// timeout.
    ///
    /// Environment variable: `ROUND_TIMEOUT_MS`
    #[arg(long, env = "ROUND_TIMEOUT_MS", default_value_t = 0)]
    pub round_timeout_ms: u64,

    /// Scope of the lock serializing status writes.
    ///
    /// Environment variable: `STATUS_LOCK`
    #[arg(long, env = "STATUS_LOCK", value_enum, default_value_t = StatusLock::PerRequest)]
    pub status_lock: StatusLock,

    /// What to do with in-flight rounds on shutdown.
    ///
    /// Environment variable: `SHUTDOWN_POLICY`
    #[arg(long, env = "SHUTDOWN_POLICY", value_enum, default_value_t = Shutdown::Abandon)]
    pub shutdown_policy: Shutdown,

    /// How long `drain` waits for in-flight rounds, in seconds.
    ///
    /// Environment variable: `DRAIN_TIMEOUT_SECS`
    #[arg(long, env = "DRAIN_TIMEOUT_SECS", default_value_t = 30)]
    pub drain_timeout_secs: u64,

    /// Log output format.
    ///
    /// Environment variable: `LOG_FORMAT`
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLock {
    PerRequest,
    Global,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Abandon,
    Drain,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub database_path: Option<PathBuf>,
    pub log_format: LogFormat,
    pub provisioner: ProvisionerConfig,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.key_length == 0 {
            bail!("KEY_LENGTH must be greater than 0");
        }
        if args.max_round_size == 0 {
            bail!("MAX_ROUND_SIZE must be greater than 0");
        }

        let shutdown_policy = match args.shutdown_policy {
            Shutdown::Abandon => ShutdownPolicy::Abandon,
            Shutdown::Drain => {
                if args.drain_timeout_secs == 0 {
                    bail!("DRAIN_TIMEOUT_SECS must be greater than 0 when draining");
                }
                ShutdownPolicy::Drain {
                    timeout: Duration::from_secs(args.drain_timeout_secs),
                }
            }
        };

        let lock_granularity = match args.status_lock {
            StatusLock::PerRequest => LockGranularity::PerRequest,
            StatusLock::Global => LockGranularity::Global,
        };

        Ok(Self {
            server_addr: args.server_addr,
            database_path: args.database_path,
            log_format: args.log_format,
            provisioner: ProvisionerConfig {
                key_length: args.key_length,
                worker_delay: Duration::from_millis(args.worker_delay_ms),
                max_in_flight_tasks: NonZeroUsize::new(args.max_in_flight_tasks),
                round_timeout: (args.round_timeout_ms > 0)
                    .then(|| Duration::from_millis(args.round_timeout_ms)),
                max_round_size: args.max_round_size,
                lock_granularity,
                shutdown_policy,
            },
        })
    }
}
