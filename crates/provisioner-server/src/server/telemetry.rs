//! Log output for the server.
//!
//! Events are filtered through `RUST_LOG` (default `info`) and written to
//! stdout either as human-readable multi-line records or as one JSON object
//! per line, chosen by `LOG_FORMAT`.
//!
//! ```bash
//! RUST_LOG=provisioner_core=debug,tower_http=debug cargo run
//! LOG_FORMAT=json cargo run
//! ```

use crate::server::config::LogFormat;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let pretty = (format == LogFormat::Pretty).then(|| {
        tracing_subscriber::fmt::layer()
            .with_thread_ids(true)
            .with_line_number(true)
            .with_target(false)
            .with_timer(ChronoLocal::rfc_3339())
            .with_file(true)
            .pretty()
    });

    let json = (format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_thread_ids(true)
            .with_line_number(true)
            .with_timer(ChronoLocal::rfc_3339())
            .with_file(true)
            .json()
            .with_current_span(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .try_init()?;

    Ok(())
}
