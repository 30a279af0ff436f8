//! Telemetry and observability
//!
//! Structured logging through `tracing-subscriber` and in-process
//! metrics rendered in the Prometheus text format.

mod metrics;

pub use metrics::*;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::TelemetryConfig;
use crate::error::{EmulatorError, EmulatorResult};

/// Install the global subscriber; `RUST_LOG` overrides the configured level
pub fn init_telemetry(config: &TelemetryConfig) -> EmulatorResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    let installed = if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_target(true);
        subscriber.with(json_layer).try_init()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_file(false)
            .with_line_number(false)
            .with_target(true)
            .compact();
        subscriber.with(fmt_layer).try_init()
    };
    installed.map_err(|e| EmulatorError::Config(format!("telemetry: {e}")))?;

    tracing::info!(
        service = %config.service_name,
        version = %env!("CARGO_PKG_VERSION"),
        "telemetry.ready"
    );
    Ok(())
}
