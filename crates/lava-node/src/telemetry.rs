//! Diagnostic logging for the node binary.
//!
//! Events go to stderr so that stdout carries only replies for the test
//! shell. The subscriber is installed once per process.

use std::io::{self, IsTerminal};

use multinode_config::{LogFormat, LoggingConfig};
use once_cell::sync::OnceCell;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub(crate) enum TelemetryError {
    #[error("invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(#[source] TryInitError),
}

/// Installs the global subscriber on first use; later calls are no-ops.
pub(crate) fn initialise(config: &LoggingConfig) -> Result<(), TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install(config))
        .map(|_| ())
}

fn install(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = parse_filter(config)?;
    let layer = fmt::layer()
        .with_target(true)
        .with_writer(io::stderr)
        .with_timer(UtcTime::rfc_3339());
    let formatted = match config.format() {
        LogFormat::Json => layer.with_ansi(false).json().flatten_event(true).boxed(),
        LogFormat::Compact => layer
            .compact()
            .with_ansi(io::stderr().is_terminal())
            .boxed(),
    };
    tracing_subscriber::registry()
        .with(formatted)
        .with(filter)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

fn parse_filter(config: &LoggingConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(config.filter()).map_err(|error| TelemetryError::Filter {
        filter: config.filter().to_owned(),
        reason: error.to_string(),
    })
}
