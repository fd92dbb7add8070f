//! Job loading and coordinator configuration precedence.
//!
//! Configuration is layered lowest to highest: built-in defaults, the
//! coordinator settings file, the coordinator named in the job, and finally
//! the `--coordinator` flag.

use std::fs;

use camino::Utf8Path;
use multinode_client::GroupDescriptor;
use multinode_config::{CoordinatorSettings, DEFAULT_SETTINGS_PATH, PollerConfig};
use serde_json::Value;
use tracing::debug;

use crate::cli::Cli;
use crate::errors::AppError;

const JOB_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::job");

/// Reads and decodes the job definition.
pub(crate) fn load_job(path: &Utf8Path) -> Result<Value, AppError> {
    let text = fs::read_to_string(path).map_err(|source| AppError::ReadJob {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| AppError::ParseJob {
        path: path.to_path_buf(),
        source,
    })
}

/// Builds the poller configuration for `descriptor`.
pub(crate) fn resolve_poller_config(
    cli: &Cli,
    descriptor: &GroupDescriptor,
) -> Result<PollerConfig, AppError> {
    let seeded = match settings_file(cli)? {
        Some(settings) => settings.apply(PollerConfig::default()),
        None => PollerConfig::default(),
    };
    let from_job = descriptor.resolve_poller_config(seeded);
    let resolved = match &cli.coordinator {
        Some(endpoint) => from_job.with_endpoint(endpoint),
        None => from_job,
    };
    resolved.validate()?;
    debug!(
        target: JOB_TARGET,
        endpoint = %resolved.endpoint(),
        blocksize = resolved.blocksize,
        poll_delay_ms = resolved.poll_delay.as_millis(),
        "resolved coordinator configuration"
    );
    Ok(resolved)
}

/// Loads the explicit settings file, or the system one when it exists.
///
/// An explicitly named file must be readable; the system file is optional.
fn settings_file(cli: &Cli) -> Result<Option<CoordinatorSettings>, AppError> {
    if let Some(path) = &cli.coordinator_config {
        return Ok(Some(CoordinatorSettings::load(path)?));
    }
    let system = Utf8Path::new(DEFAULT_SETTINGS_PATH);
    if system.is_file() {
        debug!(target: JOB_TARGET, path = %system, "using system coordinator settings");
        return Ok(Some(CoordinatorSettings::load(system)?));
    }
    Ok(None)
}
