//! Error types for the node runtime.

use std::io;

use camino::Utf8PathBuf;
use multinode_client::{DescriptorError, SessionError};
use multinode_config::ConfigError;
use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to read job file {path}: {source}")]
    ReadJob { path: Utf8PathBuf, source: io::Error },
    #[error("job file {path} is not valid JSON: {source}")]
    ParseJob {
        path: Utf8PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("failed to install signal handlers: {0}")]
    InstallSignals(io::Error),
    #[error("failed to read signal input: {0}")]
    ReadSignals(io::Error),
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(serde_json::Error),
    #[error("failed to write output: {0}")]
    WriteOutput(io::Error),
}
