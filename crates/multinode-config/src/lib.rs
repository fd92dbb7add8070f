//! Shared configuration for MultiNode coordinator clients.
//!
//! Nodes and the coordinator must agree on the port, the receive block size
//! and the polling cadence, so these values live in one place. The crate
//! decodes the JSON configuration string handed to the poller, reads the
//! coordinator settings file installed on dispatchers, and exposes the
//! defaults both fall back to.

mod defaults;
mod endpoint;
mod logging;
mod settings;

pub use defaults::{
    DEFAULT_BACKOFF_INCREMENT, DEFAULT_BLOCKSIZE, DEFAULT_COORDINATOR_HOST,
    DEFAULT_COORDINATOR_PORT, DEFAULT_LOG_FILTER, DEFAULT_POLL_DELAY, DEFAULT_SETTINGS_PATH,
    default_log_format,
};
pub use endpoint::{CoordinatorEndpoint, EndpointParseError};
pub use logging::{LogFormat, LogFormatParseError, LoggingConfig};
pub use settings::{ConfigError, CoordinatorSettings, PollerConfig};
