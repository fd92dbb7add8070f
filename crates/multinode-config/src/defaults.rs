use std::time::Duration;

use crate::logging::LogFormat;

/// Port the coordinator listens on unless told otherwise.
pub const DEFAULT_COORDINATOR_PORT: u16 = 3079;

/// Coordinator host used when neither the job nor the settings name one.
pub const DEFAULT_COORDINATOR_HOST: &str = "localhost";

/// Largest reply accepted from a single read, in bytes.
pub const DEFAULT_BLOCKSIZE: usize = 1024;

/// Base delay between polls; also the value back-off resets to.
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_secs(1);

/// Amount added to the back-off delay after each failed connection.
pub const DEFAULT_BACKOFF_INCREMENT: Duration = Duration::from_secs(2);

/// Settings file shared with the coordinator on dispatcher hosts.
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/lava-coordinator/lava-coordinator.conf";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}
