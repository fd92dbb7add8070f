//! Poller configuration and the coordinator settings file.
//!
//! The poller is configured from a JSON document so that the same string can
//! be handed around by job tooling. Dispatcher hosts also carry the
//! coordinator's own settings file; when present, its values seed the poller
//! configuration before job-specific overrides are applied.

use std::fs;
use std::io;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defaults::{
    DEFAULT_BACKOFF_INCREMENT, DEFAULT_BLOCKSIZE, DEFAULT_COORDINATOR_HOST,
    DEFAULT_COORDINATOR_PORT, DEFAULT_POLL_DELAY,
};
use crate::endpoint::CoordinatorEndpoint;

/// Connection and pacing options for one poller instance.
///
/// Every field is optional in the JSON form; missing keys take the crate
/// defaults. Unknown keys are ignored so that envelopes or settings files
/// carrying extra data can be passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Coordinator host name or address.
    pub host: String,
    /// Coordinator TCP port.
    pub port: u16,
    /// Upper bound, in bytes, of the single read that receives a reply.
    pub blocksize: usize,
    /// Base delay between polls, in seconds in the JSON form.
    #[serde(with = "seconds")]
    pub poll_delay: Duration,
    /// Amount added to the delay after each failed connection attempt.
    #[serde(with = "seconds")]
    pub backoff_increment: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_COORDINATOR_HOST.to_owned(),
            port: DEFAULT_COORDINATOR_PORT,
            blocksize: DEFAULT_BLOCKSIZE,
            poll_delay: DEFAULT_POLL_DELAY,
            backoff_increment: DEFAULT_BACKOFF_INCREMENT,
        }
    }
}

impl PollerConfig {
    /// Decodes a poller configuration from its JSON string form.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidJson`] when the text is not a JSON object
    /// of the expected shape and [`ConfigError::InvalidValue`] when a value is
    /// out of range. Without a valid configuration no coordination is
    /// possible, so callers treat both as fatal.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|source| ConfigError::InvalidJson { source })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that deserialise cleanly but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a zero block size or an
    /// empty host.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blocksize == 0 {
            return Err(ConfigError::InvalidValue {
                field: "blocksize",
                reason: String::from("must be greater than zero"),
            });
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "host",
                reason: String::from("must not be empty"),
            });
        }
        Ok(())
    }

    /// Address the poller connects to.
    #[must_use]
    pub fn endpoint(&self) -> CoordinatorEndpoint {
        CoordinatorEndpoint::new(self.host.clone(), self.port)
    }

    /// Replaces the coordinator address.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: &CoordinatorEndpoint) -> Self {
        endpoint.host().clone_into(&mut self.host);
        self.port = endpoint.port();
        self
    }

    /// Replaces the base poll delay.
    #[must_use]
    pub const fn with_poll_delay(mut self, poll_delay: Duration) -> Self {
        self.poll_delay = poll_delay;
        self
    }

    /// Replaces the back-off increment.
    #[must_use]
    pub const fn with_backoff_increment(mut self, increment: Duration) -> Self {
        self.backoff_increment = increment;
        self
    }
}

/// Values read from the coordinator's settings file.
///
/// The file is shared with the coordinator daemon, which is why the host key
/// is spelled `coordinator_hostname` rather than `host`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CoordinatorSettings {
    /// Port the coordinator listens on.
    #[serde(default)]
    pub port: Option<u16>,
    /// Receive block size agreed with the coordinator.
    #[serde(default)]
    pub blocksize: Option<usize>,
    /// Base poll delay in seconds.
    #[serde(default, with = "optional_seconds")]
    pub poll_delay: Option<Duration>,
    /// Host running the coordinator.
    #[serde(default)]
    pub coordinator_hostname: Option<String>,
}

impl CoordinatorSettings {
    /// Reads and decodes the settings file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadSettings`] if the file cannot be read and
    /// [`ConfigError::InvalidSettings`] if it is not valid JSON.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadSettings {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::InvalidSettings {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlays the values present in the file onto `config`.
    #[must_use]
    pub fn apply(&self, mut config: PollerConfig) -> PollerConfig {
        if let Some(host) = &self.coordinator_hostname {
            host.clone_into(&mut config.host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(blocksize) = self.blocksize {
            config.blocksize = blocksize;
        }
        if let Some(poll_delay) = self.poll_delay {
            config.poll_delay = poll_delay;
        }
        config
    }
}

/// Errors raised while building poller configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration string was not valid JSON for a poller.
    #[error("invalid poller configuration: {source}")]
    InvalidJson {
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
    /// A value parsed but is unusable.
    #[error("invalid poller configuration value for '{field}': {reason}")]
    InvalidValue {
        /// Offending key.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
    /// The settings file could not be read.
    #[error("failed to read coordinator settings '{path}': {source}")]
    ReadSettings {
        /// Settings file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The settings file was not valid JSON.
    #[error("invalid coordinator settings in '{path}': {source}")]
    InvalidSettings {
        /// Settings file path.
        path: Utf8PathBuf,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub(super) fn serialize<S: Serializer>(
        value: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(seconds).map_err(D::Error::custom)
    }
}

mod optional_seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, de::Error as _};

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|seconds| Duration::try_from_secs_f64(seconds).map_err(D::Error::custom))
            .transpose()
    }
}
