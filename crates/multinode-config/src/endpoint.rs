use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::defaults::{DEFAULT_COORDINATOR_HOST, DEFAULT_COORDINATOR_PORT};

/// TCP address of the coordinator.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct CoordinatorEndpoint {
    host: String,
    port: u16,
}

impl CoordinatorEndpoint {
    /// Builds an endpoint from a host name (or address) and a port.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or address of the coordinator.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port of the coordinator.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl Default for CoordinatorEndpoint {
    fn default() -> Self {
        Self::new(DEFAULT_COORDINATOR_HOST, DEFAULT_COORDINATOR_PORT)
    }
}

impl fmt::Display for CoordinatorEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(formatter, "tcp://[{}]:{}", self.host, self.port)
        } else {
            write!(formatter, "tcp://{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for CoordinatorEndpoint {
    type Err = EndpointParseError;

    /// Accepts `tcp://host:port` as well as a bare `host:port`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = if input.contains("://") {
            Url::parse(input)?
        } else {
            Url::parse(&format!("tcp://{input}"))?
        };
        if url.scheme() != "tcp" {
            return Err(EndpointParseError::UnsupportedScheme(url.scheme().to_owned()));
        }
        let host = url
            .host_str()
            .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
            .filter(|host| !host.is_empty())
            .ok_or_else(|| EndpointParseError::MissingHost(input.to_owned()))?;
        let port = url
            .port()
            .ok_or_else(|| EndpointParseError::MissingPort(input.to_owned()))?;
        Ok(Self::new(host, port))
    }
}

/// Errors encountered while parsing a [`CoordinatorEndpoint`] from text.
#[derive(Debug, Error)]
pub enum EndpointParseError {
    /// Only plain TCP endpoints are understood.
    #[error("unsupported coordinator scheme '{0}'")]
    UnsupportedScheme(String),
    /// The host part was empty.
    #[error("missing coordinator host in '{0}'")]
    MissingHost(String),
    /// No port was given.
    #[error("missing coordinator port in '{0}'")]
    MissingPort(String),
    /// URL failed to parse.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}
