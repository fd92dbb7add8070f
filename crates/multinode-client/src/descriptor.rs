//! Group identity parsed from a job descriptor.

use multinode_config::{
    CoordinatorEndpoint, DEFAULT_COORDINATOR_HOST, DEFAULT_COORDINATOR_PORT, PollerConfig,
};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Key under `protocols` that carries the MultiNode block in pipeline jobs.
const PROTOCOL_KEY: &str = "lava-multinode";

/// Identity of this node within its group.
///
/// Parsing performs no I/O. The coordinator address defaults to
/// `localhost:3079` when the descriptor does not name one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDescriptor {
    group_name: String,
    group_size: u32,
    target: String,
    role: Option<String>,
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    #[serde(default)]
    target_group: Option<String>,
    #[serde(default)]
    group_size: Option<u64>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    hostname: Option<String>,
    #[serde(default)]
    port: Option<u16>,
}

impl GroupDescriptor {
    /// Parses a flat descriptor mapping.
    ///
    /// `target_group`, `group_size` and `target` are mandatory and are checked
    /// in that order. `role`, `hostname` (the coordinator host) and `port` are
    /// optional; unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError`] when the value is not an object, a
    /// mandatory key is absent or a value has the wrong type or range.
    pub fn parse(descriptor: &Value) -> Result<Self, DescriptorError> {
        if !descriptor.is_object() {
            return Err(DescriptorError::NotAnObject);
        }
        let raw = RawDescriptor::deserialize(descriptor)
            .map_err(|source| DescriptorError::Malformed { source })?;

        let group_name = raw
            .target_group
            .ok_or(DescriptorError::MissingKey("target_group"))?;
        let size = raw
            .group_size
            .ok_or(DescriptorError::MissingKey("group_size"))?;
        let target = raw.target.ok_or(DescriptorError::MissingKey("target"))?;

        let group_size = u32::try_from(size)
            .ok()
            .filter(|count| *count > 0)
            .ok_or_else(|| DescriptorError::InvalidValue {
                key: "group_size",
                reason: format!("expected a positive group size, got {size}"),
            })?;

        Ok(Self {
            group_name,
            group_size,
            target,
            role: raw.role,
            host: raw.hostname,
            port: raw.port,
        })
    }

    /// Parses either a flat descriptor or a pipeline job definition.
    ///
    /// Pipeline jobs keep the group keys under `protocols."lava-multinode"`
    /// and may place `target` at the top level of the job.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`GroupDescriptor::parse`].
    pub fn from_job(job: &Value) -> Result<Self, DescriptorError> {
        let Some(protocol) = job
            .get("protocols")
            .and_then(|protocols| protocols.get(PROTOCOL_KEY))
        else {
            return Self::parse(job);
        };
        let Value::Object(block) = protocol else {
            return Err(DescriptorError::NotAnObject);
        };

        let mut merged = block.clone();
        if !merged.contains_key("target")
            && let Some(target) = job.get("target")
        {
            merged.insert(String::from("target"), target.clone());
        }
        Self::parse(&Value::Object(merged))
    }

    /// Name of the group shared by every node in the job.
    #[must_use]
    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    /// Number of nodes expected to register.
    #[must_use]
    pub const fn group_size(&self) -> u32 {
        self.group_size
    }

    /// This node's client name within the group.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Role assigned to this node, if any.
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// Coordinator host.
    #[must_use]
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_COORDINATOR_HOST)
    }

    /// Coordinator port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_COORDINATOR_PORT)
    }

    /// Coordinator address.
    #[must_use]
    pub fn endpoint(&self) -> CoordinatorEndpoint {
        CoordinatorEndpoint::new(self.host(), self.port())
    }

    /// Points the descriptor at another coordinator.
    #[must_use]
    pub fn with_coordinator(mut self, endpoint: &CoordinatorEndpoint) -> Self {
        self.host = Some(endpoint.host().to_owned());
        self.port = Some(endpoint.port());
        self
    }

    /// Overlays the coordinator address named in the descriptor onto `base`.
    ///
    /// Keys the descriptor leaves unset keep the value already in `base`, so
    /// settings-file values survive unless the job overrides them.
    #[must_use]
    pub fn resolve_poller_config(&self, mut base: PollerConfig) -> PollerConfig {
        if let Some(host) = &self.host {
            host.clone_into(&mut base.host);
        }
        if let Some(port) = self.port {
            base.port = port;
        }
        base
    }
}

/// Errors raised while parsing a job descriptor. All of them are fatal.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// A mandatory key was absent or null.
    #[error("job descriptor is missing '{0}'")]
    MissingKey(&'static str),
    /// A key had a value outside its accepted range.
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue {
        /// Offending key.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
    /// The descriptor was not a JSON object.
    #[error("job descriptor must be a JSON object")]
    NotAnObject,
    /// A key had the wrong JSON type.
    #[error("malformed job descriptor: {source}")]
    Malformed {
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
}
